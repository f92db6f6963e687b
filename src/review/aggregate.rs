use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use super::version::{DocumentVersion, VersionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Active,
    UnderReview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallState {
    HasReview,
    AllActive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotSummary {
    pub slot: String,
    pub status: SlotState,
    pub version_count: usize,
    pub latest_version: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeSummary {
    pub document_type: String,
    pub slots: Vec<SlotSummary>,
    pub overall: OverallState,
}

impl TypeSummary {
    pub fn slot_keys(&self) -> Vec<&str> {
        self.slots.iter().map(|slot| slot.slot.as_str()).collect()
    }

    pub fn slot(&self, key: &str) -> Option<&SlotSummary> {
        self.slots.iter().find(|slot| slot.slot == key)
    }
}

/// Display order: `D1`, `D2`, then everything else lexicographically.
pub fn compare_slots(a: &str, b: &str) -> Ordering {
    fn rank(slot: &str) -> u8 {
        match slot {
            "D1" => 0,
            "D2" => 1,
            _ => 2,
        }
    }
    rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
}

/// Rolls every version of one document type up into per-slot review state.
///
/// A slot is under review when any of its versions is, not only the latest.
pub fn aggregate_type(document_type: &str, versions: &[DocumentVersion]) -> TypeSummary {
    let mut slots: BTreeMap<String, SlotSummary> = BTreeMap::new();

    for version in versions {
        let key = version.slot_key();
        let entry = slots.entry(key.clone()).or_insert_with(|| SlotSummary {
            slot: key,
            status: SlotState::Active,
            version_count: 0,
            latest_version: None,
        });
        entry.version_count += 1;
        if version.version_status == VersionStatus::UnderReview {
            entry.status = SlotState::UnderReview;
        }
        if version.is_latest {
            entry.latest_version = Some(version.version_number);
        }
    }

    let mut slots: Vec<SlotSummary> = slots.into_values().collect();
    slots.sort_by(|a, b| compare_slots(&a.slot, &b.slot));

    let overall = if slots
        .iter()
        .any(|slot| slot.status == SlotState::UnderReview)
    {
        OverallState::HasReview
    } else {
        OverallState::AllActive
    };

    TypeSummary {
        document_type: document_type.to_string(),
        slots,
        overall,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::version::FileMeta;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn version(slot: &str, number: i32, latest: bool, status: VersionStatus) -> DocumentVersion {
        DocumentVersion {
            document_id: Uuid::new_v4(),
            land_id: "land-1".into(),
            document_type: "ownership-documents".into(),
            slot: slot.into(),
            version_number: number,
            is_latest: latest,
            file: FileMeta {
                file_name: "deed.pdf".into(),
                size_bytes: 1,
                mime_type: "application/pdf".into(),
            },
            uploaded_by: "owner".into(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            version_status: status,
            review_locked_by: None,
            review_locked_at: None,
            approved_by: None,
            approved_at: None,
            subtask_id: None,
        }
    }

    #[test]
    fn any_slot_under_review_marks_type() {
        let versions = vec![
            version("D2", 1, true, VersionStatus::UnderReview),
            version("D1", 1, true, VersionStatus::Pending),
        ];
        let summary = aggregate_type("ownership-documents", &versions);
        assert_eq!(summary.slot_keys(), vec!["D1", "D2"]);
        assert_eq!(summary.slot("D1").unwrap().status, SlotState::Active);
        assert_eq!(summary.slot("D2").unwrap().status, SlotState::UnderReview);
        assert_eq!(summary.overall, OverallState::HasReview);
    }

    #[test]
    fn archived_versions_under_review_still_count() {
        let versions = vec![
            version("D1", 1, false, VersionStatus::UnderReview),
            version("D1", 2, true, VersionStatus::Approved),
        ];
        let summary = aggregate_type("ownership-documents", &versions);
        let slot = summary.slot("D1").unwrap();
        assert_eq!(slot.status, SlotState::UnderReview);
        assert_eq!(slot.version_count, 2);
        assert_eq!(slot.latest_version, Some(2));
    }

    #[test]
    fn display_order_and_blank_slots() {
        let versions = vec![
            version("B7", 1, true, VersionStatus::Pending),
            version("D2", 1, true, VersionStatus::Pending),
            version("A1", 1, true, VersionStatus::Pending),
            version("", 1, true, VersionStatus::Approved),
        ];
        let summary = aggregate_type("ownership-documents", &versions);
        assert_eq!(summary.slot_keys(), vec!["D1", "D2", "A1", "B7"]);
        assert_eq!(summary.overall, OverallState::AllActive);
    }
}
