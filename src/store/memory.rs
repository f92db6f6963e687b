use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    AssignmentStore, DocumentStore, RoleMappings, StoreError, StoreResult, UserDirectory,
};
use crate::review::{
    AssignmentStatus, DocumentKey, DocumentVersion, ExplicitAssignment, UserProfile,
    VersionPatch,
};

/// In-process store. Every conditional write runs inside one mutex critical
/// section, which gives it the same atomicity as the row-locking postgres store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    versions: Vec<DocumentVersion>,
    assignments: Vec<ExplicitAssignment>,
    roles: HashMap<String, BTreeSet<String>>,
    profiles: HashMap<String, UserProfile>,
    land_mappings: HashMap<(String, String), Vec<String>>,
    default_mappings: HashMap<String, Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store mutex poisoned".into()))
    }

    /// Sets the mapping for one land, or the system default when `land_id` is `None`.
    pub fn set_role_mapping<I, S>(
        &self,
        land_id: Option<&str>,
        document_type: &str,
        roles: I,
    ) -> StoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let roles: Vec<String> = roles.into_iter().map(Into::into).collect();
        let mut state = self.lock()?;
        match land_id {
            Some(land_id) => {
                state
                    .land_mappings
                    .insert((land_id.to_string(), document_type.to_string()), roles);
            }
            None => {
                state
                    .default_mappings
                    .insert(document_type.to_string(), roles);
            }
        }
        Ok(())
    }

    pub fn grant_roles<I, S>(&self, user_id: &str, roles: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.lock()?;
        state
            .roles
            .entry(user_id.to_string())
            .or_default()
            .extend(roles.into_iter().map(Into::into));
        Ok(())
    }

    pub fn upsert_profile(&self, profile: UserProfile) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.profiles.insert(profile.user_id.clone(), profile);
        Ok(())
    }

    /// Inserts a version verbatim, bypassing the ledger. Used to load
    /// pre-existing records.
    pub fn import_version(&self, version: DocumentVersion) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.versions.push(version);
        Ok(())
    }
}

fn newest_first(mut versions: Vec<DocumentVersion>) -> Vec<DocumentVersion> {
    versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
    versions
}

impl DocumentStore for MemoryStore {
    fn find(&self, document_id: Uuid) -> StoreResult<Option<DocumentVersion>> {
        let state = self.lock()?;
        Ok(state
            .versions
            .iter()
            .find(|version| version.document_id == document_id)
            .cloned())
    }

    fn latest(&self, key: &DocumentKey) -> StoreResult<Option<DocumentVersion>> {
        let state = self.lock()?;
        Ok(state
            .versions
            .iter()
            .find(|version| version.is_latest && &version.key() == key)
            .cloned())
    }

    fn versions(&self, key: &DocumentKey) -> StoreResult<Vec<DocumentVersion>> {
        let state = self.lock()?;
        Ok(newest_first(
            state
                .versions
                .iter()
                .filter(|version| &version.key() == key)
                .cloned()
                .collect(),
        ))
    }

    fn versions_for_type(
        &self,
        land_id: &str,
        document_type: &str,
    ) -> StoreResult<Vec<DocumentVersion>> {
        let state = self.lock()?;
        Ok(state
            .versions
            .iter()
            .filter(|version| version.land_id == land_id && version.document_type == document_type)
            .cloned()
            .collect())
    }

    fn versions_for_land(&self, land_id: &str) -> StoreResult<Vec<DocumentVersion>> {
        let state = self.lock()?;
        Ok(state
            .versions
            .iter()
            .filter(|version| version.land_id == land_id)
            .cloned()
            .collect())
    }

    fn append(
        &self,
        observed_latest: Option<i32>,
        version: &DocumentVersion,
    ) -> StoreResult<DocumentVersion> {
        let key = version.key();
        let mut state = self.lock()?;

        let current = state
            .versions
            .iter_mut()
            .find(|existing| existing.is_latest && existing.key() == key);
        let found = current.as_ref().map(|existing| existing.version_number);
        if found != observed_latest {
            return Err(StoreError::PreconditionFailed(format!(
                "{key}: latest version is {found:?}, caller observed {observed_latest:?}"
            )));
        }
        if let Some(prior) = current {
            prior.is_latest = false;
        }

        let mut stored = version.clone();
        stored.is_latest = true;
        state.versions.push(stored.clone());
        Ok(stored)
    }

    fn apply_transition(
        &self,
        document_id: Uuid,
        patch: &VersionPatch,
    ) -> StoreResult<DocumentVersion> {
        let mut state = self.lock()?;
        let version = state
            .versions
            .iter_mut()
            .find(|version| version.document_id == document_id)
            .ok_or(StoreError::NotFound)?;

        if !patch.matches(version) {
            return Err(StoreError::PreconditionFailed(format!(
                "document {document_id} is {} (locked by {:?})",
                version.version_status, version.review_locked_by
            )));
        }
        patch.apply(version);
        Ok(version.clone())
    }
}

impl AssignmentStore for MemoryStore {
    fn assignments_for_land(&self, land_id: &str) -> StoreResult<Vec<ExplicitAssignment>> {
        let state = self.lock()?;
        let documents: BTreeSet<Uuid> = state
            .versions
            .iter()
            .filter(|version| version.land_id == land_id)
            .map(|version| version.document_id)
            .collect();
        Ok(state
            .assignments
            .iter()
            .filter(|assignment| documents.contains(&assignment.document_id))
            .cloned()
            .collect())
    }

    fn assignments_for_document(
        &self,
        document_id: Uuid,
    ) -> StoreResult<Vec<ExplicitAssignment>> {
        let state = self.lock()?;
        Ok(state
            .assignments
            .iter()
            .filter(|assignment| assignment.document_id == document_id)
            .cloned()
            .collect())
    }

    fn insert_assignment(
        &self,
        assignment: &ExplicitAssignment,
    ) -> StoreResult<ExplicitAssignment> {
        let mut state = self.lock()?;
        if state
            .assignments
            .iter()
            .any(|existing| existing.assignment_id == assignment.assignment_id)
        {
            return Err(StoreError::PreconditionFailed(format!(
                "assignment {} already exists",
                assignment.assignment_id
            )));
        }
        state.assignments.push(assignment.clone());
        Ok(assignment.clone())
    }

    fn update_assignment_status(
        &self,
        assignment_id: Uuid,
        status: AssignmentStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<ExplicitAssignment> {
        let mut state = self.lock()?;
        let assignment = state
            .assignments
            .iter_mut()
            .find(|assignment| assignment.assignment_id == assignment_id)
            .ok_or(StoreError::NotFound)?;
        assignment.assignment_status = status;
        assignment.updated_at = updated_at;
        Ok(assignment.clone())
    }
}

impl UserDirectory for MemoryStore {
    fn role_set_of(&self, user_id: &str) -> StoreResult<BTreeSet<String>> {
        let state = self.lock()?;
        Ok(state.roles.get(user_id).cloned().unwrap_or_default())
    }

    fn profile_of(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        let state = self.lock()?;
        Ok(state.profiles.get(user_id).cloned())
    }
}

impl RoleMappings for MemoryStore {
    fn role_mapping_for(&self, land_id: &str, document_type: &str) -> StoreResult<Vec<String>> {
        let state = self.lock()?;
        let scoped = state
            .land_mappings
            .get(&(land_id.to_string(), document_type.to_string()));
        Ok(scoped
            .or_else(|| state.default_mappings.get(document_type))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::{plan_append, plan_transition, LockCommand, Transition, UploadRequest};

    fn upload(store: &MemoryStore, slot: &str) -> StoreResult<DocumentVersion> {
        let request = UploadRequest {
            key: DocumentKey::new("land-1", "survey", slot),
            uploaded_by: "owner".into(),
            file_name: "survey.pdf".into(),
            size_bytes: 12,
            mime_type: None,
            expected_latest: None,
            subtask_id: None,
        };
        let prior = store.latest(&request.key)?;
        let plan = plan_append(prior.as_ref(), &request, Uuid::new_v4(), Utc::now()).unwrap();
        store.append(plan.observed_latest, &plan.version)
    }

    #[test]
    fn append_keeps_a_single_latest_per_chain() {
        let store = MemoryStore::new();
        for _ in 0..4 {
            upload(&store, "D1").unwrap();
        }
        upload(&store, "D2").unwrap();

        let key = DocumentKey::new("land-1", "survey", "D1");
        let versions = store.versions(&key).unwrap();
        let numbers: Vec<i32> = versions.iter().map(|v| v.version_number).collect();
        assert_eq!(numbers, vec![4, 3, 2, 1]);
        assert_eq!(versions.iter().filter(|v| v.is_latest).count(), 1);
        assert!(versions[0].is_latest);
        assert_eq!(store.versions_for_type("land-1", "survey").unwrap().len(), 5);
    }

    #[test]
    fn stale_append_is_rejected() {
        let store = MemoryStore::new();
        let first = upload(&store, "D1").unwrap();
        let request = UploadRequest {
            key: first.key(),
            uploaded_by: "owner".into(),
            file_name: "survey-v2.pdf".into(),
            size_bytes: 12,
            mime_type: None,
            expected_latest: None,
            subtask_id: None,
        };
        let plan = plan_append(Some(&first), &request, Uuid::new_v4(), Utc::now()).unwrap();
        upload(&store, "D1").unwrap();

        let err = store.append(plan.observed_latest, &plan.version).unwrap_err();
        assert!(matches!(err, StoreError::PreconditionFailed(_)));
        assert_eq!(store.versions(&first.key()).unwrap().len(), 2);
    }

    #[test]
    fn transition_checks_expected_state() {
        let store = MemoryStore::new();
        let version = upload(&store, "D1").unwrap();
        let Transition::Apply(patch) =
            plan_transition(&version, LockCommand::Lock, "analyst", Utc::now()).unwrap()
        else {
            panic!("expected a patch");
        };

        let locked = store.apply_transition(version.document_id, &patch).unwrap();
        assert_eq!(locked.review_locked_by.as_deref(), Some("analyst"));

        let err = store
            .apply_transition(version.document_id, &patch)
            .unwrap_err();
        assert!(matches!(err, StoreError::PreconditionFailed(_)));
        assert!(matches!(
            store.apply_transition(Uuid::new_v4(), &patch),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn role_mapping_falls_back_to_default() {
        let store = MemoryStore::new();
        store
            .set_role_mapping(None, "survey", ["re_analyst", "re_governance_lead"])
            .unwrap();
        store
            .set_role_mapping(Some("land-9"), "survey", ["re_surveyor"])
            .unwrap();

        assert_eq!(
            store.role_mapping_for("land-1", "survey").unwrap(),
            vec!["re_analyst", "re_governance_lead"]
        );
        assert_eq!(
            store.role_mapping_for("land-9", "survey").unwrap(),
            vec!["re_surveyor"]
        );
        assert!(store.role_mapping_for("land-1", "tax").unwrap().is_empty());
    }
}
