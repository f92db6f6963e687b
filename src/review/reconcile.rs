use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use super::assignment::{prevailing, Assignment, ExplicitAssignment, VirtualAssignment};
use super::version::{normalize_slot, DocumentVersion, DEFAULT_SLOT};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledAssignment {
    pub assignment: Assignment,
    pub doc_slot: String,
}

/// Fuses explicit assignment rows with assignments implied by review locks.
///
/// The result holds at most one entry per document. A document with explicit
/// rows is represented by the prevailing row (see [`prevailing`]); a locked,
/// non-subtask document without any gets one virtual assignment to its lock
/// holder. Virtual entries come first, then explicit ones in the order their
/// documents first appear in `explicit`.
pub fn reconcile(
    documents: &[DocumentVersion],
    explicit: &[ExplicitAssignment],
) -> Vec<ReconciledAssignment> {
    let mut explicit_order: Vec<Uuid> = Vec::new();
    let mut explicit_by_document: HashMap<Uuid, Vec<&ExplicitAssignment>> = HashMap::new();
    for assignment in explicit {
        explicit_by_document
            .entry(assignment.document_id)
            .or_insert_with(|| {
                explicit_order.push(assignment.document_id);
                Vec::new()
            })
            .push(assignment);
    }

    let mut virtual_seen: HashSet<Uuid> = HashSet::new();
    let synthesized = documents
        .iter()
        .filter(|document| {
            document.is_locked()
                && document.subtask_id.is_none()
                && !explicit_by_document.contains_key(&document.document_id)
        })
        .filter_map(|document| {
            let holder = document.lock_holder()?;
            virtual_seen.insert(document.document_id).then(|| {
                Assignment::Virtual(VirtualAssignment {
                    document_id: document.document_id,
                    assigned_to: holder.to_string(),
                    assigned_at: document.review_locked_at,
                })
            })
        });

    let explicit_rows = explicit_order.iter().filter_map(|document_id| {
        explicit_by_document
            .get(document_id)
            .and_then(|rows| prevailing(rows.iter().copied()))
            .cloned()
            .map(Assignment::Explicit)
    });

    let merged: Vec<Assignment> = synthesized.chain(explicit_rows).collect();

    let slots: HashMap<Uuid, &str> = documents
        .iter()
        .map(|document| (document.document_id, document.slot.as_str()))
        .collect();

    merged
        .into_iter()
        .map(|assignment| {
            let doc_slot = slots
                .get(&assignment.document_id())
                .map(|slot| normalize_slot(slot))
                .unwrap_or_else(|| DEFAULT_SLOT.to_string());
            ReconciledAssignment {
                assignment,
                doc_slot,
            }
        })
        .collect()
}
