use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::review::{
    aggregate_type, plan_append, plan_transition, reconcile, resolve_all, Assignment,
    AssignmentStatus, Decision, DocumentKey, DocumentVersion, ExplicitAssignment, LockCommand,
    ReconciledAssignment, ReviewError, ReviewResult, RoleStatusEntry, Transition,
    TypeSummary, UploadRequest,
};
use crate::store::{AssignmentStore, DocumentStore, RoleMappings, StoreError, UserDirectory};

/// Which versions of a slot `role_statuses` resolves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusScope {
    #[default]
    Latest,
    All,
}

/// Request-facing facade over the review domain and its collaborators.
pub struct ReviewEngine {
    documents: Arc<dyn DocumentStore>,
    assignments: Arc<dyn AssignmentStore>,
    directory: Arc<dyn UserDirectory>,
    mappings: Arc<dyn RoleMappings>,
}

impl ReviewEngine {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        assignments: Arc<dyn AssignmentStore>,
        directory: Arc<dyn UserDirectory>,
        mappings: Arc<dyn RoleMappings>,
    ) -> Self {
        Self {
            documents,
            assignments,
            directory,
            mappings,
        }
    }

    /// Wires every collaborator to a single store implementation.
    pub fn with_store<S>(store: Arc<S>) -> Self
    where
        S: DocumentStore + AssignmentStore + UserDirectory + RoleMappings + 'static,
    {
        Self::new(store.clone(), store.clone(), store.clone(), store)
    }

    pub fn directory(&self) -> &dyn UserDirectory {
        self.directory.as_ref()
    }

    pub fn record_upload(&self, request: UploadRequest) -> ReviewResult<DocumentVersion> {
        let key = DocumentKey::new(
            request.key.land_id.trim(),
            request.key.document_type.trim(),
            &request.key.slot,
        );
        let prior = self.documents.latest(&key)?;
        let plan = plan_append(prior.as_ref(), &request, Uuid::new_v4(), Utc::now())?;

        let stored = match self.documents.append(plan.observed_latest, &plan.version) {
            Ok(stored) => stored,
            Err(StoreError::PreconditionFailed(detail)) => {
                warn!(%key, observed = ?plan.observed_latest, %detail, "upload lost version race");
                return Err(ReviewError::Conflict(format!("{key}: {detail}")));
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            document_id = %stored.document_id,
            %key,
            version_number = stored.version_number,
            uploaded_by = %stored.uploaded_by,
            "recorded document version"
        );
        Ok(stored)
    }

    pub fn get_latest(&self, key: &DocumentKey) -> ReviewResult<DocumentVersion> {
        self.documents
            .latest(key)?
            .ok_or_else(|| ReviewError::NotFound(format!("document slot {key}")))
    }

    pub fn list_versions(&self, key: &DocumentKey) -> ReviewResult<Vec<DocumentVersion>> {
        Ok(self.documents.versions(key)?)
    }

    pub fn lock(&self, document_id: Uuid, actor: &str) -> ReviewResult<DocumentVersion> {
        self.transition(document_id, actor, LockCommand::Lock)
    }

    pub fn unlock(&self, document_id: Uuid, actor: &str) -> ReviewResult<DocumentVersion> {
        self.transition(document_id, actor, LockCommand::Unlock)
    }

    pub fn decide(
        &self,
        document_id: Uuid,
        actor: &str,
        decision: Decision,
    ) -> ReviewResult<DocumentVersion> {
        self.transition(document_id, actor, LockCommand::Decide(decision))
    }

    pub fn slot_summary(&self, land_id: &str, document_type: &str) -> ReviewResult<TypeSummary> {
        let versions = self.documents.versions_for_type(land_id, document_type)?;
        if versions.is_empty() {
            return Err(ReviewError::NotFound(format!(
                "document type {document_type} on land {land_id}"
            )));
        }
        Ok(aggregate_type(document_type, &versions))
    }

    /// Per-role statuses for the latest version of a slot, or for every version.
    pub fn role_statuses(
        &self,
        key: &DocumentKey,
        scope: StatusScope,
    ) -> ReviewResult<Vec<RoleStatusEntry>> {
        let versions = match scope {
            StatusScope::Latest => vec![self.get_latest(key)?],
            StatusScope::All => {
                let versions = self.documents.versions(key)?;
                if versions.is_empty() {
                    return Err(ReviewError::NotFound(format!("document slot {key}")));
                }
                versions
            }
        };

        let role_keys = self
            .mappings
            .role_mapping_for(&key.land_id, &key.document_type)?;

        let mut entries = Vec::with_capacity(versions.len() * role_keys.len());
        for version in &versions {
            let assignments: Vec<Assignment> = self
                .assignments
                .assignments_for_document(version.document_id)?
                .into_iter()
                .map(Assignment::from)
                .collect();
            let locker_roles = match version.lock_holder() {
                Some(holder) => self.directory.role_set_of(holder)?,
                None => BTreeSet::new(),
            };
            entries.extend(resolve_all(version, &role_keys, &assignments, &locker_roles));
        }
        Ok(entries)
    }

    pub fn reconcile_assignments(&self, land_id: &str) -> ReviewResult<Vec<ReconciledAssignment>> {
        let documents = self.documents.versions_for_land(land_id)?;
        let explicit = self.assignments.assignments_for_land(land_id)?;
        Ok(reconcile(&documents, &explicit))
    }

    /// Creates an explicit assignment row. A role, when given, must be mapped
    /// for the document's type and held by the assignee.
    pub fn assign_reviewer(
        &self,
        document_id: Uuid,
        assigned_to: &str,
        reviewer_role: Option<&str>,
    ) -> ReviewResult<ExplicitAssignment> {
        let assigned_to = assigned_to.trim();
        if assigned_to.is_empty() {
            return Err(ReviewError::InvalidInput("assignee is required".into()));
        }
        let version = self.find_version(document_id)?;

        let reviewer_role = reviewer_role.map(str::trim).filter(|role| !role.is_empty());
        if let Some(role) = reviewer_role {
            let mapping = self
                .mappings
                .role_mapping_for(&version.land_id, &version.document_type)?;
            if !mapping.iter().any(|mapped| mapped == role) {
                return Err(ReviewError::UnknownRole(format!(
                    "{role} is not mapped for {}",
                    version.document_type
                )));
            }
            if !self.directory.role_set_of(assigned_to)?.contains(role) {
                return Err(ReviewError::UnknownRole(format!(
                    "{assigned_to} does not hold {role}"
                )));
            }
        }

        let now = Utc::now();
        let assignment = ExplicitAssignment {
            assignment_id: Uuid::new_v4(),
            document_id,
            assigned_to: assigned_to.to_string(),
            reviewer_role: reviewer_role.map(str::to_string),
            assignment_status: AssignmentStatus::Assigned,
            assigned_at: now,
            updated_at: now,
        };
        let stored = self.assignments.insert_assignment(&assignment)?;
        info!(
            assignment_id = %stored.assignment_id,
            document_id = %document_id,
            assigned_to = %stored.assigned_to,
            reviewer_role = ?stored.reviewer_role,
            "created review assignment"
        );
        Ok(stored)
    }

    pub fn update_assignment_status(
        &self,
        assignment_id: Uuid,
        status: AssignmentStatus,
    ) -> ReviewResult<ExplicitAssignment> {
        match self
            .assignments
            .update_assignment_status(assignment_id, status, Utc::now())
        {
            Ok(updated) => Ok(updated),
            Err(StoreError::NotFound) => {
                Err(ReviewError::NotFound(format!("assignment {assignment_id}")))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn find_version(&self, document_id: Uuid) -> ReviewResult<DocumentVersion> {
        self.documents
            .find(document_id)?
            .ok_or_else(|| ReviewError::NotFound(format!("document {document_id}")))
    }

    fn ensure_reviewer(&self, version: &DocumentVersion, actor: &str) -> ReviewResult<()> {
        let mapping = self
            .mappings
            .role_mapping_for(&version.land_id, &version.document_type)?;
        let held = self.directory.role_set_of(actor)?;
        if mapping.iter().any(|role| held.contains(role)) {
            Ok(())
        } else {
            Err(ReviewError::UnknownRole(format!(
                "{actor} holds no reviewer role for {}",
                version.document_type
            )))
        }
    }

    fn transition(
        &self,
        document_id: Uuid,
        actor: &str,
        command: LockCommand,
    ) -> ReviewResult<DocumentVersion> {
        let actor = actor.trim();
        if actor.is_empty() {
            return Err(ReviewError::InvalidInput("actor is required".into()));
        }
        let current = self.find_version(document_id)?;
        self.ensure_reviewer(&current, actor)?;

        let patch = match plan_transition(&current, command, actor, Utc::now()) {
            Ok(Transition::Unchanged) => return Ok(current),
            Ok(Transition::Apply(patch)) => patch,
            Err(err) => {
                warn!(%document_id, actor, command = command.label(), error = %err, "review transition rejected");
                return Err(err);
            }
        };

        match self.documents.apply_transition(document_id, &patch) {
            Ok(updated) => {
                info!(
                    %document_id,
                    actor,
                    command = command.label(),
                    version_status = %updated.version_status,
                    "applied review transition"
                );
                Ok(updated)
            }
            Err(StoreError::PreconditionFailed(detail)) => {
                // classify the lost race against the state that won it
                let latest = self.find_version(document_id)?;
                warn!(%document_id, actor, command = command.label(), %detail, "review transition lost race");
                match plan_transition(&latest, command, actor, Utc::now()) {
                    Err(err) => Err(err),
                    Ok(Transition::Unchanged) => Ok(latest),
                    Ok(Transition::Apply(_)) => Err(ReviewError::Conflict(format!(
                        "document {document_id}: {detail}"
                    ))),
                }
            }
            Err(StoreError::NotFound) => {
                Err(ReviewError::NotFound(format!("document {document_id}")))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::{ReviewState, VersionStatus, VersionPatch};
    use crate::store::{MemoryStore, StoreResult};
    use std::sync::Mutex;

    const OWNERSHIP: &str = "ownership-documents";

    fn engine() -> (Arc<MemoryStore>, ReviewEngine) {
        let store = Arc::new(MemoryStore::new());
        store
            .set_role_mapping(None, OWNERSHIP, ["re_analyst", "re_governance_lead"])
            .unwrap();
        store.grant_roles("analyst", ["re_analyst"]).unwrap();
        store.grant_roles("lead", ["re_governance_lead"]).unwrap();
        let engine = ReviewEngine::with_store(store.clone());
        (store, engine)
    }

    fn deed_request(slot: &str) -> UploadRequest {
        UploadRequest {
            key: DocumentKey::new("land-1", OWNERSHIP, slot),
            uploaded_by: "owner".into(),
            file_name: "title-deed.pdf".into(),
            size_bytes: 4096,
            mime_type: None,
            expected_latest: None,
            subtask_id: None,
        }
    }

    fn upload(engine: &ReviewEngine, slot: &str) -> DocumentVersion {
        engine.record_upload(deed_request(slot)).unwrap()
    }

    fn status_of<'a>(entries: &'a [RoleStatusEntry], role: &str) -> &'a RoleStatusEntry {
        entries
            .iter()
            .find(|entry| entry.role_key == role)
            .expect("role entry")
    }

    #[test]
    fn upload_lock_decide_scenario() {
        let (_store, engine) = engine();
        let v1 = upload(&engine, "D1");
        assert_eq!(v1.version_status, VersionStatus::Pending);
        let key = v1.key();

        engine.lock(v1.document_id, "analyst").unwrap();
        let statuses = engine.role_statuses(&key, StatusScope::Latest).unwrap();
        assert_eq!(
            status_of(&statuses, "re_analyst").status.status,
            ReviewState::UnderReview
        );
        assert_eq!(
            status_of(&statuses, "re_governance_lead").status.status,
            ReviewState::Pending
        );

        let decided = engine
            .decide(v1.document_id, "analyst", Decision::Approve)
            .unwrap();
        let statuses = engine.role_statuses(&key, StatusScope::Latest).unwrap();
        for role in ["re_analyst", "re_governance_lead"] {
            let entry = status_of(&statuses, role);
            assert_eq!(entry.status.status, ReviewState::Approved);
            assert_eq!(entry.status.actor.as_deref(), Some("analyst"));
            assert_eq!(entry.status.at, decided.approved_at);
        }
    }

    #[test]
    fn approved_versions_cannot_be_relocked_until_reupload() {
        let (_store, engine) = engine();
        let v1 = upload(&engine, "D1");
        engine.lock(v1.document_id, "analyst").unwrap();
        engine
            .decide(v1.document_id, "analyst", Decision::Approve)
            .unwrap();

        let err = engine.lock(v1.document_id, "analyst").unwrap_err();
        assert!(matches!(err, ReviewError::NotPending { .. }));

        let v2 = upload(&engine, "D1");
        assert_eq!(v2.version_number, 2);
        assert_eq!(v2.version_status, VersionStatus::Pending);
        engine.lock(v2.document_id, "lead").unwrap();
    }

    #[test]
    fn actors_without_mapped_roles_are_refused() {
        let (store, engine) = engine();
        store.grant_roles("visitor", ["re_marketing"]).unwrap();
        let v1 = upload(&engine, "D1");
        assert!(matches!(
            engine.lock(v1.document_id, "visitor"),
            Err(ReviewError::UnknownRole(_))
        ));
        assert!(matches!(
            engine.lock(Uuid::new_v4(), "analyst"),
            Err(ReviewError::NotFound(_))
        ));
    }

    #[test]
    fn competing_lockers_get_already_locked() {
        let (_store, engine) = engine();
        let v1 = upload(&engine, "D2");
        engine.lock(v1.document_id, "analyst").unwrap();
        let again = engine.lock(v1.document_id, "analyst").unwrap();
        assert_eq!(again.review_locked_by.as_deref(), Some("analyst"));
        assert!(matches!(
            engine.lock(v1.document_id, "lead"),
            Err(ReviewError::AlreadyLocked { .. })
        ));
    }

    #[test]
    fn stale_expected_version_conflicts() {
        let (_store, engine) = engine();
        upload(&engine, "D1");
        upload(&engine, "D1");
        let err = engine
            .record_upload(UploadRequest {
                key: DocumentKey::new("land-1", OWNERSHIP, "D1"),
                uploaded_by: "owner".into(),
                file_name: "title-deed.pdf".into(),
                size_bytes: 1,
                mime_type: None,
                expected_latest: Some(1),
                subtask_id: None,
            })
            .unwrap_err();
        assert!(matches!(err, ReviewError::Conflict(_)));
    }

    #[test]
    fn assignments_validate_roles() {
        let (_store, engine) = engine();
        let v1 = upload(&engine, "D1");
        assert!(matches!(
            engine.assign_reviewer(v1.document_id, "lead", Some("re_analyst")),
            Err(ReviewError::UnknownRole(_))
        ));
        assert!(matches!(
            engine.assign_reviewer(v1.document_id, "lead", Some("re_surveyor")),
            Err(ReviewError::UnknownRole(_))
        ));

        let assignment = engine
            .assign_reviewer(v1.document_id, "lead", Some("re_governance_lead"))
            .unwrap();
        let updated = engine
            .update_assignment_status(assignment.assignment_id, AssignmentStatus::InProgress)
            .unwrap();
        assert_eq!(updated.assignment_status, AssignmentStatus::InProgress);

        let statuses = engine
            .role_statuses(&v1.key(), StatusScope::Latest)
            .unwrap();
        let lead = status_of(&statuses, "re_governance_lead");
        assert_eq!(lead.status.status, ReviewState::InProgress);
        assert_eq!(lead.status.actor.as_deref(), Some("lead"));

        assert!(matches!(
            engine.update_assignment_status(Uuid::new_v4(), AssignmentStatus::Completed),
            Err(ReviewError::NotFound(_))
        ));
    }

    #[test]
    fn summary_and_scope_all() {
        let (_store, engine) = engine();
        let d1 = upload(&engine, "D1");
        upload(&engine, "D1");
        let d2 = upload(&engine, "D2");
        engine.lock(d1.document_id, "analyst").unwrap();

        let summary = engine.slot_summary("land-1", OWNERSHIP).unwrap();
        assert_eq!(summary.slot_keys(), vec!["D1", "D2"]);
        assert_eq!(summary.overall, crate::review::OverallState::HasReview);

        let all = engine
            .role_statuses(&d1.key(), StatusScope::All)
            .unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].version_number, 2);

        assert!(matches!(
            engine.slot_summary("land-1", "tax-clearance"),
            Err(ReviewError::NotFound(_))
        ));
        assert!(engine.get_latest(&d2.key()).unwrap().is_latest);
    }

    type Competitor = Box<dyn FnOnce(&MemoryStore) + Send>;

    /// Delegates to a memory store but lets another writer land first, right
    /// between the engine's read and its conditional write.
    struct RacingStore {
        inner: Arc<MemoryStore>,
        competitor: Mutex<Option<Competitor>>,
    }

    impl RacingStore {
        fn before_next_write(&self, competitor: impl FnOnce(&MemoryStore) + Send + 'static) {
            *self.competitor.lock().unwrap() = Some(Box::new(competitor));
        }

        fn run_competitor(&self) {
            let competitor = self.competitor.lock().unwrap().take();
            if let Some(competitor) = competitor {
                competitor(&self.inner);
            }
        }
    }

    impl DocumentStore for RacingStore {
        fn find(&self, document_id: Uuid) -> StoreResult<Option<DocumentVersion>> {
            self.inner.find(document_id)
        }

        fn latest(&self, key: &DocumentKey) -> StoreResult<Option<DocumentVersion>> {
            self.inner.latest(key)
        }

        fn versions(&self, key: &DocumentKey) -> StoreResult<Vec<DocumentVersion>> {
            self.inner.versions(key)
        }

        fn versions_for_type(
            &self,
            land_id: &str,
            document_type: &str,
        ) -> StoreResult<Vec<DocumentVersion>> {
            self.inner.versions_for_type(land_id, document_type)
        }

        fn versions_for_land(&self, land_id: &str) -> StoreResult<Vec<DocumentVersion>> {
            self.inner.versions_for_land(land_id)
        }

        fn append(
            &self,
            observed_latest: Option<i32>,
            version: &DocumentVersion,
        ) -> StoreResult<DocumentVersion> {
            self.run_competitor();
            self.inner.append(observed_latest, version)
        }

        fn apply_transition(
            &self,
            document_id: Uuid,
            patch: &VersionPatch,
        ) -> StoreResult<DocumentVersion> {
            self.run_competitor();
            self.inner.apply_transition(document_id, patch)
        }
    }

    fn racing_engine() -> (Arc<MemoryStore>, Arc<RacingStore>, ReviewEngine) {
        let (store, _) = engine();
        let racing = Arc::new(RacingStore {
            inner: store.clone(),
            competitor: Mutex::new(None),
        });
        let engine = ReviewEngine::new(racing.clone(), store.clone(), store.clone(), store.clone());
        (store, racing, engine)
    }

    fn competing_transition(store: &MemoryStore, document_id: Uuid, command: LockCommand, actor: &str) {
        let current = store.find(document_id).unwrap().unwrap();
        if let Transition::Apply(patch) =
            plan_transition(&current, command, actor, Utc::now()).unwrap()
        {
            store.apply_transition(document_id, &patch).unwrap();
        }
    }

    #[test]
    fn upload_losing_the_append_race_is_a_conflict() {
        let (store, racing, engine) = racing_engine();
        let v1 = upload(&engine, "D1");

        racing.before_next_write(|store| {
            let request = deed_request("D1");
            let prior = store.latest(&request.key).unwrap();
            let plan = plan_append(prior.as_ref(), &request, Uuid::new_v4(), Utc::now()).unwrap();
            store.append(plan.observed_latest, &plan.version).unwrap();
        });

        let lost = engine.record_upload(deed_request("D1"));
        assert!(matches!(lost, Err(ReviewError::Conflict(_))));

        let versions = store.versions(&v1.key()).unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions.iter().filter(|v| v.is_latest).count(), 1);
    }

    #[test]
    fn second_locker_losing_the_race_sees_already_locked() {
        let (store, racing, engine) = racing_engine();
        let id = upload(&engine, "D1").document_id;

        racing.before_next_write(move |store| {
            competing_transition(store, id, LockCommand::Lock, "analyst")
        });

        let err = engine.lock(id, "lead").unwrap_err();
        assert!(matches!(err, ReviewError::AlreadyLocked { ref holder, .. } if holder == "analyst"));
        let stored = store.find(id).unwrap().unwrap();
        assert_eq!(stored.lock_holder(), Some("analyst"));
    }

    #[test]
    fn holder_relocking_during_a_race_succeeds() {
        let (_store, racing, engine) = racing_engine();
        let id = upload(&engine, "D1").document_id;

        racing.before_next_write(move |store| {
            competing_transition(store, id, LockCommand::Lock, "analyst")
        });

        let locked = engine.lock(id, "analyst").unwrap();
        assert_eq!(locked.version_status, VersionStatus::UnderReview);
        assert_eq!(locked.lock_holder(), Some("analyst"));
    }

    #[test]
    fn unlock_racing_a_lock_handover_is_a_conflict() {
        let (store, racing, engine) = racing_engine();
        let id = upload(&engine, "D1").document_id;
        engine.lock(id, "analyst").unwrap();

        racing.before_next_write(move |store| {
            competing_transition(store, id, LockCommand::Unlock, "analyst");
            competing_transition(store, id, LockCommand::Lock, "lead");
        });

        let err = engine.unlock(id, "analyst").unwrap_err();
        assert!(matches!(err, ReviewError::Conflict(_)));
        let stored = store.find(id).unwrap().unwrap();
        assert_eq!(stored.version_status, VersionStatus::UnderReview);
        assert_eq!(stored.lock_holder(), Some("lead"));
    }
}
