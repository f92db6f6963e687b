use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use tracing::debug;
use uuid::Uuid;

use super::{
    AssignmentStore, DocumentStore, RoleMappings, StoreError, StoreResult, UserDirectory,
};
use crate::db::PgPool;
use crate::models::{
    DocumentVersionRow, NewDocumentVersion, NewReviewAssignment, NewRoleMapping, NewUserRole,
    ReviewAssignmentRow, UserProfileRow,
};
use crate::review::{
    AssignmentStatus, DocumentKey, DocumentVersion, ExplicitAssignment, UserProfile,
    VersionPatch,
};
use crate::schema::{
    document_versions, review_assignments, role_mappings, user_profiles, user_roles,
};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// Diesel-backed store. Conditional writes run in a transaction that holds a
/// row lock (`SELECT ... FOR UPDATE`) on the record being checked.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> StoreResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| StoreError::Unavailable(format!("database pool error: {err}")))
    }

    /// Replaces the mapping for one land, or the system default when `land_id` is `None`.
    pub fn replace_role_mapping(
        &self,
        land_id: Option<&str>,
        document_type: &str,
        roles: &[String],
    ) -> StoreResult<()> {
        let mut conn = self.conn()?;
        conn.transaction::<_, StoreError, _>(|conn| {
            let scope = role_mappings::table
                .filter(role_mappings::document_type.eq(document_type))
                .into_boxed();
            let scope = match land_id {
                Some(land_id) => scope.filter(role_mappings::land_id.eq(land_id)),
                None => scope.filter(role_mappings::land_id.is_null()),
            };
            let existing: Vec<i32> = scope.select(role_mappings::id).load(conn)?;
            diesel::delete(role_mappings::table.filter(role_mappings::id.eq_any(existing)))
                .execute(conn)?;

            let rows: Vec<NewRoleMapping> = roles
                .iter()
                .enumerate()
                .map(|(position, role_key)| NewRoleMapping {
                    land_id: land_id.map(str::to_string),
                    document_type: document_type.to_string(),
                    role_key: role_key.clone(),
                    position: position as i32,
                })
                .collect();
            if !rows.is_empty() {
                diesel::insert_into(role_mappings::table)
                    .values(&rows)
                    .execute(conn)?;
            }
            Ok(())
        })
    }

    pub fn grant_roles(&self, user_id: &str, roles: &[String]) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let rows: Vec<NewUserRole> = roles
            .iter()
            .map(|role_key| NewUserRole {
                user_id: user_id.to_string(),
                role_key: role_key.clone(),
            })
            .collect();
        if rows.is_empty() {
            return Ok(());
        }
        diesel::insert_into(user_roles::table)
            .values(&rows)
            .on_conflict_do_nothing()
            .execute(&mut conn)?;
        Ok(())
    }

    pub fn upsert_profile(&self, profile: &UserProfile) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let row = UserProfileRow::from(profile);
        diesel::insert_into(user_profiles::table)
            .values(&row)
            .on_conflict(user_profiles::user_id)
            .do_update()
            .set(&row)
            .execute(&mut conn)?;
        Ok(())
    }
}

fn chain_query(key: &DocumentKey) -> document_versions::BoxedQuery<'static, diesel::pg::Pg> {
    document_versions::table
        .filter(document_versions::land_id.eq(key.land_id.clone()))
        .filter(document_versions::document_type.eq(key.document_type.clone()))
        .filter(document_versions::doc_slot.eq(key.slot.clone()))
        .into_boxed()
}

fn into_versions(rows: Vec<DocumentVersionRow>) -> Vec<DocumentVersion> {
    rows.into_iter().map(DocumentVersion::from).collect()
}

impl DocumentStore for PgStore {
    fn find(&self, document_id: Uuid) -> StoreResult<Option<DocumentVersion>> {
        let mut conn = self.conn()?;
        let row = document_versions::table
            .find(document_id)
            .first::<DocumentVersionRow>(&mut conn)
            .optional()?;
        Ok(row.map(DocumentVersion::from))
    }

    fn latest(&self, key: &DocumentKey) -> StoreResult<Option<DocumentVersion>> {
        let mut conn = self.conn()?;
        let row = chain_query(key)
            .filter(document_versions::is_latest.eq(true))
            .first::<DocumentVersionRow>(&mut conn)
            .optional()?;
        Ok(row.map(DocumentVersion::from))
    }

    fn versions(&self, key: &DocumentKey) -> StoreResult<Vec<DocumentVersion>> {
        let mut conn = self.conn()?;
        let rows = chain_query(key)
            .order(document_versions::version_number.desc())
            .load::<DocumentVersionRow>(&mut conn)?;
        Ok(into_versions(rows))
    }

    fn versions_for_type(
        &self,
        land_id: &str,
        document_type: &str,
    ) -> StoreResult<Vec<DocumentVersion>> {
        let mut conn = self.conn()?;
        let rows = document_versions::table
            .filter(document_versions::land_id.eq(land_id))
            .filter(document_versions::document_type.eq(document_type))
            .order((
                document_versions::doc_slot.asc(),
                document_versions::version_number.desc(),
            ))
            .load::<DocumentVersionRow>(&mut conn)?;
        Ok(into_versions(rows))
    }

    fn versions_for_land(&self, land_id: &str) -> StoreResult<Vec<DocumentVersion>> {
        let mut conn = self.conn()?;
        let rows = document_versions::table
            .filter(document_versions::land_id.eq(land_id))
            .order((
                document_versions::document_type.asc(),
                document_versions::doc_slot.asc(),
                document_versions::version_number.desc(),
            ))
            .load::<DocumentVersionRow>(&mut conn)?;
        Ok(into_versions(rows))
    }

    fn append(
        &self,
        observed_latest: Option<i32>,
        version: &DocumentVersion,
    ) -> StoreResult<DocumentVersion> {
        let key = version.key();
        let mut conn = self.conn()?;

        conn.transaction::<_, StoreError, _>(|conn| {
            let current = document_versions::table
                .filter(document_versions::land_id.eq(key.land_id.as_str()))
                .filter(document_versions::document_type.eq(key.document_type.as_str()))
                .filter(document_versions::doc_slot.eq(key.slot.as_str()))
                .filter(document_versions::is_latest.eq(true))
                .for_update()
                .first::<DocumentVersionRow>(conn)
                .optional()?;

            let found = current.as_ref().map(|row| row.version_number);
            if found != observed_latest {
                return Err(StoreError::PreconditionFailed(format!(
                    "{key}: latest version is {found:?}, caller observed {observed_latest:?}"
                )));
            }

            if let Some(prior) = current {
                let demoted = diesel::update(
                    document_versions::table
                        .find(prior.document_id)
                        .filter(document_versions::is_latest.eq(true)),
                )
                .set(document_versions::is_latest.eq(false))
                .execute(conn)?;
                if demoted != 1 {
                    return Err(StoreError::PreconditionFailed(format!(
                        "{key}: prior latest {} changed underneath",
                        prior.document_id
                    )));
                }
            }

            let mut new_row = NewDocumentVersion::from(version);
            new_row.is_latest = true;
            // a concurrent first upload surfaces here as a unique violation
            diesel::insert_into(document_versions::table)
                .values(&new_row)
                .execute(conn)?;

            debug!(document_id = %version.document_id, %key, "appended document version");

            let stored = document_versions::table
                .find(version.document_id)
                .first::<DocumentVersionRow>(conn)?;
            Ok(stored.into())
        })
    }

    fn apply_transition(
        &self,
        document_id: Uuid,
        patch: &VersionPatch,
    ) -> StoreResult<DocumentVersion> {
        let mut conn = self.conn()?;

        conn.transaction::<_, StoreError, _>(|conn| {
            let current: DocumentVersion = document_versions::table
                .find(document_id)
                .for_update()
                .first::<DocumentVersionRow>(conn)?
                .into();

            if !patch.matches(&current) {
                return Err(StoreError::PreconditionFailed(format!(
                    "document {document_id} is {} (locked by {:?})",
                    current.version_status, current.review_locked_by
                )));
            }

            diesel::update(document_versions::table.find(document_id))
                .set((
                    document_versions::version_status.eq(Some(patch.version_status.as_str())),
                    document_versions::review_locked_by.eq(patch.review_locked_by.clone()),
                    document_versions::review_locked_at
                        .eq(patch.review_locked_at.map(|at| at.naive_utc())),
                    document_versions::approved_by.eq(patch.approved_by.clone()),
                    document_versions::approved_at.eq(patch.approved_at.map(|at| at.naive_utc())),
                ))
                .execute(conn)?;

            let updated = document_versions::table
                .find(document_id)
                .first::<DocumentVersionRow>(conn)?;
            Ok(updated.into())
        })
    }
}

impl AssignmentStore for PgStore {
    fn assignments_for_land(&self, land_id: &str) -> StoreResult<Vec<ExplicitAssignment>> {
        let mut conn = self.conn()?;
        let rows = review_assignments::table
            .inner_join(document_versions::table)
            .filter(document_versions::land_id.eq(land_id))
            .order(review_assignments::assigned_at.asc())
            .select(review_assignments::all_columns)
            .load::<ReviewAssignmentRow>(&mut conn)?;
        Ok(rows.into_iter().map(ExplicitAssignment::from).collect())
    }

    fn assignments_for_document(
        &self,
        document_id: Uuid,
    ) -> StoreResult<Vec<ExplicitAssignment>> {
        let mut conn = self.conn()?;
        let rows = review_assignments::table
            .filter(review_assignments::document_id.eq(document_id))
            .order(review_assignments::assigned_at.asc())
            .load::<ReviewAssignmentRow>(&mut conn)?;
        Ok(rows.into_iter().map(ExplicitAssignment::from).collect())
    }

    fn insert_assignment(
        &self,
        assignment: &ExplicitAssignment,
    ) -> StoreResult<ExplicitAssignment> {
        let mut conn = self.conn()?;
        diesel::insert_into(review_assignments::table)
            .values(&NewReviewAssignment::from(assignment))
            .execute(&mut conn)?;
        let row = review_assignments::table
            .find(assignment.assignment_id)
            .first::<ReviewAssignmentRow>(&mut conn)?;
        Ok(row.into())
    }

    fn update_assignment_status(
        &self,
        assignment_id: Uuid,
        status: AssignmentStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<ExplicitAssignment> {
        let mut conn = self.conn()?;
        let updated = diesel::update(review_assignments::table.find(assignment_id))
            .set((
                review_assignments::assignment_status.eq(status.as_str()),
                review_assignments::updated_at.eq(updated_at.naive_utc()),
            ))
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        let row = review_assignments::table
            .find(assignment_id)
            .first::<ReviewAssignmentRow>(&mut conn)?;
        Ok(row.into())
    }
}

impl UserDirectory for PgStore {
    fn role_set_of(&self, user_id: &str) -> StoreResult<BTreeSet<String>> {
        let mut conn = self.conn()?;
        let roles = user_roles::table
            .filter(user_roles::user_id.eq(user_id))
            .select(user_roles::role_key)
            .load::<String>(&mut conn)?;
        Ok(roles.into_iter().collect())
    }

    fn profile_of(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        let mut conn = self.conn()?;
        let row = user_profiles::table
            .find(user_id)
            .first::<UserProfileRow>(&mut conn)
            .optional()?;
        Ok(row.map(UserProfile::from))
    }
}

impl RoleMappings for PgStore {
    fn role_mapping_for(&self, land_id: &str, document_type: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn()?;
        let scoped = role_mappings::table
            .filter(role_mappings::land_id.eq(land_id))
            .filter(role_mappings::document_type.eq(document_type))
            .order((role_mappings::position.asc(), role_mappings::id.asc()))
            .select(role_mappings::role_key)
            .load::<String>(&mut conn)?;
        if !scoped.is_empty() {
            return Ok(scoped);
        }

        let defaults = role_mappings::table
            .filter(role_mappings::land_id.is_null())
            .filter(role_mappings::document_type.eq(document_type))
            .order((role_mappings::position.asc(), role_mappings::id.asc()))
            .select(role_mappings::role_key)
            .load::<String>(&mut conn)?;
        Ok(defaults)
    }
}
