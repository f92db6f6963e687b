use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::review::UserProfile;
use crate::store::{MemoryStore, PgStore};

/// Reviewer configuration loaded from a JSON file: role mappings and the
/// users holding each role.
///
/// ```json
/// {
///   "default_mapping": { "ownership-documents": ["re_analyst", "re_governance_lead"] },
///   "land_mappings": { "land-42": { "survey": ["re_surveyor"] } },
///   "users": [{ "user_id": "u-1", "roles": ["re_analyst"], "full_name": "Ama Owusu" }]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub default_mapping: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub land_mappings: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    #[serde(flatten)]
    pub profile: UserProfile,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl SeedData {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid seed file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("seed data must be valid JSON")
    }

    pub fn apply_to_memory(&self, store: &MemoryStore) -> Result<()> {
        for (document_type, roles) in &self.default_mapping {
            store.set_role_mapping(None, document_type, roles.iter().cloned())?;
        }
        for (land_id, mappings) in &self.land_mappings {
            for (document_type, roles) in mappings {
                store.set_role_mapping(Some(land_id), document_type, roles.iter().cloned())?;
            }
        }
        for user in &self.users {
            store.grant_roles(&user.profile.user_id, user.roles.iter().cloned())?;
            store.upsert_profile(user.profile.clone())?;
        }
        Ok(())
    }

    pub fn apply_to_postgres(&self, store: &PgStore) -> Result<()> {
        for (document_type, roles) in &self.default_mapping {
            store
                .replace_role_mapping(None, document_type, roles)
                .with_context(|| format!("failed to store default mapping for {document_type}"))?;
        }
        for (land_id, mappings) in &self.land_mappings {
            for (document_type, roles) in mappings {
                store
                    .replace_role_mapping(Some(land_id), document_type, roles)
                    .with_context(|| {
                        format!("failed to store mapping for {document_type} on {land_id}")
                    })?;
            }
        }
        for user in &self.users {
            store
                .grant_roles(&user.profile.user_id, &user.roles)
                .with_context(|| format!("failed to grant roles to {}", user.profile.user_id))?;
            store.upsert_profile(&user.profile)?;
        }
        Ok(())
    }
}
