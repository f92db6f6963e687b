use std::collections::HashMap;

use crate::review::{resolve_display_name, UserProfile};
use crate::store::{StoreResult, UserDirectory};

/// Read-through cache of user profiles.
///
/// The caller creates one per unit of work (typically a request) and drops it
/// afterwards; nothing is shared between callers.
pub struct ProfileCache<'a> {
    directory: &'a dyn UserDirectory,
    entries: HashMap<String, Option<UserProfile>>,
}

impl<'a> ProfileCache<'a> {
    pub fn new(directory: &'a dyn UserDirectory) -> Self {
        Self {
            directory,
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, user_id: &str) -> StoreResult<Option<&UserProfile>> {
        if !self.entries.contains_key(user_id) {
            let profile = self.directory.profile_of(user_id)?;
            self.entries.insert(user_id.to_string(), profile);
        }
        Ok(self.entries.get(user_id).and_then(Option::as_ref))
    }

    /// Display name for `user_id`; users without a profile show their raw id.
    pub fn display_name(&mut self, user_id: &str) -> StoreResult<String> {
        Ok(match self.get(user_id)? {
            Some(profile) => profile.resolved_name(),
            None => resolve_display_name([Some(user_id)]),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
