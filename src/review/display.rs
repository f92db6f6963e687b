use serde::{Deserialize, Serialize};

pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown user";

/// Returns the first non-blank candidate, trimmed, or [`UNKNOWN_DISPLAY_NAME`].
pub fn resolve_display_name<'a, I>(candidates: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_DISPLAY_NAME.to_string())
}

/// Profile fields as exposed by the identity collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserProfile {
    /// Name sources in precedence order: full name, display name, username,
    /// the local part of the e-mail address, then the raw user id.
    pub fn name_candidates(&self) -> [Option<&str>; 5] {
        let email_local = self
            .email
            .as_deref()
            .and_then(|email| email.split('@').next());
        [
            self.full_name.as_deref(),
            self.display_name.as_deref(),
            self.username.as_deref(),
            email_local,
            Some(self.user_id.as_str()),
        ]
    }

    pub fn resolved_name(&self) -> String {
        resolve_display_name(self.name_candidates())
    }
}
