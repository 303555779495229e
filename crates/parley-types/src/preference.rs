//! Per-user UI preference flags.

use serde::{Deserialize, Serialize};

use crate::entity::StorageEntity;

/// Feature flags a user has toggled.
///
/// Keyed by user id on all three axes: `id == user_id == partition`, so a
/// preference is always a point read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreference {
    pub id: String,
    pub user_id: String,
    pub dark_mode: bool,
    pub persona: bool,
    pub simplified_chat: bool,
    pub export_chat: bool,
}

impl UserPreference {
    /// Create a preference record for a user with all flags off.
    pub fn new(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            id: user_id.clone(),
            user_id,
            dark_mode: false,
            persona: false,
            simplified_chat: false,
            export_chat: false,
        }
    }
}

impl StorageEntity for UserPreference {
    fn id(&self) -> &str {
        &self.id
    }

    fn partition(&self) -> &str {
        &self.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_keys_align() {
        let pref = UserPreference::new("u1");
        assert_eq!(pref.id(), "u1");
        assert_eq!(pref.partition(), "u1");
        assert!(!pref.dark_mode);
    }
}
