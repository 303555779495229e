//! User preference repository.

use parley_types::error::StorageError;
use parley_types::preference::UserPreference;

use crate::storage::context::StorageContext;

use super::base::Repository;

/// Repository for user preferences. Pass-through point reads and
/// upserts keyed by user id as both id and partition.
pub struct UserPreferenceRepository<C> {
    repo: Repository<UserPreference, C>,
}

impl<C: StorageContext<UserPreference>> UserPreferenceRepository<C> {
    pub fn new(context: C) -> Self {
        Self { repo: Repository::new(context) }
    }

    /// The user's stored preference, or `None` if they have never saved
    /// one.
    pub async fn get_user_preference(
        &self,
        user_id: &str,
    ) -> Result<Option<UserPreference>, StorageError> {
        self.repo.try_find_by_id(user_id, None).await
    }

    /// Save or replace the user's preference.
    pub async fn save_user_preference(
        &self,
        preference: &UserPreference,
    ) -> Result<(), StorageError> {
        if preference.id != preference.user_id {
            return Err(StorageError::validation(
                "preference id must equal the user id",
            ));
        }
        self.repo.upsert(preference).await
    }
}
