use std::sync::Arc;

use tracing::info;

use drill_core::model::{SettingsUpdate, UserId, UserSettings};
use storage::repository::UserSettingsRepository;

use crate::error::ServiceError;

#[derive(Clone)]
pub struct SettingsService {
    repo: Arc<dyn UserSettingsRepository>,
}

impl SettingsService {
    #[must_use]
    pub fn new(repo: Arc<dyn UserSettingsRepository>) -> Self {
        Self { repo }
    }

    /// Load persisted settings (or defaults if missing).
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` on storage failures.
    pub async fn load(&self, user: &UserId) -> Result<UserSettings, ServiceError> {
        let settings = self.repo.get_settings(user).await?;
        Ok(settings.unwrap_or_default())
    }

    /// Merge a partial update into the stored settings and persist the result.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Settings` if the update is empty or invalid, or
    /// `ServiceError::Storage` if persistence fails.
    pub async fn update(
        &self,
        user: &UserId,
        update: SettingsUpdate,
    ) -> Result<UserSettings, ServiceError> {
        let settings = self.load(user).await?.apply(update)?;
        self.repo.save_settings(user, &settings).await?;
        info!(
            user = %user,
            daily_question_limit = settings.daily_question_limit(),
            "settings updated"
        );
        Ok(settings)
    }
}
