use async_trait::async_trait;
use drill_core::model::{UserId, UserSettings};

use super::SqliteRepository;
use super::mapping::{conn, map_settings_row};
use crate::repository::{StorageError, UserSettingsRepository};

#[async_trait]
impl UserSettingsRepository for SqliteRepository {
    async fn get_settings(&self, user: &UserId) -> Result<Option<UserSettings>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT daily_question_limit, role, test_date
            FROM user_settings
            WHERE user_id = ?1
            ",
        )
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_settings_row).transpose()
    }

    async fn save_settings(
        &self,
        user: &UserId,
        settings: &UserSettings,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO user_settings (user_id, daily_question_limit, role, test_date)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                daily_question_limit = excluded.daily_question_limit,
                role = excluded.role,
                test_date = excluded.test_date
            ",
        )
        .bind(user.as_str())
        .bind(i64::from(settings.daily_question_limit()))
        .bind(settings.role().map(|role| role.as_str()))
        .bind(settings.test_date())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
