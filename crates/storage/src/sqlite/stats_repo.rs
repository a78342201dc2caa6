use async_trait::async_trait;
use drill_core::model::{UserAggregateStats, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_stats_row, to_json, u64_to_i64};
use crate::repository::{StorageError, UserStatsRepository};

#[async_trait]
impl UserStatsRepository for SqliteRepository {
    async fn get_stats(&self, user: &UserId) -> Result<Option<UserAggregateStats>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                user_id, total_questions_answered, last_fifty_answers,
                current_rolling_accuracy, previous_rolling_accuracy,
                practice_streak, last_practice_date
            FROM user_stats
            WHERE user_id = ?1
            ",
        )
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_stats_row).transpose()
    }

    async fn save_stats(&self, stats: &UserAggregateStats) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO user_stats (
                user_id, total_questions_answered, last_fifty_answers,
                current_rolling_accuracy, previous_rolling_accuracy,
                practice_streak, last_practice_date
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id) DO UPDATE SET
                total_questions_answered = excluded.total_questions_answered,
                last_fifty_answers = excluded.last_fifty_answers,
                current_rolling_accuracy = excluded.current_rolling_accuracy,
                previous_rolling_accuracy = excluded.previous_rolling_accuracy,
                practice_streak = excluded.practice_streak,
                last_practice_date = excluded.last_practice_date
            ",
        )
        .bind(stats.user_id().as_str())
        .bind(u64_to_i64(
            "total_questions_answered",
            stats.total_questions_answered(),
        )?)
        .bind(to_json(stats.last_fifty_answers())?)
        .bind(stats.current_rolling_accuracy())
        .bind(stats.previous_rolling_accuracy())
        .bind(i64::from(stats.practice_streak()))
        .bind(stats.last_practice_date())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn snapshot_previous_accuracy(&self, user: &UserId) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r"
            UPDATE user_stats
            SET previous_rolling_accuracy = current_rolling_accuracy
            WHERE user_id = ?1
            ",
        )
        .bind(user.as_str())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(result.rows_affected() > 0)
    }
}
