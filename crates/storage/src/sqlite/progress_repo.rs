use async_trait::async_trait;
use drill_core::model::{ProgressUpdate, Topic, TopicProgress, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_progress_row};
use crate::repository::{StorageError, TopicProgressRepository};

#[async_trait]
impl TopicProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        user: &UserId,
        topic: &Topic,
    ) -> Result<Option<TopicProgress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                user_id, topic, mastery_score, total_attempts, correct_attempts,
                total_time_spent, last_reviewed_at, next_review_date
            FROM topic_progress
            WHERE user_id = ?1 AND topic = ?2
            ",
        )
        .bind(user.as_str())
        .bind(topic.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn upsert_progress(
        &self,
        user: &UserId,
        topic: &Topic,
        update: &ProgressUpdate,
    ) -> Result<TopicProgress, StorageError> {
        if !(0.0..=1.0).contains(&update.mastery_score) {
            return Err(StorageError::Serialization(format!(
                "mastery score out of range: {}",
                update.mastery_score
            )));
        }

        // Counters are incremented in SQL; mastery and dates are last-writer-wins.
        let row = sqlx::query(
            r"
            INSERT INTO topic_progress (
                user_id, topic, mastery_score, total_attempts, correct_attempts,
                total_time_spent, last_reviewed_at, next_review_date
            )
            VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id, topic) DO UPDATE SET
                mastery_score = excluded.mastery_score,
                total_attempts = total_attempts + 1,
                correct_attempts = correct_attempts + excluded.correct_attempts,
                total_time_spent = total_time_spent + excluded.total_time_spent,
                last_reviewed_at = excluded.last_reviewed_at,
                next_review_date = excluded.next_review_date
            RETURNING
                user_id, topic, mastery_score, total_attempts, correct_attempts,
                total_time_spent, last_reviewed_at, next_review_date
            ",
        )
        .bind(user.as_str())
        .bind(topic.as_str())
        .bind(update.mastery_score)
        .bind(i64::from(update.correct))
        .bind(update.time_spent)
        .bind(update.reviewed_at)
        .bind(update.next_review_date)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        map_progress_row(&row)
    }

    async fn list_progress_by_user(
        &self,
        user: &UserId,
    ) -> Result<Vec<TopicProgress>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                user_id, topic, mastery_score, total_attempts, correct_attempts,
                total_time_spent, last_reviewed_at, next_review_date
            FROM topic_progress
            WHERE user_id = ?1
            ORDER BY topic ASC
            ",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(map_progress_row(&row)?);
        }
        Ok(records)
    }

    async fn delete_all_progress_by_user(&self, user: &UserId) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM topic_progress WHERE user_id = ?1")
            .bind(user.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(result.rows_affected())
    }
}
