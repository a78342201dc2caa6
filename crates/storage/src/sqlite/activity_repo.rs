use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use drill_core::model::{QuestionId, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser};
use crate::repository::{DailyActivityRepository, StorageError};

#[async_trait]
impl DailyActivityRepository for SqliteRepository {
    async fn seen_on(
        &self,
        user: &UserId,
        day: NaiveDate,
    ) -> Result<HashSet<QuestionId>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT question_id
            FROM daily_activity
            WHERE user_id = ?1 AND day = ?2
            ",
        )
        .bind(user.as_str())
        .bind(day)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| {
                let raw: String = row.try_get("question_id").map_err(ser)?;
                QuestionId::new(raw).map_err(ser)
            })
            .collect()
    }

    async fn mark_seen(
        &self,
        user: &UserId,
        day: NaiveDate,
        question: &QuestionId,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO daily_activity (user_id, day, question_id)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id, day, question_id) DO NOTHING
            ",
        )
        .bind(user.as_str())
        .bind(day)
        .bind(question.as_str())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
