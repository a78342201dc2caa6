use std::collections::VecDeque;

use drill_core::model::{
    Question, QuestionContent, QuestionId, QuestionStats, Role, Topic, TopicProgress,
    UserAggregateStats, UserId, UserSettings,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn usize_to_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn map_question_row(
    row: &SqliteRow,
    option_selection_counts: Vec<u64>,
) -> Result<Question, StorageError> {
    let id = QuestionId::new(row.try_get::<String, _>("id").map_err(ser)?).map_err(ser)?;
    let topics = from_json::<Vec<String>>(&row.try_get::<String, _>("subcategories").map_err(ser)?)?
        .into_iter()
        .map(Topic::new)
        .collect::<Result<Vec<_>, _>>()
        .map_err(ser)?;

    let correct_answer_index = usize::try_from(
        row.try_get::<i64, _>("correct_answer_index")
            .map_err(ser)?,
    )
    .map_err(ser)?;

    let content = QuestionContent {
        question_text: row.try_get("question_text").map_err(ser)?,
        options: from_json(&row.try_get::<String, _>("options").map_err(ser)?)?,
        correct_answer_index,
        solution_text: row.try_get("solution_text").map_err(ser)?,
        solution_diagram_svg: row.try_get("solution_diagram_svg").map_err(ser)?,
    };

    let stats = QuestionStats::from_persisted(
        i64_to_u64(
            "global_total_attempts",
            row.try_get("global_total_attempts").map_err(ser)?,
        )?,
        i64_to_u64(
            "global_correct_attempts",
            row.try_get("global_correct_attempts").map_err(ser)?,
        )?,
        row.try_get("global_total_time_spent").map_err(ser)?,
        option_selection_counts,
    )
    .map_err(ser)?;

    Question::from_persisted(id, topics, content, stats).map_err(ser)
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<TopicProgress, StorageError> {
    TopicProgress::from_persisted(
        UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)?,
        Topic::new(row.try_get::<String, _>("topic").map_err(ser)?).map_err(ser)?,
        row.try_get("mastery_score").map_err(ser)?,
        i64_to_u32("total_attempts", row.try_get("total_attempts").map_err(ser)?)?,
        i64_to_u32(
            "correct_attempts",
            row.try_get("correct_attempts").map_err(ser)?,
        )?,
        row.try_get("total_time_spent").map_err(ser)?,
        row.try_get("last_reviewed_at").map_err(ser)?,
        row.try_get("next_review_date").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_stats_row(row: &SqliteRow) -> Result<UserAggregateStats, StorageError> {
    let window: VecDeque<bool> =
        from_json(&row.try_get::<String, _>("last_fifty_answers").map_err(ser)?)?;

    UserAggregateStats::from_persisted(
        UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)?,
        i64_to_u64(
            "total_questions_answered",
            row.try_get("total_questions_answered").map_err(ser)?,
        )?,
        window,
        row.try_get("current_rolling_accuracy").map_err(ser)?,
        row.try_get("previous_rolling_accuracy").map_err(ser)?,
        i64_to_u32("practice_streak", row.try_get("practice_streak").map_err(ser)?)?,
        row.try_get("last_practice_date").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_settings_row(row: &SqliteRow) -> Result<UserSettings, StorageError> {
    let role = row
        .try_get::<Option<String>, _>("role")
        .map_err(ser)?
        .map(|raw| raw.parse::<Role>())
        .transpose()
        .map_err(ser)?;

    UserSettings::from_persisted(
        i64_to_u32(
            "daily_question_limit",
            row.try_get("daily_question_limit").map_err(ser)?,
        )?,
        role,
        row.try_get("test_date").map_err(ser)?,
    )
    .map_err(ser)
}
