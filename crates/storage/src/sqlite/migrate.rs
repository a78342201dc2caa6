use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the catalog (questions with per-option tallies), topic progress,
/// user aggregate stats, daily activity and user settings tables.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS questions (
                    id TEXT PRIMARY KEY,
                    seq INTEGER NOT NULL UNIQUE,
                    subcategories TEXT NOT NULL,
                    question_text TEXT NOT NULL,
                    options TEXT NOT NULL,
                    correct_answer_index INTEGER NOT NULL CHECK (correct_answer_index >= 0),
                    solution_text TEXT NOT NULL,
                    solution_diagram_svg TEXT,
                    global_total_attempts INTEGER NOT NULL DEFAULT 0
                        CHECK (global_total_attempts >= 0),
                    global_correct_attempts INTEGER NOT NULL DEFAULT 0
                        CHECK (global_correct_attempts >= 0),
                    global_total_time_spent REAL NOT NULL DEFAULT 0
                        CHECK (global_total_time_spent >= 0)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS question_option_counts (
                    question_id TEXT NOT NULL,
                    option_index INTEGER NOT NULL CHECK (option_index >= 0),
                    selections INTEGER NOT NULL DEFAULT 0 CHECK (selections >= 0),
                    PRIMARY KEY (question_id, option_index),
                    FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS topic_progress (
                    user_id TEXT NOT NULL,
                    topic TEXT NOT NULL,
                    mastery_score REAL NOT NULL CHECK (mastery_score BETWEEN 0 AND 1),
                    total_attempts INTEGER NOT NULL CHECK (total_attempts >= 0),
                    correct_attempts INTEGER NOT NULL
                        CHECK (correct_attempts >= 0 AND correct_attempts <= total_attempts),
                    total_time_spent REAL NOT NULL CHECK (total_time_spent >= 0),
                    last_reviewed_at TEXT NOT NULL,
                    next_review_date TEXT NOT NULL,
                    PRIMARY KEY (user_id, topic)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS user_stats (
                    user_id TEXT PRIMARY KEY,
                    total_questions_answered INTEGER NOT NULL
                        CHECK (total_questions_answered >= 0),
                    last_fifty_answers TEXT NOT NULL,
                    current_rolling_accuracy REAL NOT NULL
                        CHECK (current_rolling_accuracy BETWEEN 0 AND 100),
                    previous_rolling_accuracy REAL NOT NULL
                        CHECK (previous_rolling_accuracy BETWEEN 0 AND 100),
                    practice_streak INTEGER NOT NULL CHECK (practice_streak >= 0),
                    last_practice_date TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS daily_activity (
                    user_id TEXT NOT NULL,
                    day TEXT NOT NULL,
                    question_id TEXT NOT NULL,
                    PRIMARY KEY (user_id, day, question_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS user_settings (
                    user_id TEXT PRIMARY KEY,
                    daily_question_limit INTEGER NOT NULL
                        CHECK (daily_question_limit BETWEEN 5 AND 50),
                    role TEXT,
                    test_date TEXT
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_topic_progress_user_next_review
                    ON topic_progress (user_id, next_review_date);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
