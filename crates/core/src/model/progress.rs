use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{Topic, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("mastery score must be in [0, 1], got {provided}")]
    InvalidMastery { provided: f64 },

    #[error("correct attempts ({correct}) exceed total attempts ({total})")]
    CorrectExceedsTotal { correct: u32, total: u32 },

    #[error("total time spent must be finite and non-negative, got {provided}")]
    InvalidTimeSpent { provided: f64 },
}

//
// ─── TOPIC PROGRESS ────────────────────────────────────────────────────────────
//

/// One learner's state for one topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgress {
    user_id: UserId,
    topic: Topic,
    mastery_score: f64,
    total_attempts: u32,
    correct_attempts: u32,
    total_time_spent: f64,
    last_reviewed_at: DateTime<Utc>,
    next_review_date: NaiveDate,
}

impl TopicProgress {
    /// Rehydrate a progress record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the record violates its invariants.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        user_id: UserId,
        topic: Topic,
        mastery_score: f64,
        total_attempts: u32,
        correct_attempts: u32,
        total_time_spent: f64,
        last_reviewed_at: DateTime<Utc>,
        next_review_date: NaiveDate,
    ) -> Result<Self, ProgressError> {
        if !(0.0..=1.0).contains(&mastery_score) {
            return Err(ProgressError::InvalidMastery {
                provided: mastery_score,
            });
        }
        if correct_attempts > total_attempts {
            return Err(ProgressError::CorrectExceedsTotal {
                correct: correct_attempts,
                total: total_attempts,
            });
        }
        if !total_time_spent.is_finite() || total_time_spent < 0.0 {
            return Err(ProgressError::InvalidTimeSpent {
                provided: total_time_spent,
            });
        }

        Ok(Self {
            user_id,
            topic,
            mastery_score,
            total_attempts,
            correct_attempts,
            total_time_spent,
            last_reviewed_at,
            next_review_date,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    #[must_use]
    pub fn mastery_score(&self) -> f64 {
        self.mastery_score
    }

    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    #[must_use]
    pub fn correct_attempts(&self) -> u32 {
        self.correct_attempts
    }

    #[must_use]
    pub fn total_time_spent(&self) -> f64 {
        self.total_time_spent
    }

    #[must_use]
    pub fn last_reviewed_at(&self) -> DateTime<Utc> {
        self.last_reviewed_at
    }

    #[must_use]
    pub fn next_review_date(&self) -> NaiveDate {
        self.next_review_date
    }

    /// A topic is due once its review date is today or earlier.
    #[must_use]
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.next_review_date <= today
    }

    /// Percentage of correct attempts, 0 when never attempted.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            f64::from(self.correct_attempts) / f64::from(self.total_attempts) * 100.0
        }
    }

    /// Mean seconds per attempt, 0 when never attempted.
    #[must_use]
    pub fn average_time(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            self.total_time_spent / f64::from(self.total_attempts)
        }
    }
}

//
// ─── UPDATE ────────────────────────────────────────────────────────────────────
//

/// Mutation applied to a topic record for one answered question.
///
/// Counters are increments (`+1` attempt, `+1` correct when correct,
/// `+time_spent`); mastery, review date and review timestamp are overwritten.
/// Stores must apply the increments atomically and may let the last writer
/// win on the overwritten fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub mastery_score: f64,
    pub next_review_date: NaiveDate,
    pub reviewed_at: DateTime<Utc>,
    pub correct: bool,
    pub time_spent: f64,
}

impl ProgressUpdate {
    /// Apply this update to an existing record, or create the record.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the resulting record would be invalid (for
    /// instance a mastery outside `[0, 1]`).
    pub fn apply(
        &self,
        existing: Option<&TopicProgress>,
        user_id: &UserId,
        topic: &Topic,
    ) -> Result<TopicProgress, ProgressError> {
        let (attempts, correct, time) = existing.map_or((0, 0, 0.0), |p| {
            (p.total_attempts, p.correct_attempts, p.total_time_spent)
        });

        TopicProgress::from_persisted(
            user_id.clone(),
            topic.clone(),
            self.mastery_score,
            attempts.saturating_add(1),
            correct.saturating_add(u32::from(self.correct)),
            time + self.time_spent,
            self.reviewed_at,
            self.next_review_date,
        )
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
