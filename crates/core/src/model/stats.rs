use std::collections::VecDeque;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::UserId;

/// Number of most recent answers the rolling accuracy is computed over.
pub const ROLLING_WINDOW: usize = 50;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum StatsError {
    #[error("rolling window holds {len} answers, limit is 50")]
    WindowTooLong { len: usize },

    #[error("rolling accuracy must be in [0, 100], got {provided}")]
    InvalidAccuracy { provided: f64 },
}

/// Direction of the rolling accuracy since the last session snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyTrend {
    Up,
    Down,
    Flat,
}

/// Next streak value given the last practice day and today.
///
/// Same day keeps the streak, the following day extends it, and any longer gap
/// starts over at 1. A last practice day in the future is treated as today.
#[must_use]
pub fn next_streak(current: u32, last_practice: NaiveDate, today: NaiveDate) -> u32 {
    match (today - last_practice).num_days() {
        gap if gap <= 0 => current,
        1 => current.saturating_add(1),
        _ => 1,
    }
}

/// Rolling accuracy (percent) over a window of correctness flags.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rolling_accuracy(window: &VecDeque<bool>) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let correct = window.iter().filter(|c| **c).count();
    // window length is bounded by ROLLING_WINDOW
    100.0 * correct as f64 / window.len() as f64
}

//
// ─── USER AGGREGATE STATS ──────────────────────────────────────────────────────
//

/// Per-user rolling accuracy and practice streak.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAggregateStats {
    user_id: UserId,
    total_questions_answered: u64,
    last_fifty_answers: VecDeque<bool>,
    current_rolling_accuracy: f64,
    previous_rolling_accuracy: f64,
    practice_streak: u32,
    last_practice_date: NaiveDate,
}

impl UserAggregateStats {
    /// State after a learner's very first answer.
    #[must_use]
    pub fn first_answer(user_id: UserId, correct: bool, today: NaiveDate) -> Self {
        let mut window = VecDeque::with_capacity(ROLLING_WINDOW);
        window.push_back(correct);
        let accuracy = rolling_accuracy(&window);
        Self {
            user_id,
            total_questions_answered: 1,
            last_fifty_answers: window,
            current_rolling_accuracy: accuracy,
            previous_rolling_accuracy: 0.0,
            practice_streak: 1,
            last_practice_date: today,
        }
    }

    /// Rehydrate stats from storage.
    ///
    /// # Errors
    ///
    /// Returns `StatsError` if the window is longer than [`ROLLING_WINDOW`] or an
    /// accuracy is outside `[0, 100]`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        user_id: UserId,
        total_questions_answered: u64,
        last_fifty_answers: VecDeque<bool>,
        current_rolling_accuracy: f64,
        previous_rolling_accuracy: f64,
        practice_streak: u32,
        last_practice_date: NaiveDate,
    ) -> Result<Self, StatsError> {
        if last_fifty_answers.len() > ROLLING_WINDOW {
            return Err(StatsError::WindowTooLong {
                len: last_fifty_answers.len(),
            });
        }
        for accuracy in [current_rolling_accuracy, previous_rolling_accuracy] {
            if !(0.0..=100.0).contains(&accuracy) {
                return Err(StatsError::InvalidAccuracy { provided: accuracy });
            }
        }

        Ok(Self {
            user_id,
            total_questions_answered,
            last_fifty_answers,
            current_rolling_accuracy,
            previous_rolling_accuracy,
            practice_streak,
            last_practice_date,
        })
    }

    /// Fold one more answer into the window and streak.
    pub fn record_answer(&mut self, correct: bool, today: NaiveDate) {
        self.total_questions_answered = self.total_questions_answered.saturating_add(1);

        self.last_fifty_answers.push_back(correct);
        while self.last_fifty_answers.len() > ROLLING_WINDOW {
            self.last_fifty_answers.pop_front();
        }
        self.current_rolling_accuracy = rolling_accuracy(&self.last_fifty_answers);

        self.practice_streak = next_streak(self.practice_streak, self.last_practice_date, today);
        if today > self.last_practice_date {
            self.last_practice_date = today;
        }
    }

    /// Fold an answer into optional existing stats, creating them on first use.
    #[must_use]
    pub fn recorded(
        existing: Option<Self>,
        user_id: &UserId,
        correct: bool,
        today: NaiveDate,
    ) -> Self {
        match existing {
            Some(mut stats) => {
                stats.record_answer(correct, today);
                stats
            }
            None => Self::first_answer(user_id.clone(), correct, today),
        }
    }

    /// Remember the current accuracy as the baseline for the session that is starting.
    pub fn snapshot_previous_accuracy(&mut self) {
        self.previous_rolling_accuracy = self.current_rolling_accuracy;
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn total_questions_answered(&self) -> u64 {
        self.total_questions_answered
    }

    #[must_use]
    pub fn last_fifty_answers(&self) -> &VecDeque<bool> {
        &self.last_fifty_answers
    }

    #[must_use]
    pub fn current_rolling_accuracy(&self) -> f64 {
        self.current_rolling_accuracy
    }

    #[must_use]
    pub fn previous_rolling_accuracy(&self) -> f64 {
        self.previous_rolling_accuracy
    }

    #[must_use]
    pub fn practice_streak(&self) -> u32 {
        self.practice_streak
    }

    #[must_use]
    pub fn last_practice_date(&self) -> NaiveDate {
        self.last_practice_date
    }

    #[must_use]
    pub fn trend(&self) -> AccuracyTrend {
        let delta = self.current_rolling_accuracy - self.previous_rolling_accuracy;
        if delta > f64::EPSILON {
            AccuracyTrend::Up
        } else if delta < -f64::EPSILON {
            AccuracyTrend::Down
        } else {
            AccuracyTrend::Flat
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_today;
    use chrono::Duration;

    fn user() -> UserId {
        UserId::new("u1").unwrap()
    }

    #[test]
    fn first_answer_initializes_state() {
        let today = fixed_today();
        let right = UserAggregateStats::first_answer(user(), true, today);
        assert_eq!(right.current_rolling_accuracy(), 100.0);
        assert_eq!(right.practice_streak(), 1);
        assert_eq!(right.last_practice_date(), today);
        assert_eq!(right.total_questions_answered(), 1);

        let wrong = UserAggregateStats::first_answer(user(), false, today);
        assert_eq!(wrong.current_rolling_accuracy(), 0.0);
    }

    #[test]
    fn window_keeps_most_recent_fifty() {
        let today = fixed_today();
        // answer 0 is wrong, the rest right
        let mut stats = UserAggregateStats::first_answer(user(), false, today);
        for _ in 1..51 {
            stats.record_answer(true, today);
        }
        assert_eq!(stats.total_questions_answered(), 51);
        assert_eq!(stats.last_fifty_answers().len(), ROLLING_WINDOW);
        assert!(stats.last_fifty_answers().iter().all(|c| *c));
        assert_eq!(stats.current_rolling_accuracy(), 100.0);
    }

    #[test]
    fn window_evicts_fifo() {
        let today = fixed_today();
        let mut stats = UserAggregateStats::first_answer(user(), true, today);
        for i in 1..51 {
            stats.record_answer(i % 2 == 0, today);
        }
        // answers 1..=50 remain: 25 even (correct), 25 odd (wrong)
        assert_eq!(stats.last_fifty_answers().front(), Some(&false));
        assert_eq!(stats.last_fifty_answers().back(), Some(&true));
        assert!((stats.current_rolling_accuracy() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn streak_counts_consecutive_days_and_resets_on_gap() {
        let day = fixed_today();
        let mut stats = UserAggregateStats::first_answer(user(), true, day);
        stats.record_answer(true, day + Duration::days(1));
        stats.record_answer(true, day + Duration::days(2));
        assert_eq!(stats.practice_streak(), 3);

        stats.record_answer(false, day + Duration::days(2));
        assert_eq!(stats.practice_streak(), 3);

        stats.record_answer(true, day + Duration::days(4));
        assert_eq!(stats.practice_streak(), 1);
        assert_eq!(stats.last_practice_date(), day + Duration::days(4));
    }

    #[test]
    fn backwards_clock_is_treated_as_same_day() {
        let day = fixed_today();
        assert_eq!(next_streak(4, day, day - Duration::days(1)), 4);
        assert_eq!(next_streak(0, day, day), 0);

        let mut stats = UserAggregateStats::first_answer(user(), true, day);
        stats.record_answer(true, day - Duration::days(3));
        assert_eq!(stats.practice_streak(), 1);
        assert_eq!(stats.last_practice_date(), day);
    }

    #[test]
    fn snapshot_sets_trend_baseline() {
        let today = fixed_today();
        let mut stats = UserAggregateStats::first_answer(user(), true, today);
        stats.snapshot_previous_accuracy();
        assert_eq!(stats.trend(), AccuracyTrend::Flat);

        stats.record_answer(false, today);
        assert_eq!(stats.previous_rolling_accuracy(), 100.0);
        assert_eq!(stats.current_rolling_accuracy(), 50.0);
        assert_eq!(stats.trend(), AccuracyTrend::Down);
    }

    #[test]
    fn persisted_window_is_bounded() {
        let window: VecDeque<bool> = std::iter::repeat_n(true, 51).collect();
        let err =
            UserAggregateStats::from_persisted(user(), 51, window, 100.0, 0.0, 1, fixed_today())
                .unwrap_err();
        assert_eq!(err, StatsError::WindowTooLong { len: 51 });
    }
}
