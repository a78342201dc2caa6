use chrono::{Days, NaiveDate};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum MasteryError {
    #[error("max gain must be in (0, 1], got {provided}")]
    InvalidGain { provided: f64 },
    #[error("max loss must be in (0, 1], got {provided}")]
    InvalidLoss { provided: f64 },
    #[error("seed mastery must be in [0, 1], got {provided}")]
    InvalidSeed { provided: f64 },
    #[error("review interval bounds must satisfy 1 <= min <= max, got {min}..={max}")]
    InvalidIntervalBounds { min: u32, max: u32 },
}

//
// ─── PARAMETERS ────────────────────────────────────────────────────────────────
//

pub const DEFAULT_MAX_GAIN: f64 = 0.25;
pub const DEFAULT_MAX_LOSS: f64 = 0.40;
pub const DEFAULT_SEED_SCORE: f64 = 0.1;
pub const MIN_INTERVAL_DAYS: u32 = 1;
pub const MAX_INTERVAL_DAYS: u32 = 90;

/// Tunable numeric policy of the mastery model.
///
/// * `max_gain` - Largest possible increase, reached on a perfect answer from score 0
/// * `max_loss` - Largest possible decrease, reached on a wrong answer from score 1
/// * `seed_score` - Mastery assumed for a topic before its first answer
/// * `min_interval_days` / `max_interval_days` - Review interval at score 0 and 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasteryParams {
    max_gain: f64,
    max_loss: f64,
    seed_score: f64,
    min_interval_days: u32,
    max_interval_days: u32,
}

impl MasteryParams {
    /// Validates a custom parameter set.
    ///
    /// # Errors
    ///
    /// Returns `MasteryError` if a cap is outside `(0, 1]`, the seed is outside
    /// `[0, 1]`, or the interval bounds are not `1 <= min <= max`.
    pub fn try_new(
        max_gain: f64,
        max_loss: f64,
        seed_score: f64,
        min_interval_days: u32,
        max_interval_days: u32,
    ) -> Result<Self, MasteryError> {
        if !max_gain.is_finite() || max_gain <= 0.0 || max_gain > 1.0 {
            return Err(MasteryError::InvalidGain { provided: max_gain });
        }
        if !max_loss.is_finite() || max_loss <= 0.0 || max_loss > 1.0 {
            return Err(MasteryError::InvalidLoss { provided: max_loss });
        }
        if !(0.0..=1.0).contains(&seed_score) {
            return Err(MasteryError::InvalidSeed {
                provided: seed_score,
            });
        }
        if min_interval_days == 0 || min_interval_days > max_interval_days {
            return Err(MasteryError::InvalidIntervalBounds {
                min: min_interval_days,
                max: max_interval_days,
            });
        }

        Ok(Self {
            max_gain,
            max_loss,
            seed_score,
            min_interval_days,
            max_interval_days,
        })
    }

    #[must_use]
    pub fn max_gain(&self) -> f64 {
        self.max_gain
    }

    #[must_use]
    pub fn max_loss(&self) -> f64 {
        self.max_loss
    }

    #[must_use]
    pub fn seed_score(&self) -> f64 {
        self.seed_score
    }

    #[must_use]
    pub fn min_interval_days(&self) -> u32 {
        self.min_interval_days
    }

    #[must_use]
    pub fn max_interval_days(&self) -> u32 {
        self.max_interval_days
    }
}

impl Default for MasteryParams {
    fn default() -> Self {
        Self {
            max_gain: DEFAULT_MAX_GAIN,
            max_loss: DEFAULT_MAX_LOSS,
            seed_score: DEFAULT_SEED_SCORE,
            min_interval_days: MIN_INTERVAL_DAYS,
            max_interval_days: MAX_INTERVAL_DAYS,
        }
    }
}

//
// ─── OUTCOME ───────────────────────────────────────────────────────────────────
//

/// New mastery state for one topic after an answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasteryOutcome {
    pub score: f64,
    pub interval_days: u32,
    pub next_review_date: NaiveDate,
}

//
// ─── MODEL ─────────────────────────────────────────────────────────────────────
//

/// Per-topic mastery estimator.
///
/// Gains scale with the remaining headroom and losses with the current score.
/// The next review is scheduled linearly between `min_interval_days` (score 0)
/// and `max_interval_days` (score 1).
///
/// # Examples
///
/// ```
/// # use drill_core::mastery::MasteryModel;
/// let model = MasteryModel::new();
/// let score = model.update_mastery(0.1, 1.0);
/// assert!((score - 0.325).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MasteryModel {
    params: MasteryParams,
}

impl MasteryModel {
    /// Model with the default policy (gain 0.25, loss 0.40, 1..=90 days).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_params(params: MasteryParams) -> Self {
        Self { params }
    }

    #[must_use]
    pub fn params(&self) -> &MasteryParams {
        &self.params
    }

    /// Mastery assumed for a topic that has never been answered.
    #[must_use]
    pub fn seed_score(&self) -> f64 {
        self.params.seed_score
    }

    /// Compute the new mastery score from the prior score and a performance rating.
    ///
    /// Inputs are expected in `[0, 1]`; callers validate at their boundary.
    /// The result is always clamped to `[0, 1]`.
    #[must_use]
    pub fn update_mastery(&self, current_score: f64, performance_rating: f64) -> f64 {
        let gain = (1.0 - current_score) * performance_rating * self.params.max_gain;
        let loss = current_score * (1.0 - performance_rating) * self.params.max_loss;
        (current_score + gain - loss).clamp(0.0, 1.0)
    }

    /// Review interval in whole days for a mastery score.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn interval_days(&self, mastery_score: f64) -> u32 {
        let score = if mastery_score.is_nan() {
            0.0
        } else {
            mastery_score.clamp(0.0, 1.0)
        };
        let span = f64::from(self.params.max_interval_days - self.params.min_interval_days);
        // floor of a value in [0, span] fits in u32
        self.params.min_interval_days + (score * span).floor() as u32
    }

    /// Date of the next review for a topic at `mastery_score`, counted from `today`.
    #[must_use]
    pub fn next_review_date(&self, mastery_score: f64, today: NaiveDate) -> NaiveDate {
        let days = self.interval_days(mastery_score);
        today
            .checked_add_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Apply a rating to a topic, seeding it when there is no prior score.
    #[must_use]
    pub fn apply(
        &self,
        prior_score: Option<f64>,
        performance_rating: f64,
        today: NaiveDate,
    ) -> MasteryOutcome {
        let current = prior_score.unwrap_or(self.params.seed_score);
        let score = self.update_mastery(current, performance_rating);
        MasteryOutcome {
            score,
            interval_days: self.interval_days(score),
            next_review_date: self.next_review_date(score, today),
        }
    }
}

/// [`MasteryModel::update_mastery`] with the default policy.
#[must_use]
pub fn update_mastery(current_score: f64, performance_rating: f64) -> f64 {
    MasteryModel::new().update_mastery(current_score, performance_rating)
}

/// [`MasteryModel::next_review_date`] with the default policy.
#[must_use]
pub fn next_review_date(mastery_score: f64, today: NaiveDate) -> NaiveDate {
    MasteryModel::new().next_review_date(mastery_score, today)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_today;
    use chrono::Duration;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn correct_fast_answer_from_seed() {
        assert!(approx(update_mastery(0.1, 1.0), 0.325));
    }

    #[test]
    fn wrong_answer_from_high_mastery() {
        assert!(approx(update_mastery(0.9, 0.0), 0.54));
    }

    #[test]
    fn output_stays_in_unit_interval() {
        assert!(update_mastery(1.0, 0.0) >= 0.0);
        assert!(update_mastery(0.0, 1.0) <= 1.0);
        assert!(approx(update_mastery(1.0, 1.0), 1.0));
        assert!(approx(update_mastery(0.0, 0.0), 0.0));

        for i in 0..=20 {
            for j in 0..=20 {
                let score = f64::from(i) / 20.0;
                let rating = f64::from(j) / 20.0;
                let out = update_mastery(score, rating);
                assert!((0.0..=1.0).contains(&out), "{score} {rating} -> {out}");
            }
        }
    }

    #[test]
    fn higher_rating_never_lowers_result() {
        for i in 0..=20 {
            let score = f64::from(i) / 20.0;
            let mut previous = update_mastery(score, 0.0);
            for j in 1..=20 {
                let next = update_mastery(score, f64::from(j) / 20.0);
                assert!(next >= previous, "score {score}: {next} < {previous}");
                previous = next;
            }
        }
    }

    #[test]
    fn review_interval_bounds() {
        let today = fixed_today();
        assert_eq!(next_review_date(0.0, today), today + Duration::days(1));
        assert_eq!(next_review_date(1.0, today), today + Duration::days(90));
        // 1 + floor(0.5 * 89) = 45
        assert_eq!(next_review_date(0.5, today), today + Duration::days(45));
    }

    #[test]
    fn interval_ignores_out_of_range_scores() {
        let model = MasteryModel::new();
        assert_eq!(model.interval_days(-3.0), 1);
        assert_eq!(model.interval_days(7.0), 90);
        assert_eq!(model.interval_days(f64::NAN), 1);
    }

    #[test]
    fn apply_seeds_unseen_topics() {
        let model = MasteryModel::new();
        let outcome = model.apply(None, 1.0, fixed_today());
        assert!(approx(outcome.score, 0.325));
        // 1 + floor(0.325 * 89) = 29
        assert_eq!(outcome.interval_days, 29);
        assert_eq!(outcome.next_review_date, fixed_today() + Duration::days(29));
    }

    #[test]
    fn custom_params_are_validated() {
        assert!(matches!(
            MasteryParams::try_new(0.0, 0.4, 0.1, 1, 90),
            Err(MasteryError::InvalidGain { .. })
        ));
        assert!(matches!(
            MasteryParams::try_new(0.25, 1.5, 0.1, 1, 90),
            Err(MasteryError::InvalidLoss { .. })
        ));
        assert!(matches!(
            MasteryParams::try_new(0.25, 0.4, -0.1, 1, 90),
            Err(MasteryError::InvalidSeed { .. })
        ));
        assert!(matches!(
            MasteryParams::try_new(0.25, 0.4, 0.1, 10, 5),
            Err(MasteryError::InvalidIntervalBounds { min: 10, max: 5 })
        ));

        let params = MasteryParams::try_new(0.5, 0.5, 0.2, 2, 30).unwrap();
        let model = MasteryModel::with_params(params);
        assert_eq!(model.interval_days(0.0), 2);
        assert_eq!(model.interval_days(1.0), 30);
        assert!(approx(model.seed_score(), 0.2));
    }
}
