use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;
use crate::model::question::{Question, QuestionError};

/// Upper bound applied to reported time before any aggregation.
pub const MAX_TIME_SPENT_SECS: f64 = 600.0;

/// Correct answers at or under this many seconds earn the full rating.
pub const SPEED_BENCHMARK_SECS: f64 = 60.0;

/// Lowest rating a correct answer can earn, however slow.
pub const MIN_CORRECT_RATING: f64 = 0.5;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("time spent must be finite and non-negative, got {provided}")]
    InvalidTimeSpent { provided: f64 },

    #[error("unknown practice context: {0}")]
    UnknownContext(String),

    #[error(transparent)]
    Question(#[from] QuestionError),
}

//
// ─── CONTEXT ───────────────────────────────────────────────────────────────────
//

/// Where an answer was given; decides which side effects it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticeContext {
    PracticeSession,
    TargetedPractice,
    MockTest,
}

/// Side effects an answer is allowed to have.
///
/// Rolling aggregates are updated for every context and are not part of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextPolicy {
    pub updates_mastery: bool,
    pub updates_global_stats: bool,
    pub marks_seen_today: bool,
}

impl PracticeContext {
    pub const ALL: [PracticeContext; 3] = [
        PracticeContext::PracticeSession,
        PracticeContext::TargetedPractice,
        PracticeContext::MockTest,
    ];

    #[must_use]
    pub const fn policy(self) -> ContextPolicy {
        match self {
            PracticeContext::PracticeSession => ContextPolicy {
                updates_mastery: true,
                updates_global_stats: true,
                marks_seen_today: true,
            },
            PracticeContext::TargetedPractice => ContextPolicy {
                updates_mastery: false,
                updates_global_stats: false,
                marks_seen_today: false,
            },
            PracticeContext::MockTest => ContextPolicy {
                updates_mastery: false,
                updates_global_stats: true,
                marks_seen_today: false,
            },
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PracticeContext::PracticeSession => "practice_session",
            PracticeContext::TargetedPractice => "targeted_practice",
            PracticeContext::MockTest => "mock_test",
        }
    }
}

impl fmt::Display for PracticeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PracticeContext {
    type Err = SubmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ctx| ctx.as_str() == s)
            .ok_or_else(|| SubmissionError::UnknownContext(s.to_owned()))
    }
}

//
// ─── RATING ────────────────────────────────────────────────────────────────────
//

/// Validate reported time and cap it at [`MAX_TIME_SPENT_SECS`].
///
/// # Errors
///
/// Returns `SubmissionError::InvalidTimeSpent` for negative or non-finite input.
pub fn clamp_time_spent(time_spent: f64) -> Result<f64, SubmissionError> {
    if !time_spent.is_finite() || time_spent < 0.0 {
        return Err(SubmissionError::InvalidTimeSpent {
            provided: time_spent,
        });
    }
    Ok(time_spent.min(MAX_TIME_SPENT_SECS))
}

/// Speed-weighted correctness in `[0, 1]`.
///
/// Wrong answers rate 0. Correct answers rate 1 up to the 60 s benchmark, then
/// decay linearly over the next 120 s, never dropping below 0.5.
#[must_use]
pub fn performance_rating(is_correct: bool, time_spent: f64) -> f64 {
    if !is_correct {
        return 0.0;
    }
    if time_spent <= SPEED_BENCHMARK_SECS {
        1.0
    } else {
        let decay = (time_spent - SPEED_BENCHMARK_SECS) / (SPEED_BENCHMARK_SECS * 2.0);
        (1.0 - decay).max(MIN_CORRECT_RATING)
    }
}

//
// ─── SUBMISSION ────────────────────────────────────────────────────────────────
//

/// A learner's answer as received from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmission {
    pub question_id: QuestionId,
    pub selected_answer_index: i64,
    pub time_spent: f64,
    pub performance_context: PracticeContext,
}

/// Submission checked against its question.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradedAnswer {
    pub selected_option: usize,
    pub is_correct: bool,
    pub time_spent: f64,
    pub performance_rating: f64,
}

impl AnswerSubmission {
    /// Validate the submission against `question` and compute its rating.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError` when time is invalid or the option index is out
    /// of range for the question.
    pub fn grade(&self, question: &Question) -> Result<GradedAnswer, SubmissionError> {
        let time_spent = clamp_time_spent(self.time_spent)?;
        let selected_option = question.option_index(self.selected_answer_index)?;
        let is_correct = question.is_correct(selected_option);

        Ok(GradedAnswer {
            selected_option,
            is_correct,
            time_spent,
            performance_rating: performance_rating(is_correct, time_spent),
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::Topic;
    use crate::model::question::QuestionContent;

    fn question() -> Question {
        Question::new(
            QuestionId::new("q1").unwrap(),
            vec![Topic::new("Ratios").unwrap()],
            QuestionContent {
                question_text: "1:2 = x:4".into(),
                options: vec!["1".into(), "2".into(), "3".into(), "4".into()],
                correct_answer_index: 1,
                solution_text: String::new(),
                solution_diagram_svg: None,
            },
        )
        .unwrap()
    }

    fn submission(selected: i64, time: f64) -> AnswerSubmission {
        AnswerSubmission {
            question_id: QuestionId::new("q1").unwrap(),
            selected_answer_index: selected,
            time_spent: time,
            performance_context: PracticeContext::PracticeSession,
        }
    }

    #[test]
    fn rating_curve() {
        assert_eq!(performance_rating(false, 5.0), 0.0);
        assert_eq!(performance_rating(true, 30.0), 1.0);
        assert_eq!(performance_rating(true, 60.0), 1.0);
        assert!((performance_rating(true, 120.0) - 0.5).abs() < 1e-9);
        assert!((performance_rating(true, 90.0) - 0.75).abs() < 1e-9);
        assert_eq!(performance_rating(true, 400.0), 0.5);
    }

    #[test]
    fn time_is_capped_and_validated() {
        assert_eq!(clamp_time_spent(1200.0).unwrap(), MAX_TIME_SPENT_SECS);
        assert_eq!(clamp_time_spent(12.5).unwrap(), 12.5);
        assert!(clamp_time_spent(-1.0).is_err());
        assert!(clamp_time_spent(f64::NAN).is_err());
        assert!(clamp_time_spent(f64::INFINITY).is_err());
    }

    #[test]
    fn grade_checks_option_and_correctness() {
        let q = question();
        let graded = submission(1, 30.0).grade(&q).unwrap();
        assert!(graded.is_correct);
        assert_eq!(graded.performance_rating, 1.0);

        let graded = submission(0, 900.0).grade(&q).unwrap();
        assert!(!graded.is_correct);
        assert_eq!(graded.time_spent, MAX_TIME_SPENT_SECS);
        assert_eq!(graded.performance_rating, 0.0);

        assert!(matches!(
            submission(4, 10.0).grade(&q),
            Err(SubmissionError::Question(QuestionError::OptionOutOfRange { .. }))
        ));
        assert!(submission(-1, 10.0).grade(&q).is_err());
    }

    #[test]
    fn policy_table() {
        let p = PracticeContext::PracticeSession.policy();
        assert!(p.updates_mastery && p.updates_global_stats && p.marks_seen_today);

        let t = PracticeContext::TargetedPractice.policy();
        assert!(!t.updates_mastery && !t.updates_global_stats && !t.marks_seen_today);

        let m = PracticeContext::MockTest.policy();
        assert!(!m.updates_mastery && m.updates_global_stats && !m.marks_seen_today);
    }

    #[test]
    fn context_parses_wire_names() {
        for ctx in PracticeContext::ALL {
            assert_eq!(ctx.as_str().parse::<PracticeContext>().unwrap(), ctx);
        }
        assert!(matches!(
            "diagnostic".parse::<PracticeContext>(),
            Err(SubmissionError::UnknownContext(_))
        ));
        let json = serde_json::to_string(&PracticeContext::MockTest).unwrap();
        assert_eq!(json, "\"mock_test\"");
    }
}
