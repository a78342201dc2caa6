use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{IdError, QuestionId, Topic};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error(transparent)]
    InvalidId(#[from] IdError),

    #[error("question must have at least one answer option")]
    NoOptions,

    #[error("question must be tagged with at least one topic")]
    NoTopics,

    #[error("correct answer index {index} is out of range for {options} options")]
    CorrectIndexOutOfRange { index: usize, options: usize },

    #[error("selected option {index} is out of range for {options} options")]
    OptionOutOfRange { index: i64, options: usize },

    #[error("option selection counts ({counts}) do not match option count ({options})")]
    OptionCountMismatch { counts: usize, options: usize },

    #[error("correct attempts ({correct}) exceed total attempts ({total})")]
    CorrectExceedsTotal { correct: u64, total: u64 },

    #[error("time spent must be finite and non-negative, got {provided}")]
    InvalidTimeSpent { provided: f64 },
}

//
// ─── CONTENT ───────────────────────────────────────────────────────────────────
//

/// Prompt, options and solution. Opaque to the scheduler apart from the option
/// count and the correct index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionContent {
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
    pub solution_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution_diagram_svg: Option<String>,
}

//
// ─── GLOBAL STATS ──────────────────────────────────────────────────────────────
//

/// Counters aggregated over every learner who answered the question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStats {
    global_total_attempts: u64,
    global_correct_attempts: u64,
    global_total_time_spent: f64,
    option_selection_counts: Vec<u64>,
}

impl QuestionStats {
    /// Zeroed counters for a question with `options` answer options.
    #[must_use]
    pub fn empty(options: usize) -> Self {
        Self {
            global_total_attempts: 0,
            global_correct_attempts: 0,
            global_total_time_spent: 0.0,
            option_selection_counts: vec![0; options],
        }
    }

    /// Rehydrate counters from storage.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if correct attempts exceed total attempts or the
    /// accumulated time is negative or non-finite.
    pub fn from_persisted(
        global_total_attempts: u64,
        global_correct_attempts: u64,
        global_total_time_spent: f64,
        option_selection_counts: Vec<u64>,
    ) -> Result<Self, QuestionError> {
        if global_correct_attempts > global_total_attempts {
            return Err(QuestionError::CorrectExceedsTotal {
                correct: global_correct_attempts,
                total: global_total_attempts,
            });
        }
        if !global_total_time_spent.is_finite() || global_total_time_spent < 0.0 {
            return Err(QuestionError::InvalidTimeSpent {
                provided: global_total_time_spent,
            });
        }
        Ok(Self {
            global_total_attempts,
            global_correct_attempts,
            global_total_time_spent,
            option_selection_counts,
        })
    }

    #[must_use]
    pub fn total_attempts(&self) -> u64 {
        self.global_total_attempts
    }

    #[must_use]
    pub fn correct_attempts(&self) -> u64 {
        self.global_correct_attempts
    }

    #[must_use]
    pub fn total_time_spent(&self) -> f64 {
        self.global_total_time_spent
    }

    #[must_use]
    pub fn option_selection_counts(&self) -> &[u64] {
        &self.option_selection_counts
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Catalog entry: content, topic tags and global counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    question_id: QuestionId,
    subcategories: Vec<Topic>,
    #[serde(flatten)]
    content: QuestionContent,
    #[serde(flatten)]
    stats: QuestionStats,
}

impl Question {
    /// Build a fresh catalog entry with zeroed counters.
    ///
    /// Duplicate topics are dropped, keeping first-seen order.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if there are no options, no topics, or the correct
    /// index is out of range.
    pub fn new(
        question_id: QuestionId,
        topics: Vec<Topic>,
        content: QuestionContent,
    ) -> Result<Self, QuestionError> {
        let stats = QuestionStats::empty(content.options.len());
        Self::from_persisted(question_id, topics, content, stats)
    }

    /// Rehydrate a question (with its counters) from storage.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` on invalid content or counters that do not line up
    /// with the option list.
    pub fn from_persisted(
        question_id: QuestionId,
        topics: Vec<Topic>,
        content: QuestionContent,
        stats: QuestionStats,
    ) -> Result<Self, QuestionError> {
        let options = content.options.len();
        if options == 0 {
            return Err(QuestionError::NoOptions);
        }
        if content.correct_answer_index >= options {
            return Err(QuestionError::CorrectIndexOutOfRange {
                index: content.correct_answer_index,
                options,
            });
        }
        if stats.option_selection_counts.len() != options {
            return Err(QuestionError::OptionCountMismatch {
                counts: stats.option_selection_counts.len(),
                options,
            });
        }

        let mut subcategories: Vec<Topic> = Vec::with_capacity(topics.len());
        for topic in topics {
            if !subcategories.contains(&topic) {
                subcategories.push(topic);
            }
        }
        if subcategories.is_empty() {
            return Err(QuestionError::NoTopics);
        }

        Ok(Self {
            question_id,
            subcategories,
            content,
            stats,
        })
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.question_id
    }

    #[must_use]
    pub fn topics(&self) -> &[Topic] {
        &self.subcategories
    }

    #[must_use]
    pub fn has_topic(&self, topic: &Topic) -> bool {
        self.subcategories.contains(topic)
    }

    #[must_use]
    pub fn content(&self) -> &QuestionContent {
        &self.content
    }

    #[must_use]
    pub fn stats(&self) -> &QuestionStats {
        &self.stats
    }

    #[must_use]
    pub fn option_count(&self) -> usize {
        self.content.options.len()
    }

    /// Convert a caller-supplied option index into a checked position.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::OptionOutOfRange` for negative or too-large indices.
    pub fn option_index(&self, selected: i64) -> Result<usize, QuestionError> {
        usize::try_from(selected)
            .ok()
            .filter(|idx| *idx < self.option_count())
            .ok_or(QuestionError::OptionOutOfRange {
                index: selected,
                options: self.option_count(),
            })
    }

    #[must_use]
    pub fn is_correct(&self, selected: usize) -> bool {
        selected == self.content.correct_answer_index
    }

    /// Replace content and topics while keeping the accumulated counters.
    ///
    /// Counters are reset when the option count changes since the per-option
    /// tallies would no longer line up.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the replacement is invalid.
    pub fn with_content_of(&self, replacement: Question) -> Result<Self, QuestionError> {
        if replacement.option_count() == self.option_count() {
            Self::from_persisted(
                replacement.question_id,
                replacement.subcategories,
                replacement.content,
                self.stats.clone(),
            )
        } else {
            Ok(replacement)
        }
    }

    /// Count one attempt against the global counters.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::OptionOutOfRange` if `selected` is not a valid option.
    pub fn record_attempt(
        &mut self,
        selected: usize,
        correct: bool,
        time_spent: f64,
    ) -> Result<(), QuestionError> {
        let options = self.option_count();
        let slot = self
            .stats
            .option_selection_counts
            .get_mut(selected)
            .ok_or(QuestionError::OptionOutOfRange {
                index: i64::try_from(selected).unwrap_or(i64::MAX),
                options,
            })?;
        *slot = slot.saturating_add(1);
        self.stats.global_total_attempts = self.stats.global_total_attempts.saturating_add(1);
        if correct {
            self.stats.global_correct_attempts =
                self.stats.global_correct_attempts.saturating_add(1);
        }
        self.stats.global_total_time_spent += time_spent;
        Ok(())
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated catalog entry in the seed-file layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub question_id: String,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
    #[serde(default)]
    pub solution_text: String,
    #[serde(default)]
    pub solution_diagram_svg: Option<String>,
    #[serde(default)]
    pub subcategories: Vec<String>,
}

impl QuestionDraft {
    /// Validate the draft into a catalog entry with zeroed counters.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` for blank ids/topics or inconsistent options.
    pub fn validate(self) -> Result<Question, QuestionError> {
        let question_id = QuestionId::new(self.question_id)?;
        let topics = self
            .subcategories
            .into_iter()
            .map(Topic::new)
            .collect::<Result<Vec<_>, _>>()?;

        Question::new(
            question_id,
            topics,
            QuestionContent {
                question_text: self.question_text,
                options: self.options,
                correct_answer_index: self.correct_answer_index,
                solution_text: self.solution_text,
                solution_diagram_svg: self.solution_diagram_svg,
            },
        )
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
