use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use drill_core::{
    mastery::MasteryModel,
    model::{
        AnswerSubmission, GradedAnswer, PracticeContext, ProgressUpdate, Question, QuestionId,
        TopicProgress, UserAggregateStats, UserId,
    },
    time::Clock,
};
use storage::repository::{
    DailyActivityRepository, QuestionRepository, StorageError, TopicProgressRepository,
    UserStatsRepository,
};

use crate::error::ServiceError;

//
// ─── RESULT ────────────────────────────────────────────────────────────────────
//

/// What a submission changed.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub question_id: QuestionId,
    pub context: PracticeContext,
    pub graded: GradedAnswer,
    pub stats: UserAggregateStats,
    /// Topic records written for this answer; empty when the context does not
    /// update mastery.
    pub topics: Vec<TopicProgress>,
    pub recorded_globally: bool,
    pub marked_seen: bool,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Applies an answered question to the learner's progress, aggregates and the
/// question's global counters.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    model: MasteryModel,
    questions: Arc<dyn QuestionRepository>,
    progress: Arc<dyn TopicProgressRepository>,
    stats: Arc<dyn UserStatsRepository>,
    activity: Arc<dyn DailyActivityRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionRepository>,
        progress: Arc<dyn TopicProgressRepository>,
        stats: Arc<dyn UserStatsRepository>,
        activity: Arc<dyn DailyActivityRepository>,
    ) -> Self {
        Self {
            clock,
            model: MasteryModel::new(),
            questions,
            progress,
            stats,
            activity,
        }
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: MasteryModel) -> Self {
        self.model = model;
        self
    }

    /// Grade an answer and apply its side effects.
    ///
    /// Rolling aggregates are always updated. Topic mastery, global question
    /// counters and seen-today tracking follow the context's policy.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::QuestionNotFound` for an unknown question,
    /// `ServiceError::Submission` for an out-of-range option or invalid time,
    /// and `ServiceError::Storage` if a write fails. Writes already made are
    /// not rolled back.
    pub async fn submit_answer(
        &self,
        user: &UserId,
        submission: &AnswerSubmission,
    ) -> Result<SubmissionReceipt, ServiceError> {
        let question = self.load_question(&submission.question_id).await?;
        let graded = submission.grade(&question).inspect_err(|err| {
            warn!(
                user = %user,
                question = %submission.question_id,
                error = %err,
                "submission rejected"
            );
        })?;

        let context = submission.performance_context;
        let policy = context.policy();
        let now = self.clock.now();
        let today = now.date_naive();

        let existing = self.stats.get_stats(user).await?;
        let stats = UserAggregateStats::recorded(existing, user, graded.is_correct, today);
        self.stats.save_stats(&stats).await?;

        let topics = if policy.updates_mastery {
            self.update_topics(user, &question, &graded, now).await?
        } else {
            Vec::new()
        };

        if policy.updates_global_stats {
            self.questions
                .record_attempt(
                    question.id(),
                    graded.selected_option,
                    graded.is_correct,
                    graded.time_spent,
                )
                .await?;
        }

        if policy.marks_seen_today {
            self.activity.mark_seen(user, today, question.id()).await?;
        }

        info!(
            user = %user,
            question = %question.id(),
            context = %context,
            correct = graded.is_correct,
            rating = graded.performance_rating,
            topics = topics.len(),
            "answer recorded"
        );

        Ok(SubmissionReceipt {
            question_id: question.id().clone(),
            context,
            graded,
            stats,
            topics,
            recorded_globally: policy.updates_global_stats,
            marked_seen: policy.marks_seen_today,
        })
    }

    /// Delete every topic progress record for `user`; returns how many were removed.
    ///
    /// Aggregate stats and global counters are kept.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if the delete fails.
    pub async fn reset_progress(&self, user: &UserId) -> Result<u64, ServiceError> {
        let removed = self.progress.delete_all_progress_by_user(user).await?;
        info!(user = %user, removed, "progress reset");
        Ok(removed)
    }

    async fn load_question(&self, id: &QuestionId) -> Result<Question, ServiceError> {
        match self.questions.get_question(id).await {
            Ok(question) => Ok(question),
            Err(StorageError::NotFound) => {
                warn!(question = %id, "submission for unknown question");
                Err(ServiceError::QuestionNotFound(id.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn update_topics(
        &self,
        user: &UserId,
        question: &Question,
        graded: &GradedAnswer,
        now: DateTime<Utc>,
    ) -> Result<Vec<TopicProgress>, ServiceError> {
        let today = now.date_naive();
        let mut written = Vec::with_capacity(question.topics().len());

        for topic in question.topics() {
            let prior = self
                .progress
                .get_progress(user, topic)
                .await?
                .map(|p| p.mastery_score());
            let outcome = self.model.apply(prior, graded.performance_rating, today);

            let update = ProgressUpdate {
                mastery_score: outcome.score,
                next_review_date: outcome.next_review_date,
                reviewed_at: now,
                correct: graded.is_correct,
                time_spent: graded.time_spent,
            };
            let record = self.progress.upsert_progress(user, topic, &update).await?;
            tracing::debug!(
                user = %user,
                topic = %topic,
                prior = ?prior,
                mastery = outcome.score,
                interval_days = outcome.interval_days,
                "topic updated"
            );
            written.push(record);
        }

        Ok(written)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
