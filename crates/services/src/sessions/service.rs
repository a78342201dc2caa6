use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use tracing::info;

use drill_core::model::{Catalog, Question, QuestionId, Topic, TopicProgress, UserId};
use storage::repository::{
    DailyActivityRepository, QuestionRepository, TopicProgressRepository,
    UserSettingsRepository, UserStatsRepository,
};

use super::plan::{QuestionSelector, SelectorConfig, SessionPlan};
use crate::Clock;
use crate::error::ServiceError;

/// Serves question batches: the prioritized daily session, targeted practice
/// on one topic, and practice-more overflow.
#[derive(Clone)]
pub struct SessionService {
    clock: Clock,
    config: SelectorConfig,
    questions: Arc<dyn QuestionRepository>,
    progress: Arc<dyn TopicProgressRepository>,
    stats: Arc<dyn UserStatsRepository>,
    activity: Arc<dyn DailyActivityRepository>,
    settings: Arc<dyn UserSettingsRepository>,
}

impl SessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionRepository>,
        progress: Arc<dyn TopicProgressRepository>,
        stats: Arc<dyn UserStatsRepository>,
        activity: Arc<dyn DailyActivityRepository>,
        settings: Arc<dyn UserSettingsRepository>,
    ) -> Self {
        Self {
            clock,
            config: SelectorConfig::default(),
            questions,
            progress,
            stats,
            activity,
            settings,
        }
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: SelectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Mark the start of a new session by snapshotting the rolling accuracy
    /// used for the trend comparison.
    ///
    /// Returns `false` for a learner with no answers yet.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if the snapshot cannot be written.
    pub async fn begin_session(&self, user: &UserId) -> Result<bool, ServiceError> {
        let snapshotted = self.stats.snapshot_previous_accuracy(user).await?;
        info!(user = %user, snapshotted, "session started");
        Ok(snapshotted)
    }

    /// Begin a session and fetch its questions in one step.
    ///
    /// The size is validated before the trend baseline is snapshotted, so a
    /// rejected request leaves aggregate stats untouched.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` on an invalid size or storage failure.
    pub async fn start_session(
        &self,
        user: &UserId,
        limit: Option<u32>,
    ) -> Result<SessionPlan, ServiceError> {
        let size = self.session_size(user, limit).await?;
        self.begin_session(user).await?;
        let inputs = self.load_inputs(user, size).await?;
        let mut rng = rand::rng();
        Ok(self.select(user, &inputs, &mut rng))
    }

    /// Fetch today's prioritized questions without touching aggregate stats.
    ///
    /// `limit` overrides the learner's daily question limit.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidSessionSize` for a zero limit, or storage
    /// errors while loading the inputs.
    pub async fn fetch_session(
        &self,
        user: &UserId,
        limit: Option<u32>,
    ) -> Result<SessionPlan, ServiceError> {
        let size = self.session_size(user, limit).await?;
        let inputs = self.load_inputs(user, size).await?;
        let mut rng = rand::rng();
        Ok(self.select(user, &inputs, &mut rng))
    }

    /// [`fetch_session`](Self::fetch_session) with a caller-supplied random source.
    ///
    /// # Errors
    ///
    /// Same as `fetch_session`.
    pub async fn fetch_session_with_rng<R: Rng + ?Sized>(
        &self,
        user: &UserId,
        limit: Option<u32>,
        rng: &mut R,
    ) -> Result<SessionPlan, ServiceError> {
        let size = self.session_size(user, limit).await?;
        let inputs = self.load_inputs(user, size).await?;
        Ok(self.select(user, &inputs, rng))
    }

    /// Up to five shuffled questions from `topic`. Does not touch progress,
    /// stats or seen-today tracking.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if the catalog cannot be loaded.
    pub async fn targeted_practice(&self, topic: &Topic) -> Result<Vec<Question>, ServiceError> {
        let catalog = self.questions.catalog().await?;
        let mut rng = rand::rng();
        let picked = QuestionSelector::new(&catalog, self.clock.today()).targeted(
            topic,
            self.config.targeted_count,
            &mut rng,
        );
        info!(topic = %topic, served = picked.len(), "targeted practice");
        Ok(picked)
    }

    /// A random batch from the whole catalog for learners who finished the day's session.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if the catalog cannot be loaded.
    pub async fn practice_more(&self) -> Result<Vec<Question>, ServiceError> {
        let catalog = self.questions.catalog().await?;
        let mut rng = rand::rng();
        let picked = QuestionSelector::new(&catalog, self.clock.today())
            .practice_more(self.config.practice_more_count, &mut rng);
        info!(served = picked.len(), "practice more");
        Ok(picked)
    }

    async fn session_size(
        &self,
        user: &UserId,
        limit: Option<u32>,
    ) -> Result<usize, ServiceError> {
        let size = match limit {
            Some(0) => return Err(ServiceError::InvalidSessionSize),
            Some(n) => n,
            None => self
                .settings
                .get_settings(user)
                .await?
                .unwrap_or_default()
                .daily_question_limit(),
        };
        Ok(usize::try_from(size).unwrap_or(usize::MAX))
    }

    async fn load_inputs(
        &self,
        user: &UserId,
        size: usize,
    ) -> Result<SessionInputs, ServiceError> {
        let today = self.clock.today();

        Ok(SessionInputs {
            size,
            catalog: self.questions.catalog().await?,
            progress: self.progress.list_progress_by_user(user).await?,
            seen_today: self.activity.seen_on(user, today).await?,
        })
    }

    fn select<R: Rng + ?Sized>(
        &self,
        user: &UserId,
        inputs: &SessionInputs,
        rng: &mut R,
    ) -> SessionPlan {
        let plan = QuestionSelector::new(&inputs.catalog, self.clock.today()).select_session(
            inputs.size,
            &inputs.progress,
            &inputs.seen_today,
            rng,
        );
        info!(
            user = %user,
            requested = inputs.size,
            served = plan.total(),
            prioritized = plan.prioritized_selected,
            filled = plan.fill_selected,
            seen_today = inputs.seen_today.len(),
            "session fetched"
        );
        plan
    }
}

struct SessionInputs {
    size: usize,
    catalog: Arc<Catalog>,
    progress: Vec<TopicProgress>,
    seen_today: HashSet<QuestionId>,
}
