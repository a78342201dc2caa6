use std::sync::Arc;

use chrono::NaiveDate;

use drill_core::model::insights::{heatmap, practice_days, priority_matrix};
use drill_core::model::{
    DashboardStats, HeatmapCell, PerformanceSummary, PriorityMatrixPoint, UserId,
};
use drill_core::time::Clock;
use storage::repository::{TopicProgressRepository, UserStatsRepository};

use crate::error::ServiceError;

/// Read-only views over a learner's topic progress and rolling aggregates.
#[derive(Clone)]
pub struct StatsService {
    clock: Clock,
    progress: Arc<dyn TopicProgressRepository>,
    stats: Arc<dyn UserStatsRepository>,
}

impl StatsService {
    #[must_use]
    pub fn new(
        clock: Clock,
        progress: Arc<dyn TopicProgressRepository>,
        stats: Arc<dyn UserStatsRepository>,
    ) -> Self {
        Self {
            clock,
            progress,
            stats,
        }
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Due topics, mastered topics and overall accuracy.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if progress cannot be loaded.
    pub async fn dashboard(&self, user: &UserId) -> Result<DashboardStats, ServiceError> {
        let progress = self.progress.list_progress_by_user(user).await?;
        Ok(DashboardStats::from_progress(&progress, self.clock.today()))
    }

    /// Mastery per practiced topic.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if progress cannot be loaded.
    pub async fn heatmap(&self, user: &UserId) -> Result<Vec<HeatmapCell>, ServiceError> {
        let progress = self.progress.list_progress_by_user(user).await?;
        Ok(heatmap(&progress))
    }

    /// Accuracy against average time per practiced topic.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if progress cannot be loaded.
    pub async fn priority_matrix(
        &self,
        user: &UserId,
    ) -> Result<Vec<PriorityMatrixPoint>, ServiceError> {
        let progress = self.progress.list_progress_by_user(user).await?;
        Ok(priority_matrix(&progress))
    }

    /// Distinct days with recorded topic activity.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if progress cannot be loaded.
    pub async fn practice_days(&self, user: &UserId) -> Result<Vec<NaiveDate>, ServiceError> {
        let progress = self.progress.list_progress_by_user(user).await?;
        Ok(practice_days(&progress))
    }

    /// Rolling accuracy, trend and streak. A learner with no answers gets zeros.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if aggregates cannot be loaded.
    pub async fn performance(&self, user: &UserId) -> Result<PerformanceSummary, ServiceError> {
        let stats = self.stats.get_stats(user).await?;
        Ok(stats
            .as_ref()
            .map_or_else(PerformanceSummary::empty, PerformanceSummary::from))
    }
}
