use async_trait::async_trait;
use chrono::NaiveDate;
use drill_core::model::{
    Catalog, ProgressUpdate, Question, QuestionId, Topic, TopicProgress, UserAggregateStats,
    UserId, UserSettings,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Question catalog with embedded global answer counters.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert a question or replace its content, keeping accumulated counters.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Fetch a question by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_question(&self, id: &QuestionId) -> Result<Question, StorageError>;

    /// The whole catalog with its topic index.
    ///
    /// Implementations cache the index between calls; the snapshot is shared
    /// and never mutated after it is handed out.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be loaded.
    async fn catalog(&self) -> Result<Arc<Catalog>, StorageError>;

    /// Count one answer against a question's global counters.
    ///
    /// Attempt, correct and time counters are incremented atomically and the
    /// per-option tally is updated in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown question.
    async fn record_attempt(
        &self,
        id: &QuestionId,
        selected_option: usize,
        correct: bool,
        time_spent: f64,
    ) -> Result<(), StorageError>;
}

/// Per-user, per-topic mastery records.
#[async_trait]
pub trait TopicProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn get_progress(
        &self,
        user: &UserId,
        topic: &Topic,
    ) -> Result<Option<TopicProgress>, StorageError>;

    /// Apply an update, creating the record if it does not exist.
    ///
    /// Counters are incremented by the store; mastery and dates are
    /// overwritten (last writer wins).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the update cannot be applied.
    async fn upsert_progress(
        &self,
        user: &UserId,
        topic: &Topic,
        update: &ProgressUpdate,
    ) -> Result<TopicProgress, StorageError>;

    /// All records for a user, ordered by topic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn list_progress_by_user(&self, user: &UserId)
    -> Result<Vec<TopicProgress>, StorageError>;

    /// Remove every record for a user and report how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on write failure.
    async fn delete_all_progress_by_user(&self, user: &UserId) -> Result<u64, StorageError>;
}

/// Rolling accuracy and streak per user.
#[async_trait]
pub trait UserStatsRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn get_stats(&self, user: &UserId) -> Result<Option<UserAggregateStats>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on write failure.
    async fn save_stats(&self, stats: &UserAggregateStats) -> Result<(), StorageError>;

    /// Copy the current rolling accuracy into the previous-session slot.
    ///
    /// Returns `false` when the user has no stats yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on write failure.
    async fn snapshot_previous_accuracy(&self, user: &UserId) -> Result<bool, StorageError>;
}

/// Questions a user has already been served through the prioritized session.
#[async_trait]
pub trait DailyActivityRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn seen_on(
        &self,
        user: &UserId,
        day: NaiveDate,
    ) -> Result<HashSet<QuestionId>, StorageError>;

    /// Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on write failure.
    async fn mark_seen(
        &self,
        user: &UserId,
        day: NaiveDate,
        question: &QuestionId,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait UserSettingsRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn get_settings(&self, user: &UserId) -> Result<Option<UserSettings>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on write failure.
    async fn save_settings(
        &self,
        user: &UserId,
        settings: &UserSettings,
    ) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY BACKEND ─────────────────────────────────────────────────────────
//

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    catalog: Arc<Mutex<Arc<Catalog>>>,
    progress: Arc<Mutex<HashMap<(UserId, Topic), TopicProgress>>>,
    stats: Arc<Mutex<HashMap<UserId, UserAggregateStats>>>,
    seen: Arc<Mutex<HashMap<(UserId, NaiveDate), HashSet<QuestionId>>>>,
    settings: Arc<Mutex<HashMap<UserId, UserSettings>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = lock(&self.catalog)?;
        let catalog = Arc::make_mut(&mut guard);
        let merged = match catalog.get(question.id()) {
            Some(existing) => existing.with_content_of(question.clone()).map_err(ser)?,
            None => question.clone(),
        };
        catalog.upsert(merged);
        Ok(())
    }

    async fn get_question(&self, id: &QuestionId) -> Result<Question, StorageError> {
        let guard = lock(&self.catalog)?;
        guard.get(id).cloned().ok_or(StorageError::NotFound)
    }

    async fn catalog(&self) -> Result<Arc<Catalog>, StorageError> {
        Ok(Arc::clone(&*lock(&self.catalog)?))
    }

    async fn record_attempt(
        &self,
        id: &QuestionId,
        selected_option: usize,
        correct: bool,
        time_spent: f64,
    ) -> Result<(), StorageError> {
        let mut guard = lock(&self.catalog)?;
        if guard.get(id).is_none() {
            return Err(StorageError::NotFound);
        }
        let question = Arc::make_mut(&mut guard)
            .get_mut(id)
            .ok_or(StorageError::NotFound)?;
        question
            .record_attempt(selected_option, correct, time_spent)
            .map_err(ser)
    }
}

#[async_trait]
impl TopicProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        user: &UserId,
        topic: &Topic,
    ) -> Result<Option<TopicProgress>, StorageError> {
        let guard = lock(&self.progress)?;
        Ok(guard.get(&(user.clone(), topic.clone())).cloned())
    }

    async fn upsert_progress(
        &self,
        user: &UserId,
        topic: &Topic,
        update: &ProgressUpdate,
    ) -> Result<TopicProgress, StorageError> {
        let mut guard = lock(&self.progress)?;
        let key = (user.clone(), topic.clone());
        let next = update.apply(guard.get(&key), user, topic).map_err(ser)?;
        guard.insert(key, next.clone());
        Ok(next)
    }

    async fn list_progress_by_user(
        &self,
        user: &UserId,
    ) -> Result<Vec<TopicProgress>, StorageError> {
        let guard = lock(&self.progress)?;
        let mut records: Vec<TopicProgress> = guard
            .iter()
            .filter(|((owner, _), _)| owner == user)
            .map(|(_, p)| p.clone())
            .collect();
        records.sort_by(|a, b| a.topic().as_str().cmp(b.topic().as_str()));
        Ok(records)
    }

    async fn delete_all_progress_by_user(&self, user: &UserId) -> Result<u64, StorageError> {
        let mut guard = lock(&self.progress)?;
        let before = guard.len();
        guard.retain(|(owner, _), _| owner != user);
        Ok(u64::try_from(before - guard.len()).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl UserStatsRepository for InMemoryRepository {
    async fn get_stats(&self, user: &UserId) -> Result<Option<UserAggregateStats>, StorageError> {
        Ok(lock(&self.stats)?.get(user).cloned())
    }

    async fn save_stats(&self, stats: &UserAggregateStats) -> Result<(), StorageError> {
        lock(&self.stats)?.insert(stats.user_id().clone(), stats.clone());
        Ok(())
    }

    async fn snapshot_previous_accuracy(&self, user: &UserId) -> Result<bool, StorageError> {
        let mut guard = lock(&self.stats)?;
        match guard.get_mut(user) {
            Some(stats) => {
                stats.snapshot_previous_accuracy();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl DailyActivityRepository for InMemoryRepository {
    async fn seen_on(
        &self,
        user: &UserId,
        day: NaiveDate,
    ) -> Result<HashSet<QuestionId>, StorageError> {
        let guard = lock(&self.seen)?;
        Ok(guard
            .get(&(user.clone(), day))
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_seen(
        &self,
        user: &UserId,
        day: NaiveDate,
        question: &QuestionId,
    ) -> Result<(), StorageError> {
        lock(&self.seen)?
            .entry((user.clone(), day))
            .or_default()
            .insert(question.clone());
        Ok(())
    }
}

#[async_trait]
impl UserSettingsRepository for InMemoryRepository {
    async fn get_settings(&self, user: &UserId) -> Result<Option<UserSettings>, StorageError> {
        Ok(lock(&self.settings)?.get(user).cloned())
    }

    async fn save_settings(
        &self,
        user: &UserId,
        settings: &UserSettings,
    ) -> Result<(), StorageError> {
        lock(&self.settings)?.insert(user.clone(), settings.clone());
        Ok(())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub progress: Arc<dyn TopicProgressRepository>,
    pub stats: Arc<dyn UserStatsRepository>,
    pub activity: Arc<dyn DailyActivityRepository>,
    pub settings: Arc<dyn UserSettingsRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Wire every repository role to the same backend.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: QuestionRepository
            + TopicProgressRepository
            + UserStatsRepository
            + DailyActivityRepository
            + UserSettingsRepository
            + Clone
            + 'static,
    {
        Self {
            questions: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            stats: Arc::new(repo.clone()),
            activity: Arc::new(repo.clone()),
            settings: Arc::new(repo),
        }
    }
}
