use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::catalog_service::CatalogService;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;
use crate::sessions::SessionService;
use crate::settings_service::SettingsService;
use crate::stats_service::StatsService;

/// Assembles the app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    sessions: Arc<SessionService>,
    progress: Arc<ProgressService>,
    stats: Arc<StatsService>,
    settings: Arc<SettingsService>,
    catalog: Arc<CatalogService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, migrating the schema first.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock))
    }

    /// Build services over volatile in-memory storage.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        let sessions = Arc::new(SessionService::new(
            clock,
            Arc::clone(&storage.questions),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.stats),
            Arc::clone(&storage.activity),
            Arc::clone(&storage.settings),
        ));
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.questions),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.stats),
            Arc::clone(&storage.activity),
        ));
        let stats = Arc::new(StatsService::new(
            clock,
            Arc::clone(&storage.progress),
            Arc::clone(&storage.stats),
        ));
        let settings = Arc::new(SettingsService::new(Arc::clone(&storage.settings)));
        let catalog = Arc::new(CatalogService::new(Arc::clone(&storage.questions)));

        Self {
            sessions,
            progress,
            stats,
            settings,
            catalog,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<SessionService> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn stats(&self) -> Arc<StatsService> {
        Arc::clone(&self.stats)
    }

    #[must_use]
    pub fn settings(&self) -> Arc<SettingsService> {
        Arc::clone(&self.settings)
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CatalogService> {
        Arc::clone(&self.catalog)
    }
}
