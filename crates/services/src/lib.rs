#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog_service;
pub mod error;
pub mod progress_service;
pub mod sessions;
pub mod settings_service;
pub mod stats_service;

pub use drill_core::Clock;

pub use app_services::AppServices;
pub use catalog_service::CatalogService;
pub use error::{AppServicesError, ErrorKind, ErrorReport, ServiceError, authenticated};
pub use progress_service::{ProgressService, SubmissionReceipt};
pub use sessions::{QuestionSelector, SelectorConfig, SessionPlan, SessionService};
pub use settings_service::SettingsService;
pub use stats_service::StatsService;
