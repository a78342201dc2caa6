mod answer;
mod catalog;
mod ids;
pub mod insights;
mod progress;
mod question;
mod settings;
mod stats;

pub use ids::{IdError, QuestionId, Topic, UserId};

pub use answer::{
    AnswerSubmission, ContextPolicy, GradedAnswer, MAX_TIME_SPENT_SECS, PracticeContext,
    SubmissionError, clamp_time_spent, performance_rating,
};
pub use catalog::Catalog;
pub use insights::{DashboardStats, HeatmapCell, PerformanceSummary, PriorityMatrixPoint};
pub use progress::{ProgressError, ProgressUpdate, TopicProgress};
pub use question::{Question, QuestionContent, QuestionDraft, QuestionError, QuestionStats};
pub use settings::{Role, SettingsError, SettingsUpdate, UserSettings};
pub use stats::{AccuracyTrend, ROLLING_WINDOW, StatsError, UserAggregateStats};
