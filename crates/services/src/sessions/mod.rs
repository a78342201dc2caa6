mod plan;
mod service;

// Public API of the session subsystem.
pub use plan::{
    PRACTICE_MORE_COUNT, QuestionSelector, SelectorConfig, SessionPlan, TARGETED_PRACTICE_COUNT,
    TopicPriority, UNSEEN_TOPIC_PRIORITY, topic_priority,
};
pub use service::SessionService;
