use std::path::Path;

use anyhow::Context;
use serde_json::{Value, json};

use drill_core::model::{
    AnswerSubmission, PracticeContext, QuestionId, SettingsUpdate, Topic, UserId,
};
use services::{AppServices, ServiceError, SessionPlan, SubmissionReceipt};

pub async fn seed(app: &AppServices, catalog: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(catalog)
        .with_context(|| format!("reading {}", catalog.display()))?;
    let imported = app.catalog().import_json(&raw).await?;
    let total = app.catalog().catalog().await?.len();
    Ok(json!({ "imported": imported, "catalogSize": total }))
}

pub async fn session(
    app: &AppServices,
    user: &UserId,
    limit: Option<u32>,
    resume: bool,
) -> Result<Value, ServiceError> {
    let sessions = app.sessions();
    let plan = if resume {
        sessions.fetch_session(user, limit).await?
    } else {
        sessions.start_session(user, limit).await?
    };
    Ok(plan_json(&plan))
}

pub async fn answer(
    app: &AppServices,
    user: &UserId,
    question: &str,
    option: i64,
    time: f64,
    context: PracticeContext,
) -> Result<Value, ServiceError> {
    let submission = AnswerSubmission {
        question_id: QuestionId::new(question)?,
        selected_answer_index: option,
        time_spent: time,
        performance_context: context,
    };
    let receipt = app.progress().submit_answer(user, &submission).await?;
    Ok(receipt_json(&receipt))
}

pub async fn targeted(app: &AppServices, topic: &str) -> Result<Value, ServiceError> {
    let topic = Topic::new(topic)?;
    let questions = app.sessions().targeted_practice(&topic).await?;
    Ok(json!({ "topic": topic, "questions": questions }))
}

pub async fn practice_more(app: &AppServices) -> Result<Value, ServiceError> {
    let questions = app.sessions().practice_more().await?;
    Ok(json!({ "questions": questions }))
}

pub async fn stats(app: &AppServices, user: &UserId) -> Result<Value, ServiceError> {
    let stats = app.stats();
    Ok(json!({
        "dashboard": stats.dashboard(user).await?,
        "heatmap": stats.heatmap(user).await?,
        "priorityMatrix": stats.priority_matrix(user).await?,
        "practiceDays": stats.practice_days(user).await?,
        "performance": stats.performance(user).await?,
    }))
}

pub async fn settings(
    app: &AppServices,
    user: &UserId,
    update: SettingsUpdate,
) -> Result<Value, ServiceError> {
    let settings = if update.is_empty() {
        app.settings().load(user).await?
    } else {
        app.settings().update(user, update).await?
    };
    Ok(json!(settings))
}

pub async fn reset(app: &AppServices, user: &UserId) -> Result<Value, ServiceError> {
    let removed = app.progress().reset_progress(user).await?;
    Ok(json!({ "removed": removed }))
}

fn plan_json(plan: &SessionPlan) -> Value {
    json!({
        "questions": plan.questions,
        "prioritizedSelected": plan.prioritized_selected,
        "fillSelected": plan.fill_selected,
    })
}

fn receipt_json(receipt: &SubmissionReceipt) -> Value {
    let topics: Vec<Value> = receipt
        .topics
        .iter()
        .map(|p| {
            json!({
                "topic": p.topic(),
                "masteryScore": p.mastery_score(),
                "nextReviewDate": p.next_review_date(),
                "totalAttempts": p.total_attempts(),
                "correctAttempts": p.correct_attempts(),
            })
        })
        .collect();

    json!({
        "questionId": receipt.question_id,
        "context": receipt.context,
        "isCorrect": receipt.graded.is_correct,
        "performanceRating": receipt.graded.performance_rating,
        "timeSpent": receipt.graded.time_spent,
        "topics": topics,
        "recordedGlobally": receipt.recorded_globally,
        "markedSeen": receipt.marked_seen,
        "currentRollingAccuracy": receipt.stats.current_rolling_accuracy(),
        "practiceStreak": receipt.stats.practice_streak(),
    })
}
