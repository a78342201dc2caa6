use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use rand::SeedableRng;
use rand::rngs::StdRng;

use drill_core::model::{
    AnswerSubmission, PracticeContext, ProgressUpdate, Question, QuestionContent, QuestionId,
    Topic, TopicProgress, UserId,
};
use drill_core::time::{fixed_now, fixed_today};
use services::{
    AppServices, Clock, ErrorKind, ProgressService, SelectorConfig, SessionService, StatsService,
};
use storage::repository::{
    InMemoryRepository, QuestionRepository, Storage, StorageError, TopicProgressRepository,
    UserStatsRepository,
};

fn question(id: &str, topic: &str) -> Question {
    Question::new(
        QuestionId::new(id).unwrap(),
        vec![Topic::new(topic).unwrap()],
        QuestionContent {
            question_text: format!("Question {id}"),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_answer_index: 2,
            solution_text: "See worked solution.".into(),
            solution_diagram_svg: None,
        },
    )
    .unwrap()
}

async fn seeded_repo() -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    for (id, topic) in [
        ("r1", "Ratios"),
        ("r2", "Ratios"),
        ("a1", "Angles"),
        ("a2", "Angles"),
        ("p1", "Percents"),
        ("p2", "Percents"),
    ] {
        repo.upsert_question(&question(id, topic)).await.unwrap();
    }
    repo
}

fn services(repo: &InMemoryRepository, clock: Clock) -> AppServices {
    AppServices::from_storage(&Storage::from_repository(repo.clone()), clock)
}

fn submission(id: &QuestionId, selected: i64, context: PracticeContext) -> AnswerSubmission {
    AnswerSubmission {
        question_id: id.clone(),
        selected_answer_index: selected,
        time_spent: 30.0,
        performance_context: context,
    }
}

#[tokio::test]
async fn fresh_learner_gets_distinct_questions_across_topics() {
    let repo = seeded_repo().await;
    let app = services(&repo, Clock::fixed(fixed_now()));
    let user = UserId::new("learner").unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    let plan = app
        .sessions()
        .fetch_session_with_rng(&user, Some(4), &mut rng)
        .await
        .unwrap();

    assert_eq!(plan.total(), 4);
    assert_eq!(plan.prioritized_selected, 3);
    assert_eq!(plan.fill_selected, 1);
    let ids: HashSet<&QuestionId> = plan.questions.iter().map(Question::id).collect();
    assert_eq!(ids.len(), 4);
    let topics: HashSet<&Topic> = plan.questions.iter().flat_map(Question::topics).collect();
    assert!(topics.len() >= 2);
}

#[tokio::test]
async fn answered_questions_are_not_served_again_today() {
    let repo = seeded_repo().await;
    let app = services(&repo, Clock::fixed(fixed_now()));
    let user = UserId::new("learner").unwrap();
    let mut rng = StdRng::seed_from_u64(11);

    let first = app
        .sessions()
        .fetch_session_with_rng(&user, Some(3), &mut rng)
        .await
        .unwrap();
    for q in &first.questions {
        app.progress()
            .submit_answer(&user, &submission(q.id(), 2, PracticeContext::PracticeSession))
            .await
            .unwrap();
    }

    // every topic now has progress scheduled in the future
    let second = app
        .sessions()
        .fetch_session_with_rng(&user, Some(6), &mut rng)
        .await
        .unwrap();
    assert_eq!(second.prioritized_selected, 0);
    assert_eq!(second.total(), 3);
    for q in &second.questions {
        assert!(first.questions.iter().all(|seen| seen.id() != q.id()));
    }

    // the next day the history is clear again
    let tomorrow = services(&repo, Clock::fixed(fixed_now() + Duration::days(1)));
    let third = tomorrow
        .sessions()
        .fetch_session_with_rng(&user, Some(6), &mut rng)
        .await
        .unwrap();
    assert_eq!(third.total(), 6);
}

#[tokio::test]
async fn session_size_defaults_to_daily_limit() {
    let repo = seeded_repo().await;
    for n in 0..10 {
        repo.upsert_question(&question(&format!("extra{n}"), "Algebra"))
            .await
            .unwrap();
    }
    let app = services(&repo, Clock::fixed(fixed_now()));
    let user = UserId::new("learner").unwrap();

    let plan = app.sessions().fetch_session(&user, None).await.unwrap();
    assert_eq!(plan.total(), 10);

    let err = app.sessions().fetch_session(&user, Some(0)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn due_weak_topic_is_prioritized_over_strong_one() {
    let repo = seeded_repo().await;
    let user = UserId::new("learner").unwrap();
    let today = fixed_today();
    for (topic, score, due) in [("Ratios", 0.9, today), ("Angles", 0.2, today)] {
        repo.upsert_progress(
            &user,
            &Topic::new(topic).unwrap(),
            &ProgressUpdate {
                mastery_score: score,
                next_review_date: due,
                reviewed_at: fixed_now() - Duration::days(3),
                correct: true,
                time_spent: 20.0,
            },
        )
        .await
        .unwrap();
    }
    let app = services(&repo, Clock::fixed(fixed_now()));
    let mut rng = StdRng::seed_from_u64(3);

    let plan = app
        .sessions()
        .fetch_session_with_rng(&user, Some(3), &mut rng)
        .await
        .unwrap();

    // unseen Percents first, then weak Angles, then strong Ratios
    let order: Vec<&str> = plan
        .questions
        .iter()
        .map(|q| q.topics()[0].as_str())
        .collect();
    assert_eq!(order, vec!["Percents", "Angles", "Ratios"]);
}

#[tokio::test]
async fn contexts_apply_their_side_effects() {
    let repo = seeded_repo().await;
    let app = services(&repo, Clock::fixed(fixed_now()));
    let user = UserId::new("learner").unwrap();
    let r1 = QuestionId::new("r1").unwrap();

    let targeted = app
        .progress()
        .submit_answer(&user, &submission(&r1, 2, PracticeContext::TargetedPractice))
        .await
        .unwrap();
    assert!(targeted.graded.is_correct);
    assert!(targeted.topics.is_empty());
    assert!(!targeted.recorded_globally);

    let mock = app
        .progress()
        .submit_answer(&user, &submission(&r1, 0, PracticeContext::MockTest))
        .await
        .unwrap();
    assert!(mock.recorded_globally && !mock.marked_seen);

    let practice = app
        .progress()
        .submit_answer(&user, &submission(&r1, 2, PracticeContext::PracticeSession))
        .await
        .unwrap();
    assert_eq!(practice.topics.len(), 1);
    let record: &TopicProgress = &practice.topics[0];
    assert!((record.mastery_score() - 0.325).abs() < 1e-9);
    assert_eq!(record.total_attempts(), 1);

    let q = repo.get_question(&r1).await.unwrap();
    assert_eq!(q.stats().total_attempts(), 2);
    assert_eq!(q.stats().correct_attempts(), 1);
    assert_eq!(q.stats().option_selection_counts(), &[1, 0, 1, 0]);

    let stats = repo.get_stats(&user).await.unwrap().unwrap();
    assert_eq!(stats.total_questions_answered(), 3);
    assert!((stats.current_rolling_accuracy() - 66.67).abs() < 0.01);
}

#[tokio::test]
async fn targeted_and_practice_more_batches() {
    let repo = seeded_repo().await;
    let app = services(&repo, Clock::fixed(fixed_now()));

    let batch = app
        .sessions()
        .targeted_practice(&Topic::new("Angles").unwrap())
        .await
        .unwrap();
    assert_eq!(batch.len(), 2);
    assert!(batch.iter().all(|q| q.has_topic(&Topic::new("Angles").unwrap())));

    let none = app
        .sessions()
        .targeted_practice(&Topic::new("Trigonometry").unwrap())
        .await
        .unwrap();
    assert!(none.is_empty());

    assert_eq!(app.sessions().practice_more().await.unwrap().len(), 6);
}

#[tokio::test]
async fn begin_session_snapshots_trend_baseline() {
    let repo = seeded_repo().await;
    let app = services(&repo, Clock::fixed(fixed_now()));
    let user = UserId::new("learner").unwrap();
    let r1 = QuestionId::new("r1").unwrap();

    assert!(!app.sessions().begin_session(&user).await.unwrap());

    app.progress()
        .submit_answer(&user, &submission(&r1, 2, PracticeContext::PracticeSession))
        .await
        .unwrap();
    assert!(app.sessions().begin_session(&user).await.unwrap());
    app.progress()
        .submit_answer(&user, &submission(&r1, 1, PracticeContext::TargetedPractice))
        .await
        .unwrap();

    let summary = app.stats().performance(&user).await.unwrap();
    assert_eq!(summary.previous_rolling_accuracy, 100.0);
    assert_eq!(summary.current_rolling_accuracy, 50.0);
    assert_eq!(summary.trend, drill_core::model::AccuracyTrend::Down);
}

#[tokio::test]
async fn rejected_session_size_keeps_trend_baseline() {
    let repo = seeded_repo().await;
    let app = services(&repo, Clock::fixed(fixed_now()));
    let user = UserId::new("learner").unwrap();
    let r1 = QuestionId::new("r1").unwrap();

    app.progress()
        .submit_answer(&user, &submission(&r1, 2, PracticeContext::PracticeSession))
        .await
        .unwrap();

    let err = app.sessions().start_session(&user, Some(0)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    let stats = repo.get_stats(&user).await.unwrap().unwrap();
    assert_eq!(stats.previous_rolling_accuracy(), 0.0);
    assert_eq!(stats.current_rolling_accuracy(), 100.0);

    let plan = app.sessions().start_session(&user, Some(u32::MAX)).await.unwrap();
    assert_eq!(plan.total(), 5);
    let stats = repo.get_stats(&user).await.unwrap().unwrap();
    assert_eq!(stats.previous_rolling_accuracy(), 100.0);
}

#[tokio::test]
async fn selector_config_sizes_extra_batches() {
    let repo = seeded_repo().await;
    let sessions = SessionService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    )
    .with_config(SelectorConfig {
        targeted_count: 1,
        practice_more_count: 4,
    });

    let ratios = Topic::new("Ratios").unwrap();
    assert_eq!(sessions.targeted_practice(&ratios).await.unwrap().len(), 1);
    assert_eq!(sessions.practice_more().await.unwrap().len(), 4);
}

#[tokio::test]
async fn streak_extends_on_consecutive_days_and_resets_after_gap() {
    let repo = seeded_repo().await;
    let user = UserId::new("learner").unwrap();
    let r1 = QuestionId::new("r1").unwrap();

    let base = ProgressService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );
    let stats = StatsService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );

    let mut clock = Clock::fixed(fixed_now());
    for expected in [1, 2, 3] {
        base.clone()
            .with_clock(clock)
            .submit_answer(&user, &submission(&r1, 2, PracticeContext::TargetedPractice))
            .await
            .unwrap();
        assert_eq!(
            stats.performance(&user).await.unwrap().practice_streak,
            expected
        );
        clock.advance(Duration::days(1));
    }

    // skip a day
    clock.advance(Duration::days(1));
    base.with_clock(clock)
        .submit_answer(&user, &submission(&r1, 2, PracticeContext::TargetedPractice))
        .await
        .unwrap();
    assert_eq!(stats.performance(&user).await.unwrap().practice_streak, 1);
}

#[tokio::test]
async fn reset_clears_progress_but_keeps_catalog_counters() {
    let repo = seeded_repo().await;
    let app = services(&repo, Clock::fixed(fixed_now()));
    let user = UserId::new("learner").unwrap();
    let r1 = QuestionId::new("r1").unwrap();

    app.progress()
        .submit_answer(&user, &submission(&r1, 2, PracticeContext::PracticeSession))
        .await
        .unwrap();
    assert_eq!(app.progress().reset_progress(&user).await.unwrap(), 1);
    assert_eq!(app.stats().dashboard(&user).await.unwrap().topics_tracked, 0);
    assert_eq!(
        repo.get_question(&r1).await.unwrap().stats().total_attempts(),
        1
    );
}

//
// ─── FAILING STORE ─────────────────────────────────────────────────────────────
//

struct UnreachableProgress;

#[async_trait]
impl TopicProgressRepository for UnreachableProgress {
    async fn get_progress(
        &self,
        _user: &UserId,
        _topic: &Topic,
    ) -> Result<Option<TopicProgress>, StorageError> {
        Err(StorageError::Connection("database is locked".into()))
    }

    async fn upsert_progress(
        &self,
        _user: &UserId,
        _topic: &Topic,
        _update: &ProgressUpdate,
    ) -> Result<TopicProgress, StorageError> {
        Err(StorageError::Connection("database is locked".into()))
    }

    async fn list_progress_by_user(
        &self,
        _user: &UserId,
    ) -> Result<Vec<TopicProgress>, StorageError> {
        Err(StorageError::Connection("database is locked".into()))
    }

    async fn delete_all_progress_by_user(&self, _user: &UserId) -> Result<u64, StorageError> {
        Err(StorageError::Connection("database is locked".into()))
    }
}

#[tokio::test]
async fn unavailable_store_is_reported_as_retryable() {
    let repo = seeded_repo().await;
    let user = UserId::new("learner").unwrap();
    let sessions = SessionService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(UnreachableProgress),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );

    let err = sessions.fetch_session(&user, Some(3)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    assert!(err.is_retryable());
    assert_eq!(err.report().kind, ErrorKind::StoreUnavailable);
}
