use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::ids::Topic;
use crate::model::progress::TopicProgress;
use crate::model::stats::{AccuracyTrend, UserAggregateStats};

/// Mastery at or above which a topic counts as mastered.
pub const MASTERED_THRESHOLD: f64 = 0.9;

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

/// Headline numbers for the learner's dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub questions_due: usize,
    pub topics_mastered: usize,
    pub overall_accuracy: f64,
    pub topics_tracked: usize,
}

impl DashboardStats {
    #[must_use]
    pub fn from_progress(progress: &[TopicProgress], today: NaiveDate) -> Self {
        let mut attempts = 0_u64;
        let mut correct = 0_u64;
        let mut questions_due = 0;
        let mut topics_mastered = 0;

        for p in progress {
            attempts += u64::from(p.total_attempts());
            correct += u64::from(p.correct_attempts());
            if p.is_due(today) {
                questions_due += 1;
            }
            if p.mastery_score() >= MASTERED_THRESHOLD {
                topics_mastered += 1;
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let overall_accuracy = if attempts == 0 {
            0.0
        } else {
            round_to(correct as f64 / attempts as f64 * 100.0, 2)
        };

        Self {
            questions_due,
            topics_mastered,
            overall_accuracy,
            topics_tracked: progress.len(),
        }
    }
}

/// One cell of the mastery heatmap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub topic: Topic,
    pub mastery: f64,
}

#[must_use]
pub fn heatmap(progress: &[TopicProgress]) -> Vec<HeatmapCell> {
    progress
        .iter()
        .map(|p| HeatmapCell {
            topic: p.topic().clone(),
            mastery: p.mastery_score(),
        })
        .collect()
}

/// Accuracy against speed for one topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityMatrixPoint {
    pub topic: Topic,
    pub accuracy: f64,
    pub avg_time: f64,
}

#[must_use]
pub fn priority_matrix(progress: &[TopicProgress]) -> Vec<PriorityMatrixPoint> {
    progress
        .iter()
        .map(|p| PriorityMatrixPoint {
            topic: p.topic().clone(),
            accuracy: round_to(p.accuracy(), 1),
            avg_time: round_to(p.average_time(), 1),
        })
        .collect()
}

/// Distinct days on which any topic was last reviewed, ascending.
#[must_use]
pub fn practice_days(progress: &[TopicProgress]) -> Vec<NaiveDate> {
    progress
        .iter()
        .map(|p| p.last_reviewed_at().date_naive())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Rolling accuracy and streak, as shown next to a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub current_rolling_accuracy: f64,
    pub previous_rolling_accuracy: f64,
    pub trend: AccuracyTrend,
    pub practice_streak: u32,
    pub total_questions_answered: u64,
}

impl PerformanceSummary {
    /// Summary for a learner with no answers yet.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            current_rolling_accuracy: 0.0,
            previous_rolling_accuracy: 0.0,
            trend: AccuracyTrend::Flat,
            practice_streak: 0,
            total_questions_answered: 0,
        }
    }
}

impl From<&UserAggregateStats> for PerformanceSummary {
    fn from(stats: &UserAggregateStats) -> Self {
        Self {
            current_rolling_accuracy: stats.current_rolling_accuracy(),
            previous_rolling_accuracy: stats.previous_rolling_accuracy(),
            trend: stats.trend(),
            practice_streak: stats.practice_streak(),
            total_questions_answered: stats.total_questions_answered(),
        }
    }
}
