use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};

use drill_core::model::{Catalog, Question, QuestionId, Topic, TopicProgress};

/// Priority of a topic the learner has never answered.
pub const UNSEEN_TOPIC_PRIORITY: f64 = 100.0;

/// Questions served by a targeted-practice request.
pub const TARGETED_PRACTICE_COUNT: usize = 5;

/// Questions served by a practice-more request.
pub const PRACTICE_MORE_COUNT: usize = 10;

/// Sizes of the non-prioritized selection modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorConfig {
    pub targeted_count: usize,
    pub practice_more_count: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            targeted_count: TARGETED_PRACTICE_COUNT,
            practice_more_count: PRACTICE_MORE_COUNT,
        }
    }
}

/// Selection priority of a topic for `today`.
///
/// Unseen topics get [`UNSEEN_TOPIC_PRIORITY`]; due topics get
/// `10 / (mastery + 0.1)`; topics not yet due get 0 and are skipped.
#[must_use]
pub fn topic_priority(progress: Option<&TopicProgress>, today: NaiveDate) -> f64 {
    match progress {
        None => UNSEEN_TOPIC_PRIORITY,
        Some(p) if p.is_due(today) => 10.0 / (p.mastery_score() + 0.1),
        Some(_) => 0.0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicPriority {
    pub topic: Topic,
    pub priority: f64,
}

/// Selection result for a prioritized session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    pub questions: Vec<Question>,
    pub prioritized_selected: usize,
    pub fill_selected: usize,
}

impl SessionPlan {
    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    /// Returns true when nothing is left to practice today.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Picks questions from a catalog snapshot.
pub struct QuestionSelector<'a> {
    catalog: &'a Catalog,
    today: NaiveDate,
}

impl<'a> QuestionSelector<'a> {
    #[must_use]
    pub fn new(catalog: &'a Catalog, today: NaiveDate) -> Self {
        Self { catalog, today }
    }

    /// Catalog topics with a positive priority, highest first.
    ///
    /// The sort is stable, so equal priorities keep catalog topic order.
    #[must_use]
    pub fn prioritize(&self, progress: &[TopicProgress]) -> Vec<TopicPriority> {
        let by_topic: HashMap<&Topic, &TopicProgress> =
            progress.iter().map(|p| (p.topic(), p)).collect();

        let mut ranked: Vec<TopicPriority> = self
            .catalog
            .topics()
            .iter()
            .map(|topic| TopicPriority {
                topic: topic.clone(),
                priority: topic_priority(by_topic.get(topic).copied(), self.today),
            })
            .filter(|tp| tp.priority > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.priority.total_cmp(&a.priority));
        ranked
    }

    /// Build a prioritized session of at most `size` distinct questions.
    ///
    /// One random question is drawn per topic in priority order, then the
    /// session is topped up at random from the rest of the catalog. Questions
    /// in `seen_today` are never served.
    pub fn select_session<R: Rng + ?Sized>(
        &self,
        size: usize,
        progress: &[TopicProgress],
        seen_today: &HashSet<QuestionId>,
        rng: &mut R,
    ) -> SessionPlan {
        let mut used: HashSet<&QuestionId> = seen_today.iter().collect();
        let size = size.min(self.catalog.len());
        let mut picked: Vec<&Question> = Vec::with_capacity(size);

        for tp in self.prioritize(progress) {
            if picked.len() >= size {
                break;
            }
            let available: Vec<&Question> = self
                .catalog
                .questions_for_topic(&tp.topic)
                .filter(|q| !used.contains(q.id()))
                .collect();
            if let Some(&choice) = available.choose(rng) {
                tracing::debug!(
                    topic = %tp.topic,
                    priority = tp.priority,
                    question = %choice.id(),
                    "picked by priority"
                );
                used.insert(choice.id());
                picked.push(choice);
            }
        }
        let prioritized_selected = picked.len();

        let needed = size.saturating_sub(picked.len());
        if needed > 0 {
            let mut rest: Vec<&Question> = self
                .catalog
                .questions()
                .iter()
                .filter(|q| !used.contains(q.id()))
                .collect();
            let (fill, _) = rest.partial_shuffle(rng, needed);
            picked.extend(fill.iter().copied());
        }

        SessionPlan {
            fill_selected: picked.len() - prioritized_selected,
            prioritized_selected,
            questions: picked.into_iter().cloned().collect(),
        }
    }

    /// Up to `count` shuffled questions from one topic.
    pub fn targeted<R: Rng + ?Sized>(
        &self,
        topic: &Topic,
        count: usize,
        rng: &mut R,
    ) -> Vec<Question> {
        let mut pool: Vec<&Question> = self.catalog.questions_for_topic(topic).collect();
        let (chosen, _) = pool.partial_shuffle(rng, count);
        chosen.iter().map(|q| (*q).clone()).collect()
    }

    /// Up to `count` random questions from the whole catalog.
    pub fn practice_more<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<Question> {
        let mut pool: Vec<&Question> = self.catalog.questions().iter().collect();
        let (chosen, _) = pool.partial_shuffle(rng, count);
        chosen.iter().map(|q| (*q).clone()).collect()
    }
}
