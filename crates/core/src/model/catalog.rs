use std::collections::HashMap;

use crate::model::ids::{QuestionId, Topic};
use crate::model::question::Question;

/// Ordered question catalog with a topic → questions index.
///
/// Iteration order is insertion order; re-inserting an existing id replaces it
/// in place. Topic order is first appearance across that iteration order, which
/// is what the selector uses to break priority ties.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    questions: Vec<Question>,
    by_id: HashMap<QuestionId, usize>,
    topics: Vec<Topic>,
    by_topic: HashMap<Topic, Vec<usize>>,
}

impl Catalog {
    #[must_use]
    pub fn new(questions: impl IntoIterator<Item = Question>) -> Self {
        let mut catalog = Self::default();
        for question in questions {
            catalog.insert_without_reindex(question);
        }
        catalog.reindex_topics();
        catalog
    }

    /// Insert or replace a question, keeping its position when it already exists.
    pub fn upsert(&mut self, question: Question) {
        self.insert_without_reindex(question);
        self.reindex_topics();
    }

    fn insert_without_reindex(&mut self, question: Question) {
        match self.by_id.get(question.id()) {
            Some(&idx) => self.questions[idx] = question,
            None => {
                self.by_id.insert(question.id().clone(), self.questions.len());
                self.questions.push(question);
            }
        }
    }

    fn reindex_topics(&mut self) {
        self.topics.clear();
        self.by_topic.clear();
        for (idx, question) in self.questions.iter().enumerate() {
            for topic in question.topics() {
                let slot = self.by_topic.entry(topic.clone()).or_default();
                if slot.is_empty() {
                    self.topics.push(topic.clone());
                }
                slot.push(idx);
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &QuestionId) -> Option<&Question> {
        self.by_id.get(id).map(|&idx| &self.questions[idx])
    }

    pub fn get_mut(&mut self, id: &QuestionId) -> Option<&mut Question> {
        self.by_id.get(id).map(|&idx| &mut self.questions[idx])
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Distinct topics in first-appearance order.
    #[must_use]
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Questions tagged with `topic`, in catalog order.
    pub fn questions_for_topic<'a>(
        &'a self,
        topic: &Topic,
    ) -> impl Iterator<Item = &'a Question> + 'a {
        self.by_topic
            .get(topic)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|&idx| &self.questions[idx])
    }
}
