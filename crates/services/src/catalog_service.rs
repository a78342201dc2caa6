use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use drill_core::model::{Catalog, Question, QuestionDraft};
use storage::repository::QuestionRepository;

use crate::error::ServiceError;

/// Loads and reseeds the shared question catalog.
#[derive(Clone)]
pub struct CatalogService {
    questions: Arc<dyn QuestionRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionRepository>) -> Self {
        Self { questions }
    }

    /// Import a JSON array of seed questions.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidCatalog` if the document does not parse,
    /// otherwise the same errors as [`import`](Self::import).
    pub async fn import_json(&self, raw: &str) -> Result<usize, ServiceError> {
        let drafts: Vec<QuestionDraft> =
            serde_json::from_str(raw).map_err(|e| ServiceError::InvalidCatalog(e.to_string()))?;
        self.import(drafts).await
    }

    /// Validate every draft, then upsert them in order.
    ///
    /// Nothing is written unless the whole batch validates. Existing questions
    /// keep their global counters.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Question` or `ServiceError::Id` for an invalid
    /// entry, `ServiceError::InvalidCatalog` for duplicate ids, or
    /// `ServiceError::Storage` if a write fails.
    pub async fn import(&self, drafts: Vec<QuestionDraft>) -> Result<usize, ServiceError> {
        let questions = drafts
            .into_iter()
            .map(QuestionDraft::validate)
            .collect::<Result<Vec<Question>, _>>()?;

        let mut ids = HashSet::with_capacity(questions.len());
        if let Some(dup) = questions.iter().find(|q| !ids.insert(q.id().clone())) {
            return Err(ServiceError::InvalidCatalog(format!(
                "duplicate question id {}",
                dup.id()
            )));
        }

        for question in &questions {
            self.questions.upsert_question(question).await?;
        }
        info!(imported = questions.len(), "catalog imported");
        Ok(questions.len())
    }

    /// The full catalog in seed order.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if the catalog cannot be loaded.
    pub async fn catalog(&self) -> Result<Arc<Catalog>, ServiceError> {
        Ok(self.questions.catalog().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryRepository;

    const SEED: &str = r#"[
        {
            "questionId": "act-001",
            "questionText": "What is 20% of 50?",
            "options": ["5", "10", "15", "20"],
            "correctAnswerIndex": 1,
            "solutionText": "0.2 * 50 = 10",
            "subcategories": ["Percents"]
        },
        {
            "questionId": "act-002",
            "questionText": "Slope of y = 3x + 2?",
            "options": ["2", "3", "5", "6"],
            "correctAnswerIndex": 1,
            "subcategories": ["Linear Equations", "Algebra"]
        }
    ]"#;

    #[tokio::test]
    async fn imports_seed_file_in_order() {
        let repo = InMemoryRepository::new();
        let svc = CatalogService::new(Arc::new(repo.clone()));

        assert_eq!(svc.import_json(SEED).await.unwrap(), 2);
        let catalog = svc.catalog().await.unwrap();
        let ids: Vec<&str> = catalog.questions().iter().map(|q| q.id().as_str()).collect();
        assert_eq!(ids, vec!["act-001", "act-002"]);
        assert_eq!(catalog.topics().len(), 3);

        // reseeding is idempotent
        assert_eq!(svc.import_json(SEED).await.unwrap(), 2);
        assert_eq!(svc.catalog().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalid_batch_writes_nothing() {
        let repo = InMemoryRepository::new();
        let svc = CatalogService::new(Arc::new(repo.clone()));

        let err = svc.import_json("{not json").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCatalog(_)));

        let bad = r#"[
            {"questionId": "ok", "questionText": "?", "options": ["a", "b"],
             "correctAnswerIndex": 0, "subcategories": ["Ratios"]},
            {"questionId": "bad", "questionText": "?", "options": ["a", "b"],
             "correctAnswerIndex": 5, "subcategories": ["Ratios"]}
        ]"#;
        let err = svc.import_json(bad).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);

        let dup = r#"[
            {"questionId": "x", "questionText": "?", "options": ["a", "b"],
             "correctAnswerIndex": 0, "subcategories": ["Ratios"]},
            {"questionId": "x", "questionText": "?", "options": ["a", "b"],
             "correctAnswerIndex": 1, "subcategories": ["Ratios"]}
        ]"#;
        let err = svc.import_json(dup).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCatalog(_)));

        assert!(svc.catalog().await.unwrap().is_empty());
    }
}
