use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use drill_core::model::{Catalog, Question, QuestionId};
use sqlx::{Row, Sqlite, Transaction};

use super::SqliteRepository;
use super::mapping::{conn, i64_to_u64, map_question_row, ser, to_json, u64_to_i64, usize_to_i64};
use crate::repository::{QuestionRepository, StorageError};

const SELECT_QUESTIONS: &str = r"
    SELECT
        id, subcategories, question_text, options, correct_answer_index, solution_text,
        solution_diagram_svg, global_total_attempts, global_correct_attempts,
        global_total_time_spent
    FROM questions
";

async fn option_counts(
    tx: &mut Transaction<'_, Sqlite>,
    id: Option<&str>,
) -> Result<HashMap<String, Vec<u64>>, StorageError> {
    let rows = match id {
        Some(id) => {
            sqlx::query(
                r"
                SELECT question_id, option_index, selections
                FROM question_option_counts
                WHERE question_id = ?1
                ORDER BY option_index ASC
                ",
            )
            .bind(id)
            .fetch_all(&mut **tx)
            .await
        }
        None => {
            sqlx::query(
                r"
                SELECT question_id, option_index, selections
                FROM question_option_counts
                ORDER BY question_id ASC, option_index ASC
                ",
            )
            .fetch_all(&mut **tx)
            .await
        }
    }
    .map_err(conn)?;

    let mut by_question: HashMap<String, Vec<u64>> = HashMap::new();
    for row in rows {
        let question_id: String = row.try_get("question_id").map_err(ser)?;
        let selections = i64_to_u64("selections", row.try_get("selections").map_err(ser)?)?;
        by_question.entry(question_id).or_default().push(selections);
    }
    Ok(by_question)
}

async fn fetch_question(
    tx: &mut Transaction<'_, Sqlite>,
    id: &QuestionId,
) -> Result<Option<Question>, StorageError> {
    let sql = format!("{SELECT_QUESTIONS} WHERE id = ?1");
    let row = sqlx::query(&sql)
        .bind(id.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(conn)?;

    let Some(row) = row else {
        return Ok(None);
    };
    let counts = option_counts(tx, Some(id.as_str()))
        .await?
        .remove(id.as_str())
        .unwrap_or_default();
    map_question_row(&row, counts).map(Some)
}

async fn write_question(
    tx: &mut Transaction<'_, Sqlite>,
    question: &Question,
) -> Result<(), StorageError> {
    let content = question.content();
    let stats = question.stats();

    sqlx::query(
        r"
        INSERT INTO questions (
            id, seq, subcategories, question_text, options, correct_answer_index,
            solution_text, solution_diagram_svg, global_total_attempts,
            global_correct_attempts, global_total_time_spent
        )
        VALUES (
            ?1, (SELECT COALESCE(MAX(seq), 0) + 1 FROM questions),
            ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10
        )
        ON CONFLICT(id) DO UPDATE SET
            -- seq is kept so catalog order survives re-seeding
            subcategories = excluded.subcategories,
            question_text = excluded.question_text,
            options = excluded.options,
            correct_answer_index = excluded.correct_answer_index,
            solution_text = excluded.solution_text,
            solution_diagram_svg = excluded.solution_diagram_svg,
            global_total_attempts = excluded.global_total_attempts,
            global_correct_attempts = excluded.global_correct_attempts,
            global_total_time_spent = excluded.global_total_time_spent
        ",
    )
    .bind(question.id().as_str())
    .bind(to_json(question.topics())?)
    .bind(&content.question_text)
    .bind(to_json(&content.options)?)
    .bind(usize_to_i64(
        "correct_answer_index",
        content.correct_answer_index,
    )?)
    .bind(&content.solution_text)
    .bind(content.solution_diagram_svg.as_deref())
    .bind(u64_to_i64("global_total_attempts", stats.total_attempts())?)
    .bind(u64_to_i64(
        "global_correct_attempts",
        stats.correct_attempts(),
    )?)
    .bind(stats.total_time_spent())
    .execute(&mut **tx)
    .await
    .map_err(conn)?;

    sqlx::query("DELETE FROM question_option_counts WHERE question_id = ?1")
        .bind(question.id().as_str())
        .execute(&mut **tx)
        .await
        .map_err(conn)?;

    for (index, selections) in stats.option_selection_counts().iter().enumerate() {
        sqlx::query(
            r"
            INSERT INTO question_option_counts (question_id, option_index, selections)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(question.id().as_str())
        .bind(usize_to_i64("option_index", index)?)
        .bind(u64_to_i64("selections", *selections)?)
        .execute(&mut **tx)
        .await
        .map_err(conn)?;
    }

    Ok(())
}

impl SqliteRepository {
    fn cached_catalog(&self) -> Option<Arc<Catalog>> {
        self.catalog_cache
            .read()
            .ok()
            .and_then(|guard| guard.catalog.as_ref().map(Arc::clone))
    }

    fn catalog_generation(&self) -> Option<u64> {
        self.catalog_cache.read().ok().map(|guard| guard.generation)
    }

    /// Install a freshly loaded catalog unless a write landed after `generation` was read.
    fn store_catalog_if_current(&self, generation: Option<u64>, catalog: Arc<Catalog>) {
        let Ok(mut guard) = self.catalog_cache.write() else {
            return;
        };
        if generation == Some(guard.generation) {
            guard.catalog = Some(catalog);
        }
    }

    fn invalidate_catalog(&self) {
        if let Ok(mut guard) = self.catalog_cache.write() {
            guard.generation = guard.generation.wrapping_add(1);
            guard.catalog = None;
        }
    }

    /// Mirror a committed attempt into the cached catalog, or drop the cache
    /// if it cannot be kept in step.
    fn refresh_cached_attempt(
        &self,
        id: &QuestionId,
        selected_option: usize,
        correct: bool,
        time_spent: f64,
    ) {
        let Ok(mut guard) = self.catalog_cache.write() else {
            return;
        };
        guard.generation = guard.generation.wrapping_add(1);
        let Some(cached) = guard.catalog.as_mut() else {
            return;
        };
        let applied = Arc::make_mut(cached)
            .get_mut(id)
            .map(|q| q.record_attempt(selected_option, correct, time_spent).is_ok())
            .unwrap_or(false);
        if !applied {
            guard.catalog = None;
        }
    }
}

#[async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let merged = match fetch_question(&mut tx, question.id()).await? {
            Some(existing) => existing.with_content_of(question.clone()).map_err(ser)?,
            None => question.clone(),
        };
        write_question(&mut tx, &merged).await?;

        tx.commit().await.map_err(conn)?;
        self.invalidate_catalog();
        Ok(())
    }

    async fn get_question(&self, id: &QuestionId) -> Result<Question, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        let question = fetch_question(&mut tx, id).await?;
        tx.commit().await.map_err(conn)?;
        question.ok_or(StorageError::NotFound)
    }

    async fn catalog(&self) -> Result<Arc<Catalog>, StorageError> {
        if let Some(catalog) = self.cached_catalog() {
            return Ok(catalog);
        }

        let generation = self.catalog_generation();
        let mut tx = self.pool.begin().await.map_err(conn)?;
        let sql = format!("{SELECT_QUESTIONS} ORDER BY seq ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&mut *tx)
            .await
            .map_err(conn)?;
        let mut counts = option_counts(&mut tx, None).await?;
        tx.commit().await.map_err(conn)?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id").map_err(ser)?;
            let tallies = counts.remove(&id).unwrap_or_default();
            questions.push(map_question_row(&row, tallies)?);
        }

        let catalog = Arc::new(Catalog::new(questions));
        self.store_catalog_if_current(generation, Arc::clone(&catalog));
        Ok(catalog)
    }

    async fn record_attempt(
        &self,
        id: &QuestionId,
        selected_option: usize,
        correct: bool,
        time_spent: f64,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let updated = sqlx::query(
            r"
            UPDATE questions SET
                global_total_attempts = global_total_attempts + 1,
                global_correct_attempts = global_correct_attempts + ?2,
                global_total_time_spent = global_total_time_spent + ?3
            WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .bind(i64::from(correct))
        .bind(time_spent)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;
        if updated.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        let tallied = sqlx::query(
            r"
            UPDATE question_option_counts
            SET selections = selections + 1
            WHERE question_id = ?1 AND option_index = ?2
            ",
        )
        .bind(id.as_str())
        .bind(usize_to_i64("option_index", selected_option)?)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;
        if tallied.rows_affected() == 0 {
            return Err(StorageError::Serialization(format!(
                "question {id} has no option {selected_option}"
            )));
        }

        tx.commit().await.map_err(conn)?;
        self.refresh_cached_attempt(id, selected_option, correct, time_spent);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drill_core::model::{QuestionContent, Topic};

    async fn connect(name: &str) -> SqliteRepository {
        let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
        let repo = SqliteRepository::connect(&url).await.expect("connect");
        repo.migrate().await.expect("migrate");
        repo
    }

    fn question(id: &str) -> Question {
        Question::new(
            QuestionId::new(id).unwrap(),
            vec![Topic::new("Ratios").unwrap()],
            QuestionContent {
                question_text: format!("Question {id}"),
                options: vec!["1".into(), "2".into(), "3".into()],
                correct_answer_index: 0,
                solution_text: String::new(),
                solution_diagram_svg: None,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn snapshot_loaded_before_a_write_is_not_cached() {
        let repo = connect("memdb_cache_generation").await;
        repo.upsert_question(&question("a")).await.unwrap();

        // a load starts, then a new question is seeded before it finishes
        let generation = repo.catalog_generation();
        let stale = Arc::new(Catalog::new(vec![question("a")]));
        repo.upsert_question(&question("b")).await.unwrap();
        repo.store_catalog_if_current(generation, stale);

        assert!(repo.cached_catalog().is_none());
        assert_eq!(repo.catalog().await.unwrap().len(), 2);
        assert!(repo.cached_catalog().is_some());
    }

    #[tokio::test]
    async fn attempts_invalidate_in_flight_loads() {
        let repo = connect("memdb_cache_attempt").await;
        repo.upsert_question(&question("a")).await.unwrap();
        let id = QuestionId::new("a").unwrap();

        let generation = repo.catalog_generation();
        let stale = Arc::new(Catalog::new(vec![question("a")]));
        repo.record_attempt(&id, 2, false, 12.0).await.unwrap();
        repo.store_catalog_if_current(generation, stale);

        let catalog = repo.catalog().await.unwrap();
        let q = catalog.get(&id).unwrap();
        assert_eq!(q.stats().total_attempts(), 1);
        assert_eq!(q.stats().option_selection_counts(), &[0, 0, 1]);
    }
}
