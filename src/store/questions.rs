//! Question bank access.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::Database;
use crate::error::{QuizError, Result};
use crate::model::{compare_ids, CategoryCount, Difficulty, Question, QuestionType};

/// Access to the question bank.
///
/// Only the lookups and the two bulk writes need a backend-specific
/// implementation; the filters are derived from the full sequence, which is
/// fine for a bank of a few thousand questions.
pub trait QuestionStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<Question>>;

    /// Every question, integer ids in numeric order first.
    fn all_in_sequence(&self) -> Result<Vec<Question>>;

    fn count(&self) -> Result<usize>;

    /// A random question whose id is not in `exclude`, or `None` when every
    /// question is excluded.
    fn random_excluding(&self, exclude: &HashSet<String>) -> Result<Option<Question>>;

    /// Insert or replace the given questions. Returns the number written.
    fn import(&self, questions: &[Question]) -> Result<usize>;

    /// Bulk re-import: drop the whole bank and load `questions` in one
    /// transaction. History and favorites are left untouched.
    fn replace_all(&self, questions: &[Question]) -> Result<usize>;

    fn random(&self) -> Result<Option<Question>> {
        self.random_excluding(&HashSet::new())
    }

    /// Up to `count` distinct questions in random order.
    fn random_sample(&self, count: usize) -> Result<Vec<Question>> {
        let all = self.all_in_sequence()?;
        Ok(all
            .choose_multiple(&mut rand::thread_rng(), count)
            .cloned()
            .collect())
    }

    /// Case-insensitive substring match over stem and id.
    fn search(&self, substring: &str) -> Result<Vec<Question>> {
        let needle = substring.trim().to_lowercase();
        let all = self.all_in_sequence()?;
        if needle.is_empty() {
            return Ok(all);
        }
        Ok(all
            .into_iter()
            .filter(|q| {
                q.stem.to_lowercase().contains(&needle) || q.id.to_lowercase().contains(&needle)
            })
            .collect())
    }

    fn by_category(&self, category: &str) -> Result<Vec<Question>> {
        let wanted = category.trim();
        Ok(self
            .all_in_sequence()?
            .into_iter()
            .filter(|q| q.category_key() == wanted)
            .collect())
    }

    fn by_difficulty(&self, difficulty: Difficulty) -> Result<Vec<Question>> {
        Ok(self
            .all_in_sequence()?
            .into_iter()
            .filter(|q| q.difficulty == difficulty)
            .collect())
    }

    /// Categories with their question counts, sorted by name.
    fn categories(&self) -> Result<Vec<CategoryCount>> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for q in self.all_in_sequence()? {
            *counts.entry(q.category_key().to_string()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(name, question_count)| CategoryCount {
                name,
                question_count,
            })
            .collect())
    }
}

/// SQLite-backed question bank.
#[derive(Debug, Clone)]
pub struct SqliteQuestionStore {
    db: Database,
}

const SELECT_QUESTION: &str =
    "SELECT id, stem, answer, difficulty, qtype, category, options, created_at FROM questions";

struct QuestionRow {
    id: String,
    stem: String,
    answer: String,
    difficulty: Option<String>,
    qtype: Option<String>,
    category: Option<String>,
    options: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl QuestionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            stem: row.get(1)?,
            answer: row.get(2)?,
            difficulty: row.get(3)?,
            qtype: row.get(4)?,
            category: row.get(5)?,
            options: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_question(self) -> Result<Question> {
        let options: BTreeMap<String, String> = match self.options.as_deref().map(str::trim) {
            None | Some("") => BTreeMap::new(),
            Some(json) => serde_json::from_str(json).map_err(|e| QuizError::Corrupt {
                id: self.id.clone(),
                reason: format!("options are not a JSON object: {e}"),
            })?,
        };
        let qtype = QuestionType::parse_label(
            self.qtype.as_deref().unwrap_or_default(),
            &options,
            &self.answer,
        );
        Ok(Question {
            difficulty: Difficulty::parse_label(self.difficulty.as_deref().unwrap_or_default()),
            qtype,
            category: self.category.unwrap_or_default(),
            id: self.id,
            stem: self.stem,
            answer: self.answer,
            options,
            created_at: self.created_at,
        })
    }
}

impl SqliteQuestionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn query_all(conn: &Connection) -> Result<Vec<Question>> {
        let mut stmt = conn.prepare(SELECT_QUESTION)?;
        let rows = stmt
            .query_map([], QuestionRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_question() {
                Ok(q) => questions.push(q),
                Err(e) => tracing::warn!("skipping question: {e}"),
            }
        }
        Ok(questions)
    }
}

fn insert_questions(conn: &Connection, questions: &[Question]) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT OR REPLACE INTO questions
             (id, stem, answer, difficulty, qtype, category, options, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    let mut count = 0;
    for q in questions {
        if q.id.trim().is_empty() {
            return Err(QuizError::InvalidArgument(
                "question id must not be empty".into(),
            ));
        }
        let options = serde_json::to_string(&q.options).map_err(|e| QuizError::Corrupt {
            id: q.id.clone(),
            reason: e.to_string(),
        })?;
        stmt.execute(params![
            q.id,
            q.stem,
            q.answer,
            q.difficulty.as_str(),
            q.qtype.as_str(),
            q.category,
            options,
            q.created_at.unwrap_or_else(Utc::now),
        ])?;
        count += 1;
    }
    Ok(count)
}

impl QuestionStore for SqliteQuestionStore {
    fn import(&self, questions: &[Question]) -> Result<usize> {
        let mut conn = self.db.connect()?;
        let tx = conn.transaction()?;
        let count = insert_questions(&tx, questions)?;
        tx.commit()?;
        tracing::info!(count, "imported questions");
        Ok(count)
    }

    fn replace_all(&self, questions: &[Question]) -> Result<usize> {
        let mut conn = self.db.connect()?;
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM questions", [])?;
        let count = insert_questions(&tx, questions)?;
        tx.commit()?;
        tracing::info!(removed, count, "replaced question bank");
        Ok(count)
    }

    fn get(&self, id: &str) -> Result<Option<Question>> {
        let conn = self.db.connect()?;
        let row = conn
            .query_row(
                &format!("{SELECT_QUESTION} WHERE id = ?1"),
                params![id],
                QuestionRow::from_row,
            )
            .optional()?;
        row.map(QuestionRow::into_question).transpose()
    }

    fn all_in_sequence(&self) -> Result<Vec<Question>> {
        let conn = self.db.connect()?;
        let mut questions = Self::query_all(&conn)?;
        questions.sort_by(|a, b| compare_ids(&a.id, &b.id));
        Ok(questions)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.db.connect()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM questions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn random_excluding(&self, exclude: &HashSet<String>) -> Result<Option<Question>> {
        let ids: Vec<String> = {
            let conn = self.db.connect()?;
            let mut stmt = conn.prepare("SELECT id FROM questions")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids
        };
        let candidates: Vec<&String> = ids.iter().filter(|id| !exclude.contains(*id)).collect();
        match candidates.choose(&mut rand::thread_rng()) {
            Some(id) => self.get(id),
            None => Ok(None),
        }
    }
}
