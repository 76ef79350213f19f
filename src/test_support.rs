//! Fixtures shared by the unit tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use crate::analysis::{ProgressTracker, StatisticsAnalyzer, WeakRule};
use crate::config::RecommendConfig;
use crate::db::Database;
use crate::model::{AnswerRecord, Difficulty, Question, QuestionType, UserId};
use crate::recommend::RecommendationEngine;
use crate::store::{HistoryStore, QuestionStore, SqliteHistoryStore, SqliteQuestionStore};

pub fn temp_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("quiz.db")).unwrap();
    (dir, db)
}

/// A single-choice question with options A-D and answer "A".
pub fn question(id: &str, category: &str, difficulty: Difficulty) -> Question {
    let options: BTreeMap<String, String> = ["A", "B", "C", "D"]
        .iter()
        .map(|label| (label.to_string(), format!("option {label}")))
        .collect();
    Question {
        id: id.to_string(),
        stem: format!("Question {id}"),
        options,
        answer: "A".to_string(),
        difficulty,
        qtype: QuestionType::SingleChoice,
        category: category.to_string(),
        created_at: None,
    }
}

/// `secs` seconds after a fixed, hour-aligned instant.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + Duration::seconds(secs)
}

pub fn record(
    user: UserId,
    question_id: &str,
    is_correct: bool,
    timestamp: DateTime<Utc>,
) -> AnswerRecord {
    AnswerRecord {
        question_id: question_id.to_string(),
        user_id: user,
        submitted_answer: if is_correct { "A" } else { "B" }.to_string(),
        is_correct,
        timestamp,
        time_spent_ms: None,
    }
}

pub struct Fixture {
    _dir: TempDir,
    pub questions: SqliteQuestionStore,
    pub history: SqliteHistoryStore,
}

impl Fixture {
    pub fn with_questions(questions: &[Question]) -> Self {
        let (dir, db) = temp_db();
        let store = SqliteQuestionStore::new(db.clone());
        store.import(questions).unwrap();
        Self {
            _dir: dir,
            questions: store,
            history: SqliteHistoryStore::new(db),
        }
    }

    pub fn append(&self, record: AnswerRecord) {
        self.history.append(&record).unwrap();
    }

    pub fn rule(&self) -> WeakRule {
        WeakRule {
            accuracy_below: 0.6,
            min_attempts: 3,
        }
    }

    pub fn progress(&self) -> ProgressTracker<'_> {
        ProgressTracker::new(&self.questions, &self.history)
    }

    pub fn statistics(&self) -> StatisticsAnalyzer<'_> {
        StatisticsAnalyzer::new(&self.questions, &self.history, self.rule())
    }

    pub fn engine(&self) -> RecommendationEngine<'_> {
        RecommendationEngine::new(
            &self.questions,
            &self.history,
            self.rule(),
            RecommendConfig::default(),
        )
    }
}
