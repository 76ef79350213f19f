//! Python bindings. Summaries and grades cross the boundary as classes,
//! everything else as JSON strings.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, TimeDelta};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use serde::Serialize;

use crate::analysis::AnalyzerKind;
use crate::config::{load_config_from, QuizConfig};
use crate::db::Database;
use crate::error::QuizError;
use crate::grading::{normalize_labels, Grade};
use crate::model::{ProgressSummary, Question, SessionAnswer, SessionResult};
use crate::store::{
    SqliteFavoriteStore, SqliteHistoryStore, SqliteQuestionStore, SqliteSessionStore,
};
use crate::system::{parse_count, QuizSystem};

impl From<QuizError> for PyErr {
    fn from(err: QuizError) -> Self {
        match err {
            QuizError::InvalidArgument(_) | QuizError::InvalidConfig(_) => {
                PyValueError::new_err(err.to_string())
            }
            other => PyRuntimeError::new_err(other.to_string()),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

fn opt_json<T: Serialize>(value: Option<T>) -> PyResult<Option<String>> {
    value.map(|v| to_json(&v)).transpose()
}

fn parse_questions(questions_json: &str) -> PyResult<Vec<Question>> {
    serde_json::from_str(questions_json)
        .map_err(|e| PyValueError::new_err(format!("invalid questions: {e}")))
}

/// Progress summary of a user
#[pyclass(name = "Progress")]
#[derive(Debug, Clone)]
pub struct PyProgress {
    #[pyo3(get)]
    pub total_questions: usize,
    #[pyo3(get)]
    pub answered_count: usize,
    #[pyo3(get)]
    pub correct_count: usize,
    #[pyo3(get)]
    pub wrong_count: usize,
    #[pyo3(get)]
    pub accuracy: f64,
    #[pyo3(get)]
    pub completion_rate: f64,
}

#[pymethods]
impl PyProgress {
    fn __repr__(&self) -> String {
        format!(
            "Progress(answered={}/{}, correct={}, accuracy={:.1}%)",
            self.answered_count,
            self.total_questions,
            self.correct_count,
            self.accuracy * 100.0
        )
    }
}

impl From<ProgressSummary> for PyProgress {
    fn from(s: ProgressSummary) -> Self {
        Self {
            total_questions: s.total_questions,
            answered_count: s.answered_count,
            correct_count: s.correct_count,
            wrong_count: s.wrong_count,
            accuracy: s.accuracy,
            completion_rate: s.completion_rate,
        }
    }
}

/// Result of grading one answer
#[pyclass(name = "Grade")]
#[derive(Debug, Clone)]
pub struct PyGrade {
    #[pyo3(get)]
    pub is_correct: bool,
    #[pyo3(get)]
    pub normalized_answer: String,
    #[pyo3(get)]
    pub similarity: f64,
}

#[pymethods]
impl PyGrade {
    fn __repr__(&self) -> String {
        format!(
            "Grade(is_correct={}, answer='{}', similarity={:.2})",
            self.is_correct, self.normalized_answer, self.similarity
        )
    }
}

impl From<Grade> for PyGrade {
    fn from(g: Grade) -> Self {
        Self {
            is_correct: g.is_correct,
            normalized_answer: g.normalized_answer,
            similarity: g.similarity,
        }
    }
}

#[pyclass(name = "SessionAnswer")]
#[derive(Debug, Clone)]
pub struct PySessionAnswer {
    #[pyo3(get)]
    pub question_id: String,
    #[pyo3(get)]
    pub stem: String,
    #[pyo3(get)]
    pub submitted_answer: String,
    #[pyo3(get)]
    pub correct_answer: String,
    #[pyo3(get)]
    pub is_correct: bool,
}

#[pymethods]
impl PySessionAnswer {
    fn __repr__(&self) -> String {
        format!(
            "SessionAnswer(question_id='{}', answer='{}', is_correct={})",
            self.question_id, self.submitted_answer, self.is_correct
        )
    }
}

impl From<SessionAnswer> for PySessionAnswer {
    fn from(a: SessionAnswer) -> Self {
        Self {
            question_id: a.question_id,
            stem: a.stem,
            submitted_answer: a.submitted_answer,
            correct_answer: a.correct_answer,
            is_correct: a.is_correct,
        }
    }
}

/// Graded exam or timed session
#[pyclass(name = "SessionResult")]
#[derive(Debug, Clone)]
pub struct PySessionResult {
    #[pyo3(get)]
    pub session_id: i64,
    #[pyo3(get)]
    pub mode: String,
    #[pyo3(get)]
    pub correct_count: usize,
    #[pyo3(get)]
    pub total: usize,
    #[pyo3(get)]
    pub score: f64,
    #[pyo3(get)]
    pub expired: bool,
    #[pyo3(get)]
    pub results: Vec<PySessionAnswer>,
}

#[pymethods]
impl PySessionResult {
    fn __repr__(&self) -> String {
        format!(
            "SessionResult(id={}, mode='{}', correct={}/{}, score={:.1}, expired={})",
            self.session_id, self.mode, self.correct_count, self.total, self.score, self.expired
        )
    }
}

impl From<SessionResult> for PySessionResult {
    fn from(r: SessionResult) -> Self {
        Self {
            session_id: r.session_id,
            mode: r.mode.to_string(),
            correct_count: r.correct_count,
            total: r.total,
            score: r.score,
            expired: r.expired,
            results: r.results.into_iter().map(PySessionAnswer::from).collect(),
        }
    }
}

#[pyclass(name = "QuizCore")]
pub struct PyQuizCore {
    system: QuizSystem,
}

#[pymethods]
impl PyQuizCore {
    #[new]
    #[pyo3(signature = (db_path, config_path=None))]
    fn new(db_path: &str, config_path: Option<&str>) -> PyResult<Self> {
        let config = match config_path {
            Some(path) => load_config_from(Path::new(path))?,
            None => QuizConfig::default(),
        };
        let db = Database::open(db_path).map_err(QuizError::from)?;
        let system = QuizSystem::new(
            config,
            Arc::new(SqliteQuestionStore::new(db.clone())),
            Arc::new(SqliteHistoryStore::new(db.clone())),
            Arc::new(SqliteFavoriteStore::new(db.clone())),
            Arc::new(SqliteSessionStore::new(db)),
        )?;
        Ok(Self { system })
    }

    /// Insert or replace questions given as a JSON array.
    fn import_questions(&self, questions_json: &str) -> PyResult<usize> {
        Ok(self.system.import_questions(&parse_questions(questions_json)?)?)
    }

    /// Replace the whole bank with the questions of a JSON array.
    fn reload_questions(&self, questions_json: &str) -> PyResult<usize> {
        Ok(self.system.reimport_questions(&parse_questions(questions_json)?)?)
    }

    fn question_count(&self) -> PyResult<usize> {
        Ok(self.system.question_count()?)
    }

    fn get_question(&self, question_id: &str) -> PyResult<Option<String>> {
        opt_json(self.system.get_question(question_id)?)
    }

    fn search(&self, text: &str) -> PyResult<String> {
        to_json(&self.system.search(text)?)
    }

    fn categories(&self) -> PyResult<String> {
        to_json(&self.system.categories()?)
    }

    fn random_question(&self, user_id: i64) -> PyResult<Option<String>> {
        opt_json(self.system.random_question(user_id)?)
    }

    #[pyo3(signature = (user_id, after=None))]
    fn next_in_sequence(&self, user_id: i64, after: Option<&str>) -> PyResult<Option<String>> {
        opt_json(self.system.next_in_sequence(user_id, after)?)
    }

    fn check_answer(&self, question_id: &str, answer: &str) -> PyResult<Option<PyGrade>> {
        Ok(self.system.check_answer(question_id, answer)?.map(PyGrade::from))
    }

    #[pyo3(signature = (user_id, question_id, answer, time_spent_ms=None))]
    fn submit_answer(
        &self,
        user_id: i64,
        question_id: &str,
        answer: &str,
        time_spent_ms: Option<i64>,
    ) -> PyResult<Option<String>> {
        opt_json(
            self.system
                .submit_answer(user_id, question_id, answer, time_spent_ms)?,
        )
    }

    fn reset_history(&self, user_id: i64) -> PyResult<usize> {
        Ok(self.system.reset_history(user_id)?)
    }

    #[pyo3(signature = (user_id, question_id, tag=""))]
    fn toggle_favorite(
        &self,
        user_id: i64,
        question_id: &str,
        tag: &str,
    ) -> PyResult<Option<bool>> {
        Ok(self.system.toggle_favorite(user_id, question_id, tag)?)
    }

    fn is_favorite(&self, user_id: i64, question_id: &str) -> PyResult<bool> {
        Ok(self.system.is_favorite(user_id, question_id)?)
    }

    fn favorites(&self, user_id: i64) -> PyResult<String> {
        to_json(&self.system.favorites(user_id)?)
    }

    fn update_favorite_tag(&self, user_id: i64, question_id: &str, tag: &str) -> PyResult<bool> {
        Ok(self.system.update_favorite_tag(user_id, question_id, tag)?)
    }

    #[pyo3(signature = (user_id, count=10))]
    fn start_exam(&self, user_id: i64, count: i64) -> PyResult<String> {
        to_json(&self.system.start_exam(user_id, parse_count(count)?)?)
    }

    #[pyo3(signature = (user_id, count=10, duration_secs=600))]
    fn start_timed(&self, user_id: i64, count: i64, duration_secs: i64) -> PyResult<String> {
        let duration = TimeDelta::try_seconds(duration_secs).ok_or_else(|| {
            PyValueError::new_err(format!("duration out of range: {duration_secs}"))
        })?;
        to_json(&self.system.start_timed(user_id, parse_count(count)?, duration)?)
    }

    fn get_session(&self, user_id: i64, session_id: i64) -> PyResult<Option<String>> {
        opt_json(self.system.get_session(user_id, session_id)?)
    }

    fn sessions(&self, user_id: i64) -> PyResult<String> {
        to_json(&self.system.sessions(user_id)?)
    }

    fn session_questions(&self, user_id: i64, session_id: i64) -> PyResult<Option<String>> {
        opt_json(self.system.session_questions(user_id, session_id)?)
    }

    /// `answers_json` maps question id to the submitted answer.
    fn submit_session(
        &self,
        user_id: i64,
        session_id: i64,
        answers_json: &str,
    ) -> PyResult<Option<PySessionResult>> {
        let answers: HashMap<String, String> = serde_json::from_str(answers_json)
            .map_err(|e| PyValueError::new_err(format!("invalid answers: {e}")))?;
        Ok(self
            .system
            .submit_session(user_id, session_id, &answers)?
            .map(PySessionResult::from))
    }

    #[pyo3(signature = (user_id, count=10))]
    fn get_recommendations(&self, user_id: i64, count: i64) -> PyResult<String> {
        to_json(&self.system.get_recommendations(user_id, parse_count(count)?)?)
    }

    #[pyo3(signature = (user_id, count=10))]
    fn get_wrong_recommendations(&self, user_id: i64, count: i64) -> PyResult<String> {
        to_json(&self.system.get_wrong_recommendations(user_id, parse_count(count)?)?)
    }

    fn get_progress(&self, user_id: i64) -> PyResult<PyProgress> {
        Ok(self.system.get_progress(user_id)?.into())
    }

    fn get_wrong_questions(&self, user_id: i64) -> PyResult<String> {
        to_json(&self.system.get_wrong_questions(user_id)?)
    }

    #[pyo3(signature = (user_id, window_secs=86400))]
    fn get_trend(&self, user_id: i64, window_secs: i64) -> PyResult<String> {
        let window: Duration = TimeDelta::try_seconds(window_secs).ok_or_else(|| {
            PyValueError::new_err(format!("window out of range: {window_secs}"))
        })?;
        to_json(&self.system.get_trend(user_id, window)?)
    }

    #[pyo3(signature = (user_id, days=7))]
    fn get_recent_trend(&self, user_id: i64, days: u32) -> PyResult<String> {
        to_json(&self.system.get_recent_trend(user_id, days)?)
    }

    fn get_difficulty_stats(&self, user_id: i64) -> PyResult<String> {
        to_json(&self.system.get_difficulty_stats(user_id)?)
    }

    fn get_category_stats(&self, user_id: i64) -> PyResult<String> {
        to_json(&self.system.get_category_stats(user_id)?)
    }

    fn get_statistics_report(&self, user_id: i64) -> PyResult<String> {
        to_json(&self.system.get_statistics_report(user_id)?)
    }

    fn get_bank_overview(&self) -> PyResult<String> {
        to_json(&self.system.get_bank_overview()?)
    }

    fn analyze(&self, kind: &str, user_id: i64) -> PyResult<String> {
        let kind: AnalyzerKind = kind.parse()?;
        to_json(&self.system.analyze(kind, user_id)?)
    }

    fn get_cache_stats(&self) -> PyResult<String> {
        to_json(&self.system.get_cache_stats())
    }
}

#[pyfunction]
#[pyo3(name = "normalize_answer")]
pub fn py_normalize_answer(answer: &str) -> String {
    normalize_labels(answer)
}

#[pymodule]
fn quizbank_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(py_normalize_answer, m)?)?;
    m.add_class::<PyQuizCore>()?;
    m.add_class::<PyProgress>()?;
    m.add_class::<PyGrade>()?;
    m.add_class::<PySessionResult>()?;
    m.add_class::<PySessionAnswer>()?;
    Ok(())
}
