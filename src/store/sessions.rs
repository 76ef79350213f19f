//! Exam and timed-practice sessions.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::Database;
use crate::error::{QuizError, Result};
use crate::model::{Session, SessionId, SessionMode, UserId};

pub trait SessionStore: Send + Sync {
    fn create(
        &self,
        user: UserId,
        mode: SessionMode,
        question_ids: &[String],
        started_at: DateTime<Utc>,
        duration_secs: Option<i64>,
    ) -> Result<Session>;

    fn get(&self, id: SessionId) -> Result<Option<Session>>;

    /// Mark the session submitted with `score`. Returns `false` if it was
    /// already completed or does not exist.
    fn complete(&self, id: SessionId, score: f64) -> Result<bool>;

    /// Sessions of `user`, newest first.
    fn list(&self, user: UserId) -> Result<Vec<Session>>;
}

#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    db: Database,
}

impl SqliteSessionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

const SELECT_SESSION: &str = "SELECT id, user_id, mode, question_ids, started_at, duration_secs,
        completed, score FROM exam_sessions";

struct SessionRow {
    id: SessionId,
    user_id: UserId,
    mode: String,
    question_ids: String,
    started_at: DateTime<Utc>,
    duration_secs: Option<i64>,
    completed: bool,
    score: Option<f64>,
}

impl SessionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            mode: row.get(2)?,
            question_ids: row.get(3)?,
            started_at: row.get(4)?,
            duration_secs: row.get(5)?,
            completed: row.get::<_, i64>(6)? != 0,
            score: row.get(7)?,
        })
    }

    fn into_session(self) -> Result<Session> {
        let corrupt = |reason: String| QuizError::Corrupt {
            id: format!("session {}", self.id),
            reason,
        };
        let mode = self.mode.parse::<SessionMode>().map_err(corrupt)?;
        let question_ids: Vec<String> = serde_json::from_str(&self.question_ids)
            .map_err(|e| corrupt(format!("question ids are not a JSON list: {e}")))?;
        Ok(Session {
            id: self.id,
            user_id: self.user_id,
            mode,
            question_ids,
            started_at: self.started_at,
            duration_secs: self.duration_secs,
            completed: self.completed,
            score: self.score,
        })
    }
}

impl SessionStore for SqliteSessionStore {
    fn create(
        &self,
        user: UserId,
        mode: SessionMode,
        question_ids: &[String],
        started_at: DateTime<Utc>,
        duration_secs: Option<i64>,
    ) -> Result<Session> {
        let ids_json = serde_json::to_string(question_ids)
            .map_err(|e| QuizError::InvalidArgument(format!("unencodable question ids: {e}")))?;
        let conn = self.db.connect()?;
        conn.execute(
            "INSERT INTO exam_sessions (user_id, mode, question_ids, started_at, duration_secs)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user, mode.as_str(), ids_json, started_at, duration_secs],
        )?;
        Ok(Session {
            id: conn.last_insert_rowid(),
            user_id: user,
            mode,
            question_ids: question_ids.to_vec(),
            started_at,
            duration_secs,
            completed: false,
            score: None,
        })
    }

    fn get(&self, id: SessionId) -> Result<Option<Session>> {
        let conn = self.db.connect()?;
        let row = conn
            .query_row(
                &format!("{SELECT_SESSION} WHERE id = ?1"),
                params![id],
                SessionRow::from_row,
            )
            .optional()?;
        row.map(SessionRow::into_session).transpose()
    }

    fn complete(&self, id: SessionId, score: f64) -> Result<bool> {
        let conn = self.db.connect()?;
        let updated = conn.execute(
            "UPDATE exam_sessions SET completed = 1, score = ?1 WHERE id = ?2 AND completed = 0",
            params![score, id],
        )?;
        Ok(updated > 0)
    }

    fn list(&self, user: UserId) -> Result<Vec<Session>> {
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_SESSION} WHERE user_id = ?1 ORDER BY started_at DESC, id DESC"
        ))?;
        let rows = stmt
            .query_map(params![user], SessionRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(SessionRow::into_session).collect()
    }
}
