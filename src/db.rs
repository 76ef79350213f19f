//! SQLite database handle and schema for the quiz bank.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, Result as SqliteResult};

/// Location of the quiz database. Every store operation opens its own
/// connection, so the handle is cheap to clone and share between threads.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Open (creating if needed) the database at `path` and make sure the
    /// schema exists.
    pub fn open(path: impl AsRef<Path>) -> SqliteResult<Self> {
        let db = Self {
            path: path.as_ref().to_path_buf(),
        };
        init_database(&db.connect()?)?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connect(&self) -> SqliteResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }
}

/// Create the tables if they don't exist yet.
pub fn init_database(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS questions (
            id TEXT PRIMARY KEY,
            stem TEXT NOT NULL,
            answer TEXT NOT NULL,
            difficulty TEXT,
            qtype TEXT,
            category TEXT,
            options TEXT,
            created_at TEXT
        );

        CREATE TABLE IF NOT EXISTS history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            question_id TEXT NOT NULL,
            user_answer TEXT NOT NULL,
            correct INTEGER NOT NULL,
            timestamp TEXT NOT NULL,
            time_spent_ms INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_history_user ON history(user_id, timestamp);

        CREATE TABLE IF NOT EXISTS favorites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            question_id TEXT NOT NULL,
            tag TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            UNIQUE(user_id, question_id)
        );

        CREATE TABLE IF NOT EXISTS exam_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            mode TEXT NOT NULL,
            question_ids TEXT NOT NULL,
            started_at TEXT NOT NULL,
            duration_secs INTEGER,
            completed INTEGER NOT NULL DEFAULT 0,
            score REAL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_user ON exam_sessions(user_id, started_at);",
    )
}
