//! Append-only answer history.

use rusqlite::{params, Connection};

use crate::db::Database;
use crate::error::Result;
use crate::model::{AnswerRecord, UserId};

pub trait HistoryStore: Send + Sync {
    fn append(&self, record: &AnswerRecord) -> Result<()>;

    /// Append a batch of records; either all of them are written or none.
    fn append_all(&self, records: &[AnswerRecord]) -> Result<()>;

    /// All records of `user`, oldest first. Records with equal timestamps
    /// keep their insertion order.
    fn records_for(&self, user: UserId) -> Result<Vec<AnswerRecord>>;

    /// Remove every record of `user`. Returns how many were removed.
    fn clear_user(&self, user: UserId) -> Result<usize>;
}

#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    db: Database,
}

impl SqliteHistoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn insert_record(conn: &Connection, record: &AnswerRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO history
             (user_id, question_id, user_answer, correct, timestamp, time_spent_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.user_id,
            record.question_id,
            record.submitted_answer,
            record.is_correct as i32,
            record.timestamp,
            record.time_spent_ms,
        ],
    )?;
    Ok(())
}

impl HistoryStore for SqliteHistoryStore {
    fn append(&self, record: &AnswerRecord) -> Result<()> {
        let conn = self.db.connect()?;
        insert_record(&conn, record)
    }

    fn append_all(&self, records: &[AnswerRecord]) -> Result<()> {
        let mut conn = self.db.connect()?;
        let tx = conn.transaction()?;
        for record in records {
            insert_record(&tx, record)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn records_for(&self, user: UserId) -> Result<Vec<AnswerRecord>> {
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(
            "SELECT question_id, user_answer, correct, timestamp, time_spent_ms
             FROM history WHERE user_id = ?1 ORDER BY timestamp ASC, id ASC",
        )?;
        let records = stmt
            .query_map(params![user], |row| {
                Ok(AnswerRecord {
                    question_id: row.get(0)?,
                    user_id: user,
                    submitted_answer: row.get(1)?,
                    is_correct: row.get::<_, i64>(2)? != 0,
                    timestamp: row.get(3)?,
                    time_spent_ms: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn clear_user(&self, user: UserId) -> Result<usize> {
        let conn = self.db.connect()?;
        Ok(conn.execute("DELETE FROM history WHERE user_id = ?1", params![user])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, record, temp_db};

    #[test]
    fn records_come_back_oldest_first_per_user() {
        let (_dir, db) = temp_db();
        let store = SqliteHistoryStore::new(db);
        store.append(&record(1, "2", false, at(10))).unwrap();
        store.append(&record(1, "1", true, at(5))).unwrap();
        store.append(&record(2, "1", true, at(1))).unwrap();

        let records = store.records_for(1).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.question_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert!(records[0].is_correct);
        assert_eq!(records[1].timestamp, at(10));
        assert!(store.records_for(3).unwrap().is_empty());
    }

    #[test]
    fn equal_timestamps_keep_insertion_order() {
        let (_dir, db) = temp_db();
        let store = SqliteHistoryStore::new(db);
        store.append(&record(1, "9", false, at(3))).unwrap();
        store.append(&record(1, "9", true, at(3))).unwrap();

        let records = store.records_for(1).unwrap();
        assert!(!records[0].is_correct);
        assert!(records[1].is_correct);
    }

    #[test]
    fn clear_user_only_touches_that_user() {
        let (_dir, db) = temp_db();
        let store = SqliteHistoryStore::new(db);
        store.append(&record(1, "1", true, at(1))).unwrap();
        store.append(&record(1, "2", true, at(2))).unwrap();
        store.append(&record(2, "1", true, at(1))).unwrap();

        assert_eq!(store.clear_user(1).unwrap(), 2);
        assert!(store.records_for(1).unwrap().is_empty());
        assert_eq!(store.records_for(2).unwrap().len(), 1);
    }

    #[test]
    fn append_all_writes_the_whole_batch() {
        let (_dir, db) = temp_db();
        let store = SqliteHistoryStore::new(db);
        store
            .append_all(&[record(1, "1", true, at(1)), record(1, "2", false, at(1))])
            .unwrap();
        store.append_all(&[]).unwrap();

        let records = store.records_for(1).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].question_id, "2");
    }
}
