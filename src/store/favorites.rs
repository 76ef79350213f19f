//! Per-user bookmarked questions.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::Database;
use crate::error::Result;
use crate::model::{Favorite, UserId};

pub trait FavoriteStore: Send + Sync {
    fn is_favorite(&self, user: UserId, question_id: &str) -> Result<bool>;

    /// Returns `false` if the question was already a favorite.
    fn add(&self, user: UserId, question_id: &str, tag: &str) -> Result<bool>;

    /// Returns `false` if there was nothing to remove.
    fn remove(&self, user: UserId, question_id: &str) -> Result<bool>;

    /// Returns `false` if the question is not a favorite.
    fn set_tag(&self, user: UserId, question_id: &str, tag: &str) -> Result<bool>;

    fn get(&self, user: UserId, question_id: &str) -> Result<Option<Favorite>>;

    /// Newest first.
    fn list(&self, user: UserId) -> Result<Vec<Favorite>>;
}

#[derive(Debug, Clone)]
pub struct SqliteFavoriteStore {
    db: Database,
}

impl SqliteFavoriteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl FavoriteStore for SqliteFavoriteStore {
    fn is_favorite(&self, user: UserId, question_id: &str) -> Result<bool> {
        Ok(self.get(user, question_id)?.is_some())
    }

    fn add(&self, user: UserId, question_id: &str, tag: &str) -> Result<bool> {
        let conn = self.db.connect()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO favorites (user_id, question_id, tag, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user, question_id, tag, Utc::now()],
        )?;
        Ok(inserted > 0)
    }

    fn remove(&self, user: UserId, question_id: &str) -> Result<bool> {
        let conn = self.db.connect()?;
        let removed = conn.execute(
            "DELETE FROM favorites WHERE user_id = ?1 AND question_id = ?2",
            params![user, question_id],
        )?;
        Ok(removed > 0)
    }

    fn set_tag(&self, user: UserId, question_id: &str, tag: &str) -> Result<bool> {
        let conn = self.db.connect()?;
        let updated = conn.execute(
            "UPDATE favorites SET tag = ?1 WHERE user_id = ?2 AND question_id = ?3",
            params![tag, user, question_id],
        )?;
        Ok(updated > 0)
    }

    fn get(&self, user: UserId, question_id: &str) -> Result<Option<Favorite>> {
        let conn = self.db.connect()?;
        let favorite = conn
            .query_row(
                "SELECT tag, created_at FROM favorites WHERE user_id = ?1 AND question_id = ?2",
                params![user, question_id],
                |row| {
                    Ok(Favorite {
                        user_id: user,
                        question_id: question_id.to_string(),
                        tag: row.get(0)?,
                        created_at: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(favorite)
    }

    fn list(&self, user: UserId) -> Result<Vec<Favorite>> {
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(
            "SELECT question_id, tag, created_at FROM favorites
             WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let favorites = stmt
            .query_map(params![user], |row| {
                Ok(Favorite {
                    user_id: user,
                    question_id: row.get(0)?,
                    tag: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(favorites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_db;

    #[test]
    fn add_is_idempotent_and_remove_reports_absence() {
        let (_dir, db) = temp_db();
        let store = SqliteFavoriteStore::new(db);

        assert!(store.add(1, "3", "review").unwrap());
        assert!(!store.add(1, "3", "other").unwrap());
        assert_eq!(store.get(1, "3").unwrap().unwrap().tag, "review");
        assert!(!store.is_favorite(2, "3").unwrap());

        assert!(store.remove(1, "3").unwrap());
        assert!(!store.remove(1, "3").unwrap());
        assert!(!store.is_favorite(1, "3").unwrap());
    }

    #[test]
    fn set_tag_and_list() {
        let (_dir, db) = temp_db();
        let store = SqliteFavoriteStore::new(db);
        store.add(1, "1", "").unwrap();
        store.add(1, "2", "").unwrap();

        assert!(store.set_tag(1, "1", "exam").unwrap());
        assert!(!store.set_tag(1, "9", "exam").unwrap());

        let favorites = store.list(1).unwrap();
        assert_eq!(favorites.len(), 2);
        assert_eq!(favorites[0].question_id, "2");
        assert_eq!(favorites[1].tag, "exam");
    }
}
