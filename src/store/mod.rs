//! Storage collaborators: the question bank, answer history, favorites and
//! exam sessions.

mod favorites;
mod history;
mod questions;
mod sessions;

pub use favorites::{FavoriteStore, SqliteFavoriteStore};
pub use history::{HistoryStore, SqliteHistoryStore};
pub use questions::{QuestionStore, SqliteQuestionStore};
pub use sessions::{SessionStore, SqliteSessionStore};
