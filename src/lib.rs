//! Quizbank Core - practice engine for a multiple-choice question bank
//!
//! Provides SQLite-backed question, history, favorite and session stores,
//! answer grading, progress and statistics analysis, weighted
//! recommendations and a TTL cache, all behind the [`QuizSystem`] facade.

pub mod analysis;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod grading;
pub mod model;
pub mod recommend;
pub mod store;
mod system;

#[cfg(feature = "python")]
mod python;

#[cfg(test)]
mod test_support;

pub use analysis::{Analysis, Analyzer, AnalyzerKind, StatisticsReport, WeakRule};
pub use cache::{CacheStats, TtlCache};
pub use config::{load_config_from, QuizConfig, RecommendConfig};
pub use error::{QuizError, Result};
pub use grading::Grade;
pub use model::{
    AnswerRecord, Difficulty, Favorite, ProgressSummary, Question, QuestionType, Recommendation,
    RecommendationReason, Session, SessionAnswer, SessionId, SessionMode, SessionResult, Tally,
    TrendPoint, UserId,
};
pub use system::{parse_count, QuizSystem};
