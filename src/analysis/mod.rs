//! Read-side analyzers over the answer history.

mod progress;
mod statistics;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{QuizError, Result};
use crate::model::{ProgressSummary, UserId};
use crate::store::{HistoryStore, QuestionStore};

pub use progress::{ProgressTracker, MAX_TREND_BUCKETS};
pub use statistics::{
    BankOverview, Breakdown, StatisticsAnalyzer, StatisticsReport, WeakArea, WeakRule,
    WorstQuestion,
};

pub(crate) use progress::{wrong_counts, wrong_question_ids};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    Progress,
    Statistics,
}

impl AnalyzerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzerKind::Progress => "progress",
            AnalyzerKind::Statistics => "statistics",
        }
    }
}

impl fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalyzerKind {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "progress" => Ok(AnalyzerKind::Progress),
            "statistics" | "stats" => Ok(AnalyzerKind::Statistics),
            other => Err(QuizError::InvalidArgument(format!(
                "unknown analyzer kind: {other}"
            ))),
        }
    }
}

/// Result of [`Analyzer::analyze`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum Analysis {
    Progress(ProgressSummary),
    Statistics(StatisticsReport),
}

/// Something that summarises one user's history.
pub trait Analyzer {
    fn kind(&self) -> AnalyzerKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn analyze(&self, user: UserId) -> Result<Analysis>;
}

/// Build the analyzer for `kind` over the given stores.
pub fn create_analyzer<'a>(
    kind: AnalyzerKind,
    questions: &'a dyn QuestionStore,
    history: &'a dyn HistoryStore,
    rule: WeakRule,
) -> Box<dyn Analyzer + 'a> {
    match kind {
        AnalyzerKind::Progress => Box::new(ProgressTracker::new(questions, history)),
        AnalyzerKind::Statistics => Box::new(StatisticsAnalyzer::new(questions, history, rule)),
    }
}
