//! Records shared by the stores, analyzers and the facade.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;

/// Difficulty tier of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Unspecified,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Unspecified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Unspecified => "unspecified",
        }
    }

    /// Parse a stored difficulty label. Anything unrecognised, including an
    /// empty column, is `Unspecified`.
    pub fn parse_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "easy" | "易" => Difficulty::Easy,
            "medium" | "中" => Difficulty::Medium,
            "hard" | "very_hard" | "难" | "很难" => Difficulty::Hard,
            _ => Difficulty::Unspecified,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Difficulty::parse_label(s) {
            Difficulty::Unspecified if s.trim().to_lowercase() != "unspecified" => {
                Err(format!("unknown difficulty: {s}"))
            }
            d => Ok(d),
        }
    }
}

/// Answer format of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    FillBlank,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::FillBlank => "fill_blank",
        }
    }

    /// Parse a stored type label, inferring the type from the question shape
    /// when the label is missing or unknown.
    pub fn parse_label(label: &str, options: &BTreeMap<String, String>, answer: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "single_choice" | "单选题" => QuestionType::SingleChoice,
            "multiple_choice" | "多选题" => QuestionType::MultipleChoice,
            "true_false" | "判断题" => QuestionType::TrueFalse,
            "fill_blank" | "填空题" => QuestionType::FillBlank,
            _ if options.is_empty() => QuestionType::FillBlank,
            _ if answer.trim().chars().count() > 1 => QuestionType::MultipleChoice,
            _ => QuestionType::SingleChoice,
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A question of the bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub stem: String,
    /// Option label ("A".."E") to option text.
    pub options: BTreeMap<String, String>,
    /// One or more option labels concatenated, or the expected text for
    /// fill-in-the-blank questions.
    pub answer: String,
    pub difficulty: Difficulty,
    pub qtype: QuestionType,
    pub category: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Question {
    /// Category used for grouping; blank categories collapse into one bucket.
    pub fn category_key(&self) -> &str {
        let trimmed = self.category.trim();
        if trimmed.is_empty() {
            UNSPECIFIED_CATEGORY
        } else {
            trimmed
        }
    }
}

pub const UNSPECIFIED_CATEGORY: &str = "unspecified";

/// Order question ids the way the bank is browsed: integer ids numerically,
/// then any non-numeric ids lexicographically.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// One submitted answer. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: String,
    pub user_id: UserId,
    pub submitted_answer: String,
    pub is_correct: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub time_spent_ms: Option<i64>,
}

/// A bookmarked question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub user_id: UserId,
    pub question_id: String,
    pub tag: String,
    pub created_at: DateTime<Utc>,
}

/// Why a question was recommended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecommendationReason {
    /// Category or difficulty where the user's accuracy is low.
    WeakArea { category: String },
    /// Same category as the user's latest mistakes.
    RecentMistakes { category: String },
    /// Never answered.
    Unseen,
    /// Answered before, due for another look.
    Review,
    /// Last answered wrong.
    Mistake { wrong_count: u32 },
}

/// A scored suggestion of what to study next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub question: Question,
    pub score: f64,
    pub reason: RecommendationReason,
}

/// One user's progress through the bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub total_questions: usize,
    pub answered_count: usize,
    pub correct_count: usize,
    pub wrong_count: usize,
    /// Correct records over all records, 0 when there are none.
    pub accuracy: f64,
    /// Answered questions over bank size, 0 for an empty bank.
    pub completion_rate: f64,
}

/// Accuracy of one time bucket. `accuracy` is `None` when the bucket has no
/// records, so "no data" is distinguishable from "all wrong".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub bucket_start: DateTime<Utc>,
    pub total: usize,
    pub correct: usize,
    pub accuracy: Option<f64>,
}

/// Correct/total counters for one group of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    pub total: usize,
    pub correct: usize,
}

impl Tally {
    pub fn record(&mut self, is_correct: bool) {
        self.total += 1;
        if is_correct {
            self.correct += 1;
        }
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct, self.total)
    }
}

/// `num / den`, or 0 when `den` is 0.
pub fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Category with its question count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub name: String,
    pub question_count: usize,
}

pub type SessionId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Mock exam, no time limit.
    Exam,
    /// Practice round that must be submitted before its deadline.
    Timed,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Exam => "exam",
            SessionMode::Timed => "timed",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exam" => Ok(SessionMode::Exam),
            "timed" => Ok(SessionMode::Timed),
            other => Err(format!("unknown session mode: {other}")),
        }
    }
}

/// A fixed set of questions answered in one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub mode: SessionMode,
    pub question_ids: Vec<String>,
    pub started_at: DateTime<Utc>,
    /// Time limit in seconds; `None` for untimed sessions.
    pub duration_secs: Option<i64>,
    pub completed: bool,
    /// Percentage of correct answers, set on submission.
    pub score: Option<f64>,
}

impl Session {
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        let secs = self.duration_secs?;
        self.started_at
            .checked_add_signed(TimeDelta::try_seconds(secs)?)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Seconds left before the deadline, `None` for untimed sessions.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.deadline()
            .map(|deadline| (deadline - now).num_seconds().max(0))
    }
}

/// How one question of a session was answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAnswer {
    pub question_id: String,
    pub stem: String,
    pub submitted_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
}

/// Outcome of submitting a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub session_id: SessionId,
    pub mode: SessionMode,
    pub correct_count: usize,
    pub total: usize,
    /// `correct_count / total * 100`, 0 for an empty session.
    pub score: f64,
    /// Submitted after the deadline; every answer was discarded.
    pub expired: bool,
    pub results: Vec<SessionAnswer>,
}
