//! Per-user progress: counts, outstanding mistakes and accuracy over time.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::analysis::{Analysis, Analyzer, AnalyzerKind};
use crate::error::{QuizError, Result};
use crate::model::{ratio, AnswerRecord, ProgressSummary, Question, Tally, TrendPoint, UserId};
use crate::store::{HistoryStore, QuestionStore};

/// Upper bound on the buckets a single trend query may produce.
pub const MAX_TREND_BUCKETS: i64 = 10_000;

pub struct ProgressTracker<'a> {
    questions: &'a dyn QuestionStore,
    history: &'a dyn HistoryStore,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(questions: &'a dyn QuestionStore, history: &'a dyn HistoryStore) -> Self {
        Self { questions, history }
    }

    pub fn summary(&self, user: UserId) -> Result<ProgressSummary> {
        let records = self.history.records_for(user)?;
        Ok(summarize(self.questions.count()?, &records))
    }

    /// Questions whose latest answer is wrong, in order of first appearance
    /// in the user's history. Ids missing from the bank are skipped.
    pub fn wrong_questions(&self, user: UserId) -> Result<Vec<Question>> {
        let records = self.history.records_for(user)?;
        let mut questions = Vec::new();
        for id in wrong_question_ids(&records) {
            match self.questions.get(&id)? {
                Some(q) => questions.push(q),
                None => {
                    tracing::debug!(question_id = %id, "wrong answer refers to a missing question")
                }
            }
        }
        Ok(questions)
    }

    /// Number of wrong records per question id.
    pub fn wrong_counts(&self, user: UserId) -> Result<HashMap<String, u32>> {
        let records = self.history.records_for(user)?;
        Ok(wrong_counts(&records))
    }

    /// Accuracy per `window`-wide bucket from the first to the last record.
    /// Buckets are aligned to multiples of `window` since the Unix epoch.
    ///
    /// Every bucket in between is reported, idle ones included, so the span
    /// of the history divided by `window` must stay within
    /// [`MAX_TREND_BUCKETS`]: a one-minute window over a month of answers is
    /// rejected with [`QuizError::InvalidArgument`]. Pick a window of at
    /// least `span / MAX_TREND_BUCKETS`.
    pub fn trend(&self, user: UserId, window: Duration) -> Result<Vec<TrendPoint>> {
        let width = window_millis(window)?;
        let records = self.history.records_for(user)?;
        let (Some(first), Some(last)) = (records.first(), records.last()) else {
            return Ok(Vec::new());
        };
        let start = align_down(first.timestamp, width)?;
        let buckets = (last.timestamp.timestamp_millis() - start.timestamp_millis()) / width + 1;
        bucketize(&records, start, width, buckets)
    }

    /// Accuracy per bucket over `[from, to)`, every bucket reported even
    /// when the user was idle.
    pub fn trend_between(
        &self,
        user: UserId,
        window: Duration,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TrendPoint>> {
        let width = window_millis(window)?;
        if to < from {
            return Err(QuizError::InvalidArgument(format!(
                "trend range ends ({to}) before it starts ({from})"
            )));
        }
        let span = to.timestamp_millis() - from.timestamp_millis();
        let buckets = span / width + i64::from(span % width != 0);
        let records = self.history.records_for(user)?;
        bucketize(&records, from, width, buckets)
    }
}

impl Analyzer for ProgressTracker<'_> {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Progress
    }

    fn analyze(&self, user: UserId) -> Result<Analysis> {
        Ok(Analysis::Progress(self.summary(user)?))
    }
}

fn summarize(total_questions: usize, records: &[AnswerRecord]) -> ProgressSummary {
    let mut overall = Tally::default();
    let mut answered = std::collections::HashSet::new();
    for record in records {
        overall.record(record.is_correct);
        answered.insert(record.question_id.as_str());
    }
    ProgressSummary {
        total_questions,
        answered_count: answered.len(),
        correct_count: overall.correct,
        wrong_count: overall.total - overall.correct,
        accuracy: overall.accuracy(),
        completion_rate: ratio(answered.len(), total_questions),
    }
}

/// Ids whose most recent record is wrong, in order of first appearance.
/// `records` must be oldest first.
pub(crate) fn wrong_question_ids(records: &[AnswerRecord]) -> Vec<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut latest: HashMap<&str, bool> = HashMap::new();
    for record in records {
        let id = record.question_id.as_str();
        if latest.insert(id, record.is_correct).is_none() {
            order.push(id);
        }
    }
    order
        .into_iter()
        .filter(|id| latest.get(id) == Some(&false))
        .map(str::to_string)
        .collect()
}

pub(crate) fn wrong_counts(records: &[AnswerRecord]) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for record in records.iter().filter(|r| !r.is_correct) {
        *counts.entry(record.question_id.clone()).or_insert(0) += 1;
    }
    counts
}

fn window_millis(window: Duration) -> Result<i64> {
    let width = window.num_milliseconds();
    if width <= 0 {
        return Err(QuizError::InvalidArgument(format!(
            "trend window must be positive, got {window}"
        )));
    }
    Ok(width)
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| QuizError::InvalidArgument(format!("timestamp out of range: {ms}ms")))
}

fn align_down(ts: DateTime<Utc>, width: i64) -> Result<DateTime<Utc>> {
    let ms = ts.timestamp_millis();
    from_millis(ms - ms.rem_euclid(width))
}

fn bucketize(
    records: &[AnswerRecord],
    start: DateTime<Utc>,
    width: i64,
    buckets: i64,
) -> Result<Vec<TrendPoint>> {
    if buckets > MAX_TREND_BUCKETS {
        return Err(QuizError::InvalidArgument(format!(
            "trend would produce {buckets} buckets, limit is {MAX_TREND_BUCKETS}"
        )));
    }
    let start_ms = start.timestamp_millis();
    let mut tallies = vec![Tally::default(); buckets.max(0) as usize];
    for record in records {
        let offset = record.timestamp.timestamp_millis() - start_ms;
        if offset < 0 {
            continue;
        }
        if let Some(tally) = tallies.get_mut((offset / width) as usize) {
            tally.record(record.is_correct);
        }
    }

    tallies
        .into_iter()
        .enumerate()
        .map(|(i, tally)| {
            Ok(TrendPoint {
                bucket_start: from_millis(start_ms + i as i64 * width)?,
                total: tally.total,
                correct: tally.correct,
                accuracy: (tally.total > 0).then(|| tally.accuracy()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Difficulty;
    use crate::test_support::{at, question, record, Fixture};

    #[test]
    fn zero_records_means_zero_accuracy() {
        let fx = Fixture::with_questions(&[question("1", "A", Difficulty::Easy)]);
        let summary = fx.progress().summary(42).unwrap();
        assert_eq!(summary.accuracy, 0.0);
        assert_eq!(summary.answered_count, 0);
        assert_eq!(summary.total_questions, 1);
    }

    #[test]
    fn answered_counts_distinct_questions_only() {
        let fx = Fixture::with_questions(&[
            question("1", "A", Difficulty::Easy),
            question("2", "A", Difficulty::Easy),
        ]);
        fx.append(record(1, "1", false, at(1)));
        fx.append(record(1, "1", true, at(2)));
        fx.append(record(1, "1", true, at(3)));
        fx.append(record(1, "2", false, at(4)));

        let summary = fx.progress().summary(1).unwrap();
        assert_eq!(summary.answered_count, 2);
        assert_eq!(summary.correct_count, 2);
        assert_eq!(summary.wrong_count, 2);
        assert_eq!(summary.accuracy, 0.5);
        assert_eq!(summary.completion_rate, 1.0);
    }

    #[test]
    fn question_answered_correctly_last_is_not_wrong() {
        let fx = Fixture::with_questions(&[
            question("1", "A", Difficulty::Easy),
            question("2", "A", Difficulty::Easy),
            question("3", "A", Difficulty::Easy),
        ]);
        fx.append(record(1, "3", false, at(1)));
        fx.append(record(1, "1", false, at(2)));
        fx.append(record(1, "1", true, at(3)));
        fx.append(record(1, "2", true, at(4)));
        fx.append(record(1, "2", false, at(5)));
        fx.append(record(1, "ghost", false, at(6)));

        let ids: Vec<String> = fx
            .progress()
            .wrong_questions(1)
            .unwrap()
            .into_iter()
            .map(|q| q.id)
            .collect();
        assert_eq!(ids, vec!["3", "2"]);

        let counts = fx.progress().wrong_counts(1).unwrap();
        assert_eq!(counts["1"], 1);
        assert_eq!(counts["ghost"], 1);
        assert!(!counts.contains_key("4"));
    }

    #[test]
    fn trend_reports_empty_buckets_as_none() {
        let fx = Fixture::with_questions(&[question("1", "A", Difficulty::Easy)]);
        // at() is aligned to a whole hour, so 60s buckets start there.
        fx.append(record(1, "1", true, at(5)));
        fx.append(record(1, "1", false, at(50)));
        fx.append(record(1, "1", false, at(130)));

        let trend = fx.progress().trend(1, Duration::seconds(60)).unwrap();
        assert_eq!(trend.len(), 3);
        assert_eq!(trend[0].bucket_start, at(0));
        assert_eq!(trend[0].total, 2);
        assert_eq!(trend[0].accuracy, Some(0.5));
        assert_eq!(trend[1].total, 0);
        assert_eq!(trend[1].accuracy, None);
        assert_eq!(trend[2].accuracy, Some(0.0));
    }

    #[test]
    fn trend_without_records_is_empty() {
        let fx = Fixture::with_questions(&[]);
        assert!(fx.progress().trend(1, Duration::days(1)).unwrap().is_empty());
    }

    #[test]
    fn trend_between_covers_the_whole_range() {
        let fx = Fixture::with_questions(&[question("1", "A", Difficulty::Easy)]);
        fx.append(record(1, "1", true, at(90)));
        fx.append(record(1, "1", true, at(500)));

        let trend = fx
            .progress()
            .trend_between(1, Duration::seconds(60), at(0), at(240))
            .unwrap();
        assert_eq!(trend.len(), 4);
        assert_eq!(trend[1].accuracy, Some(1.0));
        assert!(trend.iter().enumerate().all(|(i, p)| i == 1 || p.accuracy.is_none()));
    }

    #[test]
    fn invalid_windows_are_rejected() {
        let fx = Fixture::with_questions(&[]);
        let tracker = fx.progress();
        assert!(matches!(
            tracker.trend(1, Duration::zero()),
            Err(QuizError::InvalidArgument(_))
        ));
        assert!(tracker.trend(1, Duration::seconds(-5)).is_err());
        assert!(tracker
            .trend_between(1, Duration::seconds(1), at(10), at(0))
            .is_err());
        assert!(tracker
            .trend_between(1, Duration::milliseconds(1), at(0), at(86_400))
            .is_err());
    }

    #[test]
    fn widest_window_yields_a_single_bucket() {
        let fx = Fixture::with_questions(&[question("1", "A", Difficulty::Easy)]);
        fx.append(record(1, "1", true, at(30)));

        let trend = fx
            .progress()
            .trend_between(1, Duration::MAX, at(0), at(86_400))
            .unwrap();
        assert_eq!(trend.len(), 1);
        assert_eq!(trend[0].total, 1);
    }

    #[test]
    fn fine_window_over_long_history_hits_the_bucket_limit() {
        let fx = Fixture::with_questions(&[question("1", "A", Difficulty::Easy)]);
        fx.append(record(1, "1", true, at(0)));
        fx.append(record(1, "1", false, at(30 * 86_400)));

        let tracker = fx.progress();
        assert!(matches!(
            tracker.trend(1, Duration::minutes(1)),
            Err(QuizError::InvalidArgument(_))
        ));
        assert_eq!(tracker.trend(1, Duration::hours(1)).unwrap().len(), 721);
    }
}
