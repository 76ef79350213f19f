//! The facade callers talk to: composes the stores, analyzers, recommender
//! and cache, and keeps cached aggregates consistent with writes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::analysis::{
    create_analyzer, Analysis, AnalyzerKind, BankOverview, ProgressTracker, StatisticsAnalyzer,
    StatisticsReport, WeakRule, MAX_TREND_BUCKETS,
};
use crate::cache::{CacheStats, TtlCache};
use crate::config::QuizConfig;
use crate::db::Database;
use crate::error::{QuizError, Result};
use crate::grading::{grade, Grade};
use crate::model::{
    compare_ids, ratio, AnswerRecord, CategoryCount, Difficulty, Favorite, ProgressSummary,
    Question, Recommendation, Session, SessionAnswer, SessionId, SessionMode, SessionResult,
    Tally, TrendPoint, UserId,
};
use crate::recommend::RecommendationEngine;
use crate::store::{
    FavoriteStore, HistoryStore, QuestionStore, SessionStore, SqliteFavoriteStore,
    SqliteHistoryStore, SqliteQuestionStore, SqliteSessionStore,
};

/// Users are spread over this many generation counters.
const GENERATION_STRIPES: usize = 64;

#[derive(Debug, Clone)]
enum CachedValue {
    Question(Question),
    ByDifficulty(BTreeMap<Difficulty, Tally>),
    ByCategory(BTreeMap<String, Tally>),
    Report(Box<StatisticsReport>),
}

/// Convert a caller-supplied count, rejecting negative values.
pub fn parse_count(count: i64) -> Result<usize> {
    usize::try_from(count).map_err(|_| {
        QuizError::InvalidArgument(format!("count must not be negative, got {count}"))
    })
}

/// Entry point of the quiz core.
///
/// Cached statistics keys carry a generation number taken from one of a
/// fixed set of counters, picked by user id. Every write bumps the user's
/// counter before dropping the user's entries, so a value computed
/// concurrently from pre-write data can never be read back after the write
/// returns. Users sharing a counter just recompute their stats once.
pub struct QuizSystem {
    config: QuizConfig,
    questions: Arc<dyn QuestionStore>,
    history: Arc<dyn HistoryStore>,
    favorites: Arc<dyn FavoriteStore>,
    sessions: Arc<dyn SessionStore>,
    cache: TtlCache<CachedValue>,
    user_generations: [AtomicU64; GENERATION_STRIPES],
    question_generation: AtomicU64,
}

impl QuizSystem {
    pub fn new(
        config: QuizConfig,
        questions: Arc<dyn QuestionStore>,
        history: Arc<dyn HistoryStore>,
        favorites: Arc<dyn FavoriteStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cache: TtlCache::new(config.cache_max_entries),
            config,
            questions,
            history,
            favorites,
            sessions,
            user_generations: std::array::from_fn(|_| AtomicU64::new(0)),
            question_generation: AtomicU64::new(0),
        })
    }

    /// Open the SQLite database at `path` and build a system over it.
    pub fn open(path: impl AsRef<Path>, config: QuizConfig) -> Result<Self> {
        config.validate()?;
        let db = Database::open(path.as_ref())?;
        tracing::info!(path = %db.path().display(), "opened quiz database");
        Self::new(
            config,
            Arc::new(SqliteQuestionStore::new(db.clone())),
            Arc::new(SqliteHistoryStore::new(db.clone())),
            Arc::new(SqliteFavoriteStore::new(db.clone())),
            Arc::new(SqliteSessionStore::new(db)),
        )
    }

    pub fn config(&self) -> &QuizConfig {
        &self.config
    }

    fn rule(&self) -> WeakRule {
        WeakRule {
            accuracy_below: self.config.weak_accuracy_threshold,
            min_attempts: self.config.weak_min_attempts,
        }
    }

    fn progress(&self) -> ProgressTracker<'_> {
        ProgressTracker::new(self.questions.as_ref(), self.history.as_ref())
    }

    fn statistics(&self) -> StatisticsAnalyzer<'_> {
        StatisticsAnalyzer::new(self.questions.as_ref(), self.history.as_ref(), self.rule())
    }

    fn engine(&self) -> RecommendationEngine<'_> {
        RecommendationEngine::new(
            self.questions.as_ref(),
            self.history.as_ref(),
            self.rule(),
            self.config.recommend.clone(),
        )
    }

    // ----- cache plumbing -----

    fn generation_slot(&self, user: UserId) -> &AtomicU64 {
        &self.user_generations[user.rem_euclid(GENERATION_STRIPES as i64) as usize]
    }

    fn stats_key(&self, user: UserId, name: &str) -> String {
        let generation = self.generation_slot(user).load(Ordering::SeqCst);
        format!("stats:{user}:{generation}:{name}")
    }

    /// Drop every cached aggregate of `user`. Called after each write.
    fn invalidate_user(&self, user: UserId) {
        self.generation_slot(user).fetch_add(1, Ordering::SeqCst);
        let removed = self.cache.delete_prefix(&format!("stats:{user}:"));
        tracing::debug!(user, removed, "invalidated cached statistics");
    }

    /// Drop cached questions, e.g. after a bulk re-import of the bank.
    pub fn invalidate_questions(&self) {
        self.question_generation.fetch_add(1, Ordering::SeqCst);
        let removed = self.cache.delete_prefix("question:");
        tracing::info!(removed, "invalidated cached questions");
    }

    fn cached<T>(
        &self,
        key: String,
        ttl: std::time::Duration,
        unwrap: impl FnOnce(CachedValue) -> Option<T>,
        wrap: impl FnOnce(T) -> CachedValue,
        compute: impl FnOnce() -> Result<T>,
    ) -> Result<T>
    where
        T: Clone,
    {
        if let Some(value) = self.cache.get(&key).and_then(unwrap) {
            tracing::debug!(key = %key, "cache hit");
            return Ok(value);
        }
        let value = compute()?;
        self.cache.set(key, wrap(value.clone()), ttl);
        Ok(value)
    }

    // ----- question bank -----

    pub fn get_question(&self, id: &str) -> Result<Option<Question>> {
        let key = format!(
            "question:{}:{id}",
            self.question_generation.load(Ordering::SeqCst)
        );
        if let Some(CachedValue::Question(q)) = self.cache.get(&key) {
            return Ok(Some(q));
        }
        let question = self.questions.get(id)?;
        if let Some(q) = &question {
            self.cache
                .set(key, CachedValue::Question(q.clone()), self.config.cache_ttl());
        }
        Ok(question)
    }

    /// Insert or replace questions, keeping the rest of the bank.
    pub fn import_questions(&self, questions: &[Question]) -> Result<usize> {
        let count = self.questions.import(questions)?;
        self.invalidate_questions();
        Ok(count)
    }

    /// Replace the whole bank with `questions`.
    pub fn reimport_questions(&self, questions: &[Question]) -> Result<usize> {
        let count = self.questions.replace_all(questions)?;
        self.invalidate_questions();
        Ok(count)
    }

    pub fn question_count(&self) -> Result<usize> {
        self.questions.count()
    }

    pub fn search(&self, substring: &str) -> Result<Vec<Question>> {
        self.questions.search(substring)
    }

    pub fn questions_by_category(&self, category: &str) -> Result<Vec<Question>> {
        self.questions.by_category(category)
    }

    pub fn questions_by_difficulty(&self, difficulty: Difficulty) -> Result<Vec<Question>> {
        self.questions.by_difficulty(difficulty)
    }

    pub fn categories(&self) -> Result<Vec<CategoryCount>> {
        self.questions.categories()
    }

    fn answered_ids(&self, user: UserId) -> Result<HashSet<String>> {
        Ok(self
            .history
            .records_for(user)?
            .into_iter()
            .map(|r| r.question_id)
            .collect())
    }

    /// A random question the user has not answered yet, `None` once every
    /// question has been answered.
    pub fn random_question(&self, user: UserId) -> Result<Option<Question>> {
        let answered = self.answered_ids(user)?;
        self.questions.random_excluding(&answered)
    }

    /// Sequential practice: the first unanswered question after `after` in
    /// bank order, wrapping around to the first unanswered one. When every
    /// question is answered, starts again from the first question.
    pub fn next_in_sequence(
        &self,
        user: UserId,
        after: Option<&str>,
    ) -> Result<Option<Question>> {
        let answered = self.answered_ids(user)?;
        let sequence = self.questions.all_in_sequence()?;
        let is_after = |q: &Question| {
            after.map_or(true, |a| compare_ids(&q.id, a) == std::cmp::Ordering::Greater)
        };

        let next = sequence
            .iter()
            .find(|q| is_after(q) && !answered.contains(&q.id))
            .or_else(|| sequence.iter().find(|q| !answered.contains(&q.id)))
            .or_else(|| sequence.first());
        Ok(next.cloned())
    }

    /// Grade `answer` without recording it.
    pub fn check_answer(&self, question_id: &str, answer: &str) -> Result<Option<Grade>> {
        Ok(self
            .get_question(question_id)?
            .map(|q| grade(&q, answer, self.config.fill_blank_similarity)))
    }

    // ----- writes -----

    /// Grade and record an answer. Returns `None` if the question does not
    /// exist. Cached statistics of `user` are invalidated before returning.
    pub fn submit_answer(
        &self,
        user: UserId,
        question_id: &str,
        answer: &str,
        time_spent_ms: Option<i64>,
    ) -> Result<Option<AnswerRecord>> {
        let Some(question) = self.get_question(question_id)? else {
            return Ok(None);
        };
        let grade = grade(&question, answer, self.config.fill_blank_similarity);
        let record = AnswerRecord {
            question_id: question.id,
            user_id: user,
            submitted_answer: grade.normalized_answer,
            is_correct: grade.is_correct,
            timestamp: Utc::now(),
            time_spent_ms,
        };
        self.record_answer(&record)?;
        Ok(Some(record))
    }

    /// Append an already graded record.
    pub fn record_answer(&self, record: &AnswerRecord) -> Result<()> {
        self.history.append(record)?;
        self.invalidate_user(record.user_id);
        Ok(())
    }

    /// Forget the user's whole answer history.
    pub fn reset_history(&self, user: UserId) -> Result<usize> {
        let removed = self.history.clear_user(user)?;
        self.invalidate_user(user);
        tracing::info!(user, removed, "reset answer history");
        Ok(removed)
    }

    /// Flip the favorite state of a question. Returns the new state, or
    /// `None` if the question does not exist.
    pub fn toggle_favorite(
        &self,
        user: UserId,
        question_id: &str,
        tag: &str,
    ) -> Result<Option<bool>> {
        if self.get_question(question_id)?.is_none() {
            return Ok(None);
        }
        if self.favorites.is_favorite(user, question_id)? {
            self.favorites.remove(user, question_id)?;
            Ok(Some(false))
        } else {
            self.favorites.add(user, question_id, tag)?;
            Ok(Some(true))
        }
    }

    pub fn is_favorite(&self, user: UserId, question_id: &str) -> Result<bool> {
        self.favorites.is_favorite(user, question_id)
    }

    pub fn favorites(&self, user: UserId) -> Result<Vec<Favorite>> {
        self.favorites.list(user)
    }

    pub fn update_favorite_tag(&self, user: UserId, question_id: &str, tag: &str) -> Result<bool> {
        self.favorites.set_tag(user, question_id, tag)
    }

    // ----- exam and timed sessions -----

    /// Start an untimed mock exam over `count` random questions.
    pub fn start_exam(&self, user: UserId, count: usize) -> Result<Session> {
        self.start_session(user, SessionMode::Exam, count, None, Utc::now())
    }

    /// Start a practice round that must be submitted within `duration`.
    pub fn start_timed(&self, user: UserId, count: usize, duration: Duration) -> Result<Session> {
        let secs = duration.num_seconds();
        if secs <= 0 {
            return Err(QuizError::InvalidArgument(format!(
                "timed session needs at least one second, got {duration}"
            )));
        }
        self.start_session(user, SessionMode::Timed, count, Some(secs), Utc::now())
    }

    fn start_session(
        &self,
        user: UserId,
        mode: SessionMode,
        count: usize,
        duration_secs: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        if count == 0 {
            return Err(QuizError::InvalidArgument(
                "a session needs at least one question".into(),
            ));
        }
        let picked = self.questions.random_sample(count)?;
        if picked.is_empty() {
            return Err(QuizError::InvalidArgument(
                "the question bank is empty".into(),
            ));
        }
        let ids: Vec<String> = picked.into_iter().map(|q| q.id).collect();
        let session = self.sessions.create(user, mode, &ids, now, duration_secs)?;
        tracing::info!(user, session = session.id, %mode, questions = ids.len(), "started session");
        Ok(session)
    }

    /// The session if it exists and belongs to `user`.
    pub fn get_session(&self, user: UserId, id: SessionId) -> Result<Option<Session>> {
        Ok(self.sessions.get(id)?.filter(|s| s.user_id == user))
    }

    pub fn sessions(&self, user: UserId) -> Result<Vec<Session>> {
        self.sessions.list(user)
    }

    /// Questions of a session in their drawn order. Questions removed from
    /// the bank since the session started are skipped.
    pub fn session_questions(&self, user: UserId, id: SessionId) -> Result<Option<Vec<Question>>> {
        let Some(session) = self.get_session(user, id)? else {
            return Ok(None);
        };
        let mut questions = Vec::with_capacity(session.question_ids.len());
        for qid in &session.question_ids {
            if let Some(q) = self.get_question(qid)? {
                questions.push(q);
            }
        }
        Ok(Some(questions))
    }

    /// Grade a whole session. `answers` maps question id to the submitted
    /// answer; missing entries count as wrong. A timed session submitted
    /// after its deadline keeps none of its answers. Every graded question
    /// is appended to history.
    pub fn submit_session(
        &self,
        user: UserId,
        id: SessionId,
        answers: &HashMap<String, String>,
    ) -> Result<Option<SessionResult>> {
        self.submit_session_at(user, id, answers, Utc::now())
    }

    fn submit_session_at(
        &self,
        user: UserId,
        id: SessionId,
        answers: &HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionResult>> {
        let Some(session) = self.get_session(user, id)? else {
            return Ok(None);
        };
        let already_submitted =
            || QuizError::InvalidArgument(format!("session {id} was already submitted"));
        if session.completed {
            return Err(already_submitted());
        }
        let expired = session.is_expired(now);

        let mut results = Vec::with_capacity(session.question_ids.len());
        let mut records = Vec::with_capacity(session.question_ids.len());
        for qid in &session.question_ids {
            let Some(question) = self.get_question(qid)? else {
                continue;
            };
            let submitted = match answers.get(qid) {
                Some(answer) if !expired => answer.as_str(),
                _ => "",
            };
            let grade = grade(&question, submitted, self.config.fill_blank_similarity);
            records.push(AnswerRecord {
                question_id: question.id.clone(),
                user_id: user,
                submitted_answer: grade.normalized_answer.clone(),
                is_correct: grade.is_correct,
                timestamp: now,
                time_spent_ms: None,
            });
            results.push(SessionAnswer {
                question_id: question.id,
                stem: question.stem,
                submitted_answer: grade.normalized_answer,
                correct_answer: question.answer,
                is_correct: grade.is_correct,
            });
        }

        let total = session.question_ids.len();
        let correct_count = results.iter().filter(|r| r.is_correct).count();
        let score = ratio(correct_count, total) * 100.0;
        if !self.sessions.complete(id, score)? {
            return Err(already_submitted());
        }
        self.history.append_all(&records)?;
        self.invalidate_user(user);
        tracing::info!(user, session = id, score, expired, "submitted session");

        Ok(Some(SessionResult {
            session_id: id,
            mode: session.mode,
            correct_count,
            total,
            score,
            expired,
            results,
        }))
    }

    // ----- reads -----

    pub fn get_progress(&self, user: UserId) -> Result<ProgressSummary> {
        self.progress().summary(user)
    }

    pub fn get_wrong_questions(&self, user: UserId) -> Result<Vec<Question>> {
        self.progress().wrong_questions(user)
    }

    pub fn get_trend(&self, user: UserId, window: Duration) -> Result<Vec<TrendPoint>> {
        self.progress().trend(user, window)
    }

    /// Daily accuracy over the last `days` days, today included.
    pub fn get_recent_trend(&self, user: UserId, days: u32) -> Result<Vec<TrendPoint>> {
        self.recent_trend_at(user, days, Utc::now())
    }

    fn recent_trend_at(
        &self,
        user: UserId,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<TrendPoint>> {
        if days == 0 || i64::from(days) > MAX_TREND_BUCKETS {
            return Err(QuizError::InvalidArgument(format!(
                "days must be between 1 and {MAX_TREND_BUCKETS}, got {days}"
            )));
        }
        let today = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc())
            .unwrap_or(now);
        let out_of_range = || QuizError::InvalidArgument(format!("{days} days is out of range"));
        let from = today
            .checked_sub_signed(Duration::days(i64::from(days) - 1))
            .ok_or_else(out_of_range)?;
        let to = today
            .checked_add_signed(Duration::days(1))
            .ok_or_else(out_of_range)?;
        self.progress().trend_between(user, Duration::days(1), from, to)
    }

    pub fn get_difficulty_stats(&self, user: UserId) -> Result<BTreeMap<Difficulty, Tally>> {
        self.cached(
            self.stats_key(user, "difficulty"),
            self.config.stats_ttl(),
            |v| match v {
                CachedValue::ByDifficulty(m) => Some(m),
                _ => None,
            },
            CachedValue::ByDifficulty,
            || self.statistics().by_difficulty(user),
        )
    }

    pub fn get_category_stats(&self, user: UserId) -> Result<BTreeMap<String, Tally>> {
        self.cached(
            self.stats_key(user, "category"),
            self.config.stats_ttl(),
            |v| match v {
                CachedValue::ByCategory(m) => Some(m),
                _ => None,
            },
            CachedValue::ByCategory,
            || self.statistics().by_category(user),
        )
    }

    pub fn get_statistics_report(&self, user: UserId) -> Result<StatisticsReport> {
        self.cached(
            self.stats_key(user, "report"),
            self.config.stats_ttl(),
            |v| match v {
                CachedValue::Report(r) => Some(*r),
                _ => None,
            },
            |r| CachedValue::Report(Box::new(r)),
            || self.statistics().report(user),
        )
    }

    pub fn get_bank_overview(&self) -> Result<BankOverview> {
        self.statistics().bank_overview()
    }

    pub fn analyze(&self, kind: AnalyzerKind, user: UserId) -> Result<Analysis> {
        let (questions, history) = (self.questions.as_ref(), self.history.as_ref());
        create_analyzer(kind, questions, history, self.rule()).analyze(user)
    }

    pub fn get_recommendations(&self, user: UserId, count: usize) -> Result<Vec<Recommendation>> {
        self.engine().recommend(user, count)
    }

    pub fn get_wrong_recommendations(
        &self,
        user: UserId,
        count: usize,
    ) -> Result<Vec<Recommendation>> {
        self.engine().recommend_wrong(user, count)
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop expired cache entries now rather than on their next read.
    pub fn purge_expired_cache(&self) -> usize {
        self.cache.purge_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, question, record};

    fn system() -> (tempfile::TempDir, QuizSystem) {
        let dir = tempfile::tempdir().unwrap();
        let system = QuizSystem::open(dir.path().join("quiz.db"), QuizConfig::default()).unwrap();
        (dir, system)
    }

    fn with_bank(ids: &[&str]) -> (tempfile::TempDir, QuizSystem) {
        let (dir, system) = system();
        let bank: Vec<Question> = ids
            .iter()
            .map(|id| question(id, "A", Difficulty::Easy))
            .collect();
        system.import_questions(&bank).unwrap();
        (dir, system)
    }

    #[test]
    fn parse_count_rejects_negative() {
        assert_eq!(parse_count(3).unwrap(), 3);
        assert!(matches!(parse_count(-1), Err(QuizError::InvalidArgument(_))));
    }

    #[test]
    fn invalid_config_is_rejected_before_opening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiz.db");
        let config = QuizConfig {
            stats_ttl_secs: -5.0,
            ..Default::default()
        };
        assert!(QuizSystem::open(&path, config).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn stats_cache_is_refreshed_by_writes() {
        let (_dir, system) = system();
        system
            .import_questions(&[question("1", "Ownership", Difficulty::Easy)])
            .unwrap();

        system.record_answer(&record(1, "1", true, at(0))).unwrap();
        assert_eq!(system.get_category_stats(1).unwrap()["Ownership"].total, 1);
        assert_eq!(system.get_category_stats(1).unwrap()["Ownership"].total, 1);
        assert!(system.get_cache_stats().hits >= 1);

        system.record_answer(&record(1, "1", false, at(5))).unwrap();
        let stats = system.get_category_stats(1).unwrap();
        assert_eq!(stats["Ownership"], Tally { total: 2, correct: 1 });
        assert_eq!(system.get_difficulty_stats(1).unwrap()[&Difficulty::Easy].total, 2);
        assert_eq!(system.get_statistics_report(1).unwrap().breakdown.overall.total, 2);

        system.reset_history(1).unwrap();
        assert!(system.get_category_stats(1).unwrap().is_empty());
    }

    #[test]
    fn users_sharing_a_generation_counter_stay_correct() {
        let (_dir, system) = with_bank(&["1"]);
        let neighbour = 1 + GENERATION_STRIPES as i64;
        let other = 2;

        system.record_answer(&record(1, "1", true, at(0))).unwrap();
        system.record_answer(&record(neighbour, "1", false, at(0))).unwrap();
        system.record_answer(&record(other, "1", true, at(0))).unwrap();
        system.get_category_stats(neighbour).unwrap();
        system.get_category_stats(other).unwrap();

        system.record_answer(&record(1, "1", true, at(1))).unwrap();
        assert_eq!(system.get_category_stats(neighbour).unwrap()["A"].total, 1);
        assert_eq!(system.get_category_stats(1).unwrap()["A"].total, 2);

        let hits = system.get_cache_stats().hits;
        assert_eq!(system.get_category_stats(other).unwrap()["A"].total, 1);
        assert_eq!(system.get_cache_stats().hits, hits + 1);
    }

    #[test]
    fn recent_trend_covers_requested_days() {
        let (_dir, system) = system();
        let now = at(0);
        system.record_answer(&record(1, "1", true, now)).unwrap();
        system
            .record_answer(&record(1, "1", false, now - Duration::days(2)))
            .unwrap();
        system
            .record_answer(&record(1, "1", false, now - Duration::days(30)))
            .unwrap();

        let trend = system.recent_trend_at(1, 7, now).unwrap();
        assert_eq!(trend.len(), 7);
        assert_eq!(trend[6].accuracy, Some(1.0));
        assert_eq!(trend[4].accuracy, Some(0.0));
        assert_eq!(trend.iter().filter(|p| p.accuracy.is_some()).count(), 2);
        assert!(system.recent_trend_at(1, 0, now).is_err());
    }

    #[test]
    fn huge_day_counts_are_rejected_without_panicking() {
        let (_dir, system) = system();
        for days in [200_000_000, u32::MAX, MAX_TREND_BUCKETS as u32 + 1] {
            assert!(matches!(
                system.get_recent_trend(1, days),
                Err(QuizError::InvalidArgument(_))
            ));
        }
        assert_eq!(
            system.recent_trend_at(1, MAX_TREND_BUCKETS as u32, at(0)).unwrap().len(),
            MAX_TREND_BUCKETS as usize
        );
    }

    #[test]
    fn sequence_skips_answered_and_wraps() {
        let (_dir, system) = with_bank(&["1", "2", "3"]);

        assert_eq!(system.next_in_sequence(1, None).unwrap().unwrap().id, "1");
        system.record_answer(&record(1, "2", true, at(0))).unwrap();
        assert_eq!(system.next_in_sequence(1, Some("1")).unwrap().unwrap().id, "3");
        assert_eq!(system.next_in_sequence(1, Some("3")).unwrap().unwrap().id, "1");

        system.record_answer(&record(1, "1", true, at(1))).unwrap();
        system.record_answer(&record(1, "3", true, at(2))).unwrap();
        assert_eq!(system.next_in_sequence(1, Some("2")).unwrap().unwrap().id, "1");
        assert!(system.random_question(1).unwrap().is_none());
        assert!(system.random_question(2).unwrap().is_some());
    }

    #[test]
    fn reimport_replaces_bank_and_cached_questions() {
        let (_dir, system) = with_bank(&["1", "2"]);
        assert_eq!(system.get_question("1").unwrap().unwrap().stem, "Question 1");

        let mut edited = question("1", "B", Difficulty::Hard);
        edited.stem = "Rewritten".to_string();
        assert_eq!(system.reimport_questions(&[edited]).unwrap(), 1);

        assert_eq!(system.get_question("1").unwrap().unwrap().stem, "Rewritten");
        assert!(system.get_question("2").unwrap().is_none());
        assert_eq!(system.question_count().unwrap(), 1);
    }

    #[test]
    fn check_answer_does_not_record() {
        let (_dir, system) = with_bank(&["1"]);
        assert!(system.check_answer("1", "a").unwrap().unwrap().is_correct);
        assert!(!system.check_answer("1", "B").unwrap().unwrap().is_correct);
        assert!(system.check_answer("9", "A").unwrap().is_none());
        assert_eq!(system.get_progress(1).unwrap().answered_count, 0);
    }

    fn answers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(q, a)| (q.to_string(), a.to_string()))
            .collect()
    }

    #[test]
    fn exam_session_grades_batch_and_records_history() {
        let (_dir, system) = with_bank(&["1", "2", "3", "4"]);
        let session = system.start_exam(5, 3).unwrap();
        assert_eq!(session.mode, SessionMode::Exam);
        assert_eq!(session.question_ids.len(), 3);
        assert!(session.deadline().is_none());
        assert_eq!(system.session_questions(5, session.id).unwrap().unwrap().len(), 3);

        let stats_before = system.get_category_stats(5).unwrap();
        assert!(stats_before.is_empty());

        let ids = &session.question_ids;
        let given = answers(&[(ids[0].as_str(), "A"), (ids[1].as_str(), "C")]);
        let result = system.submit_session(5, session.id, &given).unwrap().unwrap();
        assert_eq!(result.total, 3);
        assert_eq!(result.correct_count, 1);
        assert!((result.score - 100.0 / 3.0).abs() < 1e-9);
        assert!(!result.expired);
        assert_eq!(result.results[2].submitted_answer, "");

        assert_eq!(system.get_progress(5).unwrap().answered_count, 3);
        assert_eq!(system.get_category_stats(5).unwrap()["A"].total, 3);

        let stored = system.get_session(5, session.id).unwrap().unwrap();
        assert!(stored.completed);
        assert_eq!(stored.score, Some(result.score));
        assert!(matches!(
            system.submit_session(5, session.id, &given),
            Err(QuizError::InvalidArgument(_))
        ));
    }

    #[test]
    fn expired_timed_session_discards_answers() {
        let (_dir, system) = with_bank(&["1", "2"]);
        let session = system
            .start_session(1, SessionMode::Timed, 2, Some(600), at(0))
            .unwrap();
        assert_eq!(session.remaining_secs(at(60)), Some(540));
        assert!(!session.is_expired(at(599)));

        let all_right = answers(&[("1", "A"), ("2", "A")]);
        let result = system
            .submit_session_at(1, session.id, &all_right, at(601))
            .unwrap()
            .unwrap();
        assert!(result.expired);
        assert_eq!(result.correct_count, 0);
        assert_eq!(result.score, 0.0);
        assert_eq!(system.get_progress(1).unwrap().wrong_count, 2);
    }

    #[test]
    fn timed_session_within_deadline_counts_answers() {
        let (_dir, system) = with_bank(&["1", "2"]);
        let session = system
            .start_session(1, SessionMode::Timed, 2, Some(600), at(0))
            .unwrap();
        let result = system
            .submit_session_at(1, session.id, &answers(&[("1", "A"), ("2", "A")]), at(300))
            .unwrap()
            .unwrap();
        assert!(!result.expired);
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn sessions_are_private_and_validated() {
        let (_dir, system) = with_bank(&["1"]);
        let session = system.start_exam(1, 5).unwrap();
        assert_eq!(session.question_ids, vec!["1"]);

        assert!(system.get_session(2, session.id).unwrap().is_none());
        assert!(system
            .submit_session(2, session.id, &HashMap::new())
            .unwrap()
            .is_none());
        assert_eq!(system.sessions(1).unwrap().len(), 1);

        assert!(system.start_exam(1, 0).is_err());
        assert!(system.start_timed(1, 1, Duration::zero()).is_err());

        let (_empty_dir, empty) = self::system();
        assert!(matches!(empty.start_exam(1, 3), Err(QuizError::InvalidArgument(_))));
    }
}
