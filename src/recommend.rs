//! Study recommendations: which questions a user should look at next.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::analysis::{wrong_counts, wrong_question_ids, Breakdown, WeakRule};
use crate::config::RecommendConfig;
use crate::error::Result;
use crate::model::{
    compare_ids, AnswerRecord, Difficulty, Question, Recommendation, RecommendationReason, UserId,
};
use crate::store::{HistoryStore, QuestionStore};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

pub struct RecommendationEngine<'a> {
    questions: &'a dyn QuestionStore,
    history: &'a dyn HistoryStore,
    rule: WeakRule,
    config: RecommendConfig,
}

/// What the scorer knows about one user.
struct Profile<'r> {
    weak_categories: HashSet<String>,
    weak_difficulties: HashSet<Difficulty>,
    /// Categories of the latest wrong answers, newest first.
    recent_wrong_categories: Vec<String>,
    last_answered: HashMap<&'r str, DateTime<Utc>>,
    last_correct: HashMap<&'r str, bool>,
}

impl<'r> Profile<'r> {
    fn build(
        records: &'r [AnswerRecord],
        bank: &HashMap<String, Question>,
        rule: &WeakRule,
        recent_window: usize,
    ) -> Self {
        let breakdown = Breakdown::from_records(records, bank);
        let weak_categories = rule
            .weak_groups(&breakdown.by_category)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        let weak_difficulties = rule
            .weak_groups(&breakdown.by_difficulty)
            .into_iter()
            .map(|(difficulty, _)| difficulty)
            .collect();

        let recent_wrong_categories = records
            .iter()
            .rev()
            .filter(|r| !r.is_correct)
            .filter_map(|r| bank.get(&r.question_id))
            .take(recent_window)
            .map(|q| q.category_key().to_string())
            .collect();

        let mut last_answered = HashMap::new();
        let mut last_correct = HashMap::new();
        for record in records {
            last_answered.insert(record.question_id.as_str(), record.timestamp);
            last_correct.insert(record.question_id.as_str(), record.is_correct);
        }

        Self {
            weak_categories,
            weak_difficulties,
            recent_wrong_categories,
            last_answered,
            last_correct,
        }
    }

    fn is_weak(&self, question: &Question) -> bool {
        self.weak_categories.contains(question.category_key())
            || self.weak_difficulties.contains(&question.difficulty)
    }

    fn recent_wrong_share(&self, question: &Question) -> f64 {
        if self.recent_wrong_categories.is_empty() {
            return 0.0;
        }
        let category = question.category_key();
        let hits = self
            .recent_wrong_categories
            .iter()
            .filter(|c| c.as_str() == category)
            .count();
        hits as f64 / self.recent_wrong_categories.len() as f64
    }

    /// 1 for a question answered just now, decaying with age; 0 if never seen.
    fn recency(&self, question: &Question, now: DateTime<Utc>) -> f64 {
        match self.last_answered.get(question.id.as_str()) {
            Some(last) => 1.0 / (1.0 + age_days(*last, now)),
            None => 0.0,
        }
    }
}

fn age_days(then: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    ((now - then).num_milliseconds().max(0) as f64) / MILLIS_PER_DAY
}

/// Highest score first, ties by ascending question id.
fn rank(a: &Recommendation, b: &Recommendation) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| compare_ids(&a.question.id, &b.question.id))
}

impl<'a> RecommendationEngine<'a> {
    pub fn new(
        questions: &'a dyn QuestionStore,
        history: &'a dyn HistoryStore,
        rule: WeakRule,
        config: RecommendConfig,
    ) -> Self {
        Self {
            questions,
            history,
            rule,
            config,
        }
    }

    /// Up to `count` questions the user has not answered yet, ranked by
    /// score. When fewer than `count` remain, previously answered questions
    /// fill the gap: those last answered wrong first, then the rest, each
    /// group longest-ago first.
    pub fn recommend(&self, user: UserId, count: usize) -> Result<Vec<Recommendation>> {
        self.recommend_at(user, count, Utc::now())
    }

    pub fn recommend_at(
        &self,
        user: UserId,
        count: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Recommendation>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let records = self.history.records_for(user)?;
        let sequence = self.questions.all_in_sequence()?;
        let bank: HashMap<String, Question> =
            sequence.iter().map(|q| (q.id.clone(), q.clone())).collect();
        let profile = Profile::build(&records, &bank, &self.rule, self.config.recent_wrong_window);

        let (mut answered, mut candidates): (Vec<&Question>, Vec<&Question>) = sequence
            .iter()
            .partition(|q| profile.last_answered.contains_key(q.id.as_str()));

        if candidates.len() < count {
            // Wrong-last before right-last, then oldest answer first.
            answered.sort_by(|a, b| {
                let wrong_a = profile.last_correct.get(a.id.as_str()) == Some(&false);
                let wrong_b = profile.last_correct.get(b.id.as_str()) == Some(&false);
                wrong_b
                    .cmp(&wrong_a)
                    .then_with(|| {
                        let last = &profile.last_answered;
                        last[a.id.as_str()].cmp(&last[b.id.as_str()])
                    })
                    .then_with(|| compare_ids(&a.id, &b.id))
            });
            let missing = count - candidates.len();
            tracing::debug!(user, missing, "topping up recommendations with answered questions");
            candidates.extend(answered.into_iter().take(missing));
        }

        let mut recommendations: Vec<Recommendation> = candidates
            .into_iter()
            .map(|q| self.score(q, &profile, now))
            .collect();
        recommendations.sort_by(rank);
        recommendations.truncate(count);
        Ok(recommendations)
    }

    fn score(
        &self,
        question: &Question,
        profile: &Profile<'_>,
        now: DateTime<Utc>,
    ) -> Recommendation {
        let weak = profile.is_weak(question);
        let share = profile.recent_wrong_share(question);
        let recency = profile.recency(question, now);
        let weak_term = if weak { 1.0 } else { 0.0 };
        let score = self.config.weak_area_weight * weak_term
            + self.config.staleness_weight * (1.0 - recency)
            + self.config.recent_wrong_weight * share;

        let reason = if weak {
            RecommendationReason::WeakArea {
                category: question.category_key().to_string(),
            }
        } else if share > 0.0 {
            RecommendationReason::RecentMistakes {
                category: question.category_key().to_string(),
            }
        } else if profile.last_answered.contains_key(question.id.as_str()) {
            RecommendationReason::Review
        } else {
            RecommendationReason::Unseen
        };

        Recommendation {
            question: question.clone(),
            score,
            reason,
        }
    }

    /// Up to `count` questions whose latest answer is wrong. The older the
    /// mistake, the higher the score.
    pub fn recommend_wrong(&self, user: UserId, count: usize) -> Result<Vec<Recommendation>> {
        self.recommend_wrong_at(user, count, Utc::now())
    }

    pub fn recommend_wrong_at(
        &self,
        user: UserId,
        count: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Recommendation>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let records = self.history.records_for(user)?;
        let counts = wrong_counts(&records);
        let mut last_wrong: HashMap<&str, DateTime<Utc>> = HashMap::new();
        for record in records.iter().filter(|r| !r.is_correct) {
            last_wrong.insert(record.question_id.as_str(), record.timestamp);
        }

        let mut recommendations = Vec::new();
        for id in wrong_question_ids(&records) {
            let Some(question) = self.questions.get(&id)? else {
                continue;
            };
            let age = last_wrong.get(id.as_str()).map_or(0.0, |t| age_days(*t, now));
            recommendations.push(Recommendation {
                score: 1.0 - 1.0 / (1.0 + age),
                reason: RecommendationReason::Mistake {
                    wrong_count: counts.get(&id).copied().unwrap_or(1),
                },
                question,
            });
        }
        recommendations.sort_by(rank);
        recommendations.truncate(count);
        Ok(recommendations)
    }
}
