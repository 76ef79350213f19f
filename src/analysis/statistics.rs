//! Aggregate accuracy breakdowns by difficulty, category and question type.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::analysis::{Analysis, Analyzer, AnalyzerKind};
use crate::error::Result;
use crate::model::{AnswerRecord, Difficulty, Question, QuestionType, Tally, UserId};
use crate::store::{HistoryStore, QuestionStore};

/// Thresholds that decide when a group of answers counts as weak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeakRule {
    pub accuracy_below: f64,
    pub min_attempts: u32,
}

impl WeakRule {
    pub fn is_weak(&self, tally: &Tally) -> bool {
        tally.total >= self.min_attempts as usize && tally.accuracy() < self.accuracy_below
    }

    /// Groups of `map` that are weak, weakest first.
    pub fn weak_groups<K: Clone + Ord>(&self, map: &BTreeMap<K, Tally>) -> Vec<(K, Tally)> {
        let mut weak: Vec<(K, Tally)> = map
            .iter()
            .filter(|(_, tally)| self.is_weak(tally))
            .map(|(key, tally)| (key.clone(), *tally))
            .collect();
        weak.sort_by(|a, b| a.1.accuracy().total_cmp(&b.1.accuracy()).then_with(|| a.0.cmp(&b.0)));
        weak
    }
}

/// Per-group tallies of one user's answers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub overall: Tally,
    pub by_difficulty: BTreeMap<Difficulty, Tally>,
    pub by_category: BTreeMap<String, Tally>,
    pub by_type: BTreeMap<QuestionType, Tally>,
}

impl Breakdown {
    /// Join `records` to `bank` by question id. Records of questions no
    /// longer in the bank only count towards `overall`.
    pub fn from_records(records: &[AnswerRecord], bank: &HashMap<String, Question>) -> Self {
        let mut breakdown = Breakdown::default();
        for record in records {
            breakdown.overall.record(record.is_correct);
            let Some(question) = bank.get(&record.question_id) else {
                continue;
            };
            breakdown
                .by_difficulty
                .entry(question.difficulty)
                .or_default()
                .record(record.is_correct);
            breakdown
                .by_category
                .entry(question.category_key().to_string())
                .or_default()
                .record(record.is_correct);
            breakdown
                .by_type
                .entry(question.qtype)
                .or_default()
                .record(record.is_correct);
        }
        breakdown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeakArea {
    pub name: String,
    pub total: usize,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorstQuestion {
    pub question_id: String,
    pub stem: String,
    pub wrong_times: u32,
}

/// Composition of the question bank itself, independent of any user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BankOverview {
    pub total: usize,
    pub by_difficulty: BTreeMap<Difficulty, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub by_type: BTreeMap<QuestionType, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub overall_accuracy: f64,
    pub breakdown: Breakdown,
    pub weak_categories: Vec<WeakArea>,
    pub weak_difficulties: Vec<Difficulty>,
    pub worst_questions: Vec<WorstQuestion>,
}

const REPORT_WORST_QUESTIONS: usize = 10;

pub struct StatisticsAnalyzer<'a> {
    questions: &'a dyn QuestionStore,
    history: &'a dyn HistoryStore,
    rule: WeakRule,
}

impl<'a> StatisticsAnalyzer<'a> {
    pub fn new(
        questions: &'a dyn QuestionStore,
        history: &'a dyn HistoryStore,
        rule: WeakRule,
    ) -> Self {
        Self {
            questions,
            history,
            rule,
        }
    }

    pub fn breakdown(&self, user: UserId) -> Result<Breakdown> {
        let records = self.history.records_for(user)?;
        Ok(Breakdown::from_records(&records, &self.bank()?))
    }

    pub fn by_difficulty(&self, user: UserId) -> Result<BTreeMap<Difficulty, Tally>> {
        Ok(self.breakdown(user)?.by_difficulty)
    }

    pub fn by_category(&self, user: UserId) -> Result<BTreeMap<String, Tally>> {
        Ok(self.breakdown(user)?.by_category)
    }

    pub fn by_type(&self, user: UserId) -> Result<BTreeMap<QuestionType, Tally>> {
        Ok(self.breakdown(user)?.by_type)
    }

    pub fn weak_categories(&self, user: UserId) -> Result<Vec<WeakArea>> {
        Ok(weak_categories(&self.rule, &self.breakdown(user)?))
    }

    pub fn weak_difficulties(&self, user: UserId) -> Result<Vec<Difficulty>> {
        Ok(self
            .rule
            .weak_groups(&self.breakdown(user)?.by_difficulty)
            .into_iter()
            .map(|(difficulty, _)| difficulty)
            .collect())
    }

    /// Questions answered wrong most often, ties by id.
    pub fn worst_questions(&self, user: UserId, limit: usize) -> Result<Vec<WorstQuestion>> {
        let records = self.history.records_for(user)?;
        Ok(worst_questions(&records, &self.bank()?, limit))
    }

    pub fn bank_overview(&self) -> Result<BankOverview> {
        let mut overview = BankOverview::default();
        for q in self.questions.all_in_sequence()? {
            overview.total += 1;
            *overview.by_difficulty.entry(q.difficulty).or_default() += 1;
            *overview
                .by_category
                .entry(q.category_key().to_string())
                .or_default() += 1;
            *overview.by_type.entry(q.qtype).or_default() += 1;
        }
        Ok(overview)
    }

    pub fn report(&self, user: UserId) -> Result<StatisticsReport> {
        let records = self.history.records_for(user)?;
        let bank = self.bank()?;
        let breakdown = Breakdown::from_records(&records, &bank);
        Ok(StatisticsReport {
            overall_accuracy: breakdown.overall.accuracy(),
            weak_categories: weak_categories(&self.rule, &breakdown),
            weak_difficulties: self
                .rule
                .weak_groups(&breakdown.by_difficulty)
                .into_iter()
                .map(|(difficulty, _)| difficulty)
                .collect(),
            worst_questions: worst_questions(&records, &bank, REPORT_WORST_QUESTIONS),
            breakdown,
        })
    }

    fn bank(&self) -> Result<HashMap<String, Question>> {
        Ok(self
            .questions
            .all_in_sequence()?
            .into_iter()
            .map(|q| (q.id.clone(), q))
            .collect())
    }
}

impl Analyzer for StatisticsAnalyzer<'_> {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Statistics
    }

    fn analyze(&self, user: UserId) -> Result<Analysis> {
        Ok(Analysis::Statistics(self.report(user)?))
    }
}

fn weak_categories(rule: &WeakRule, breakdown: &Breakdown) -> Vec<WeakArea> {
    rule.weak_groups(&breakdown.by_category)
        .into_iter()
        .map(|(name, tally)| WeakArea {
            name,
            total: tally.total,
            accuracy: tally.accuracy(),
        })
        .collect()
}

fn worst_questions(
    records: &[AnswerRecord],
    bank: &HashMap<String, Question>,
    limit: usize,
) -> Vec<WorstQuestion> {
    let mut worst: Vec<WorstQuestion> = super::progress::wrong_counts(records)
        .into_iter()
        .filter_map(|(id, wrong_times)| {
            bank.get(&id).map(|q| WorstQuestion {
                question_id: id,
                stem: q.stem.clone(),
                wrong_times,
            })
        })
        .collect();
    worst.sort_by(|a, b| {
        b.wrong_times
            .cmp(&a.wrong_times)
            .then_with(|| crate::model::compare_ids(&a.question_id, &b.question_id))
    });
    worst.truncate(limit);
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, question, record, Fixture};

    fn fixture() -> Fixture {
        let mut blank = question("4", "", Difficulty::Unspecified);
        blank.qtype = QuestionType::FillBlank;
        let fx = Fixture::with_questions(&[
            question("1", "Ownership", Difficulty::Easy),
            question("2", "Ownership", Difficulty::Hard),
            question("3", "Traits", Difficulty::Hard),
            blank,
        ]);
        fx.append(record(1, "1", true, at(1)));
        fx.append(record(1, "2", false, at(2)));
        fx.append(record(1, "2", false, at(3)));
        fx.append(record(1, "3", true, at(4)));
        fx.append(record(1, "4", false, at(5)));
        fx.append(record(1, "deleted", true, at(6)));
        fx
    }

    #[test]
    fn by_difficulty_groups_and_skips_missing_questions() {
        let fx = fixture();
        let stats = fx.statistics().by_difficulty(1).unwrap();
        assert_eq!(stats[&Difficulty::Easy], Tally { total: 1, correct: 1 });
        assert_eq!(stats[&Difficulty::Hard], Tally { total: 3, correct: 1 });
        assert_eq!(stats[&Difficulty::Unspecified], Tally { total: 1, correct: 0 });
        assert!(!stats.contains_key(&Difficulty::Medium));
    }

    #[test]
    fn by_category_puts_blank_category_under_unspecified() {
        let fx = fixture();
        let stats = fx.statistics().by_category(1).unwrap();
        assert_eq!(stats["Ownership"], Tally { total: 3, correct: 1 });
        assert_eq!(stats["unspecified"].total, 1);

        let by_type = fx.statistics().by_type(1).unwrap();
        assert_eq!(by_type[&QuestionType::FillBlank].total, 1);
    }

    #[test]
    fn weak_areas_need_enough_attempts() {
        let fx = fixture();
        let weak = fx.statistics().weak_categories(1).unwrap();
        assert_eq!(weak.len(), 1);
        assert_eq!(weak[0].name, "Ownership");
        assert_eq!(fx.statistics().weak_difficulties(1).unwrap(), vec![Difficulty::Hard]);
    }

    #[test]
    fn report_bundles_everything() {
        let fx = fixture();
        let report = fx.statistics().report(1).unwrap();
        assert_eq!(report.breakdown.overall.total, 6);
        assert_eq!(report.overall_accuracy, 0.5);
        assert_eq!(report.worst_questions[0].question_id, "2");
        assert_eq!(report.worst_questions[0].wrong_times, 2);
        assert_eq!(report.worst_questions[1].question_id, "4");

        match fx.statistics().analyze(1).unwrap() {
            Analysis::Statistics(r) => assert_eq!(r, report),
            other => panic!("unexpected analysis: {other:?}"),
        }
    }

    #[test]
    fn bank_overview_counts_questions() {
        let fx = fixture();
        let overview = fx.statistics().bank_overview().unwrap();
        assert_eq!(overview.total, 4);
        assert_eq!(overview.by_difficulty[&Difficulty::Hard], 2);
        assert_eq!(overview.by_category["Ownership"], 2);
    }

    #[test]
    fn user_without_history_has_empty_breakdown() {
        let fx = fixture();
        let report = fx.statistics().report(99).unwrap();
        assert_eq!(report.overall_accuracy, 0.0);
        assert!(report.breakdown.by_category.is_empty());
        assert!(report.weak_categories.is_empty());
    }
}
