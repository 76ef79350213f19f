//! Answer grading: option-label comparison for choice questions, fuzzy
//! matching for fill-in-the-blank.

use strsim::{jaro_winkler, normalized_levenshtein};

use crate::model::{Question, QuestionType};

/// Outcome of grading one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Grade {
    pub is_correct: bool,
    /// The submission in canonical form, as stored in history.
    pub normalized_answer: String,
    /// 1.0 for an exact match; fuzzy score for fill-in-the-blank.
    pub similarity: f64,
}

/// Grade `submitted` against `question`. `fill_blank_threshold` is the
/// similarity at which a fill-in-the-blank answer is accepted.
pub fn grade(question: &Question, submitted: &str, fill_blank_threshold: f64) -> Grade {
    match question.qtype {
        QuestionType::SingleChoice | QuestionType::MultipleChoice => {
            exact(normalize_labels(submitted), normalize_labels(&question.answer))
        }
        QuestionType::TrueFalse => grade_true_false(question, submitted),
        QuestionType::FillBlank => {
            grade_fill_blank(&question.answer, submitted, fill_blank_threshold)
        }
    }
}

fn exact(submitted: String, expected: String) -> Grade {
    let is_correct = !expected.is_empty() && submitted == expected;
    Grade {
        is_correct,
        similarity: if is_correct { 1.0 } else { 0.0 },
        normalized_answer: submitted,
    }
}

/// "c, a" -> "AC": uppercase, drop separators, dedupe and sort.
pub fn normalize_labels(answer: &str) -> String {
    let mut labels: Vec<char> = answer
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect();
    labels.sort_unstable();
    labels.dedup();
    labels.into_iter().collect()
}

fn truth_value(word: &str) -> Option<bool> {
    match word.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "对" | "正确" | "是" | "√" | "✓" => Some(true),
        "false" | "f" | "no" | "错" | "错误" | "否" | "×" | "✗" => Some(false),
        _ => None,
    }
}

/// Resolve an answer to a truth value, either directly or through the text
/// of the option it names.
fn resolve_truth(question: &Question, answer: &str) -> Option<bool> {
    truth_value(answer).or_else(|| {
        let label = normalize_labels(answer);
        question
            .options
            .iter()
            .find(|(key, _)| normalize_labels(key) == label)
            .and_then(|(_, text)| truth_value(text))
    })
}

fn grade_true_false(question: &Question, submitted: &str) -> Grade {
    let by_label = exact(normalize_labels(submitted), normalize_labels(&question.answer));
    if by_label.is_correct {
        return by_label;
    }
    match (
        resolve_truth(question, submitted),
        resolve_truth(question, &question.answer),
    ) {
        (Some(given), Some(expected)) => Grade {
            is_correct: given == expected,
            similarity: if given == expected { 1.0 } else { 0.0 },
            normalized_answer: if given { "true" } else { "false" }.to_string(),
        },
        _ => by_label,
    }
}

fn grade_fill_blank(expected: &str, submitted: &str, threshold: f64) -> Grade {
    let input = submitted.trim().to_lowercase();
    let target = expected.trim().to_lowercase();

    if input == target {
        return Grade {
            is_correct: !target.is_empty(),
            normalized_answer: input,
            similarity: 1.0,
        };
    }

    // Jaro-Winkler is kinder to typos near the end of a word.
    let similarity =
        normalized_levenshtein(&input, &target) * 0.4 + jaro_winkler(&input, &target) * 0.6;
    Grade {
        is_correct: !input.is_empty() && similarity >= threshold,
        normalized_answer: input,
        similarity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Difficulty;
    use crate::test_support::question;

    fn with_type(qtype: QuestionType, answer: &str) -> Question {
        let mut q = question("1", "General", Difficulty::Easy);
        q.qtype = qtype;
        q.answer = answer.to_string();
        q
    }

    #[test]
    fn multiple_choice_ignores_order_case_and_separators() {
        let q = with_type(QuestionType::MultipleChoice, "AC");
        let grade = grade(&q, "c, a", 0.85);
        assert!(grade.is_correct);
        assert_eq!(grade.normalized_answer, "AC");

        assert!(!super::grade(&q, "A", 0.85).is_correct);
        assert!(!super::grade(&q, "ABC", 0.85).is_correct);
    }

    #[test]
    fn single_choice_needs_the_exact_label() {
        let q = with_type(QuestionType::SingleChoice, "B");
        assert!(grade(&q, "b", 0.85).is_correct);
        assert!(!grade(&q, "", 0.85).is_correct);
    }

    #[test]
    fn true_false_accepts_words_and_labels() {
        let mut q = with_type(QuestionType::TrueFalse, "A");
        q.options.clear();
        q.options.insert("A".into(), "正确".into());
        q.options.insert("B".into(), "错误".into());

        assert!(grade(&q, "A", 0.85).is_correct);
        assert!(grade(&q, "true", 0.85).is_correct);
        assert!(grade(&q, "对", 0.85).is_correct);
        assert!(!grade(&q, "B", 0.85).is_correct);
        assert!(!grade(&q, "false", 0.85).is_correct);
    }

    #[test]
    fn fill_blank_tolerates_small_typos() {
        let q = with_type(QuestionType::FillBlank, "ownership");
        let exact = grade(&q, "  Ownership ", 0.85);
        assert!(exact.is_correct);
        assert_eq!(exact.similarity, 1.0);

        let typo = grade(&q, "ownershp", 0.85);
        assert!(typo.is_correct, "similarity was {}", typo.similarity);

        let wrong = grade(&q, "lifetime", 0.85);
        assert!(!wrong.is_correct);
        assert!(wrong.similarity < 0.85);
    }
}
