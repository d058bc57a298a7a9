//! Normalizing model output into quiz questions and assignments.

use crate::{GenerationError, GenerationErrorKind, parse_structured};
use coursewright_core::{AssignmentDraft, QuizQuestion};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Questions kept per quiz.
pub const MAX_QUIZ_QUESTIONS: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuestionList {
    Wrapped { questions: Vec<Value> },
    Bare(Vec<Value>),
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(alias = "type", alias = "question_type", alias = "questionType")]
    kind: String,
    #[serde(alias = "question", alias = "text", alias = "title")]
    prompt: String,
    #[serde(default, alias = "choices")]
    options: Vec<String>,
    #[serde(default, alias = "correct_answer", alias = "correctAnswer", alias = "answer")]
    correct: Value,
    #[serde(default)]
    answers: Vec<String>,
}

/// Parse and normalize a question-generation response.
///
/// Accepts `{"questions": [...]}` or a bare array. Invalid questions are
/// dropped with a warning and at most `limit` are kept.
///
/// # Errors
///
/// [`GenerationErrorKind::PartialContent`] when nothing parses or no
/// question survives normalization.
///
/// # Examples
///
/// ```
/// use coursewright_core::QuizQuestion;
/// use coursewright_generation::parse_questions;
///
/// let raw = r#"{"questions": [
///     {"type": "single_choice", "question": "2 + 2?", "options": ["3", "4"], "correct": 1},
///     {"type": "fill_in_blank", "question": "Rust is ___ safe.", "answers": ["memory"]}
/// ]}"#;
/// let questions = parse_questions(raw, 10).unwrap();
/// assert_eq!(questions.len(), 2);
/// assert!(matches!(questions[0], QuizQuestion::SingleChoice { correct: 1, .. }));
/// ```
pub fn parse_questions(raw: &str, limit: usize) -> Result<Vec<QuizQuestion>, GenerationError> {
    let values = match parse_structured::<QuestionList>(raw)? {
        QuestionList::Wrapped { questions } => questions,
        QuestionList::Bare(questions) => questions,
    };
    let offered = values.len();

    let mut questions = Vec::new();
    for (i, value) in values.into_iter().enumerate() {
        let normalized = serde_json::from_value::<RawQuestion>(value)
            .map_err(|e| e.to_string())
            .and_then(normalize);
        match normalized {
            Ok(question) => questions.push(question),
            Err(reason) => warn!(index = i, reason = %reason, "Dropping invalid quiz question"),
        }
    }

    if questions.is_empty() {
        return Err(GenerationError::new(GenerationErrorKind::PartialContent(
            format!("none of {} quiz questions were usable", offered),
        )));
    }
    if questions.len() > limit {
        warn!(offered = questions.len(), limit, "Truncating quiz questions");
        questions.truncate(limit);
    }
    Ok(questions)
}

/// Parse an assignment-generation response.
///
/// # Errors
///
/// [`GenerationErrorKind::PartialContent`] when the response has no
/// `{title, content}` object or either field is blank.
pub fn parse_assignment(raw: &str) -> Result<AssignmentDraft, GenerationError> {
    let draft: AssignmentDraft = parse_structured(raw)?;
    if draft.title.trim().is_empty() || draft.content.trim().is_empty() {
        return Err(GenerationError::new(GenerationErrorKind::PartialContent(
            "assignment title or content is empty".to_string(),
        )));
    }
    Ok(AssignmentDraft {
        title: draft.title.trim().to_string(),
        content: draft.content.trim().to_string(),
    })
}

fn normalize(raw: RawQuestion) -> Result<QuizQuestion, String> {
    let prompt = raw.prompt.trim().to_string();
    if prompt.is_empty() {
        return Err("empty prompt".to_string());
    }
    let kind = raw.kind.trim().to_ascii_lowercase().replace(['-', ' '], "_");

    match kind.as_str() {
        "multiple_choice" | "multiple" | "multi_choice" | "multiple_answer" => {
            let options = clean_options(raw.options)?;
            let mut correct = correct_indices(&raw.correct, &options);
            correct.sort_unstable();
            correct.dedup();
            if correct.is_empty() {
                return Err("no valid correct option".to_string());
            }
            Ok(QuizQuestion::MultipleChoice {
                prompt,
                options,
                correct,
            })
        }
        "single_choice" | "single" | "true_false" => {
            let options = clean_options(raw.options)?;
            match correct_indices(&raw.correct, &options).as_slice() {
                [index] => Ok(QuizQuestion::SingleChoice {
                    prompt,
                    options,
                    correct: *index,
                }),
                [] => Err("no valid correct option".to_string()),
                _ => Err("single choice question has several correct options".to_string()),
            }
        }
        "fill_in_blank" | "fill_in_the_blank" | "fill_in_blanks" | "cloze" => {
            let mut answers: Vec<String> = raw
                .answers
                .into_iter()
                .chain(answer_strings(&raw.correct))
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect();
            answers.dedup();
            if answers.is_empty() {
                return Err("fill-in-the-blank question without answers".to_string());
            }
            Ok(QuizQuestion::FillInBlank { prompt, answers })
        }
        other => Err(format!("unknown question type '{}'", other)),
    }
}

fn clean_options(options: Vec<String>) -> Result<Vec<String>, String> {
    let options: Vec<String> = options
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();
    if options.len() < 2 {
        return Err(format!("needs at least two options, got {}", options.len()));
    }
    Ok(options)
}

/// Resolve `correct` given as an index, a list of indices, option text, or a
/// list of option texts.
fn correct_indices(correct: &Value, options: &[String]) -> Vec<usize> {
    let resolve = |value: &Value| -> Option<usize> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .map(|i| i as usize)
                .filter(|i| *i < options.len()),
            Value::String(s) => options
                .iter()
                .position(|o| o.eq_ignore_ascii_case(s.trim()))
                .or_else(|| s.trim().parse::<usize>().ok().filter(|i| *i < options.len())),
            _ => None,
        }
    };
    match correct {
        Value::Array(values) => values.iter().filter_map(resolve).collect(),
        Value::Null => Vec::new(),
        value => resolve(value).into_iter().collect(),
    }
}

fn answer_strings(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(values) => values
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_choice_accepts_option_text_as_answer() {
        let raw = r#"[{"type": "multiple_choice", "question": "Which are Copy?",
            "options": ["i32", "String", "bool"], "correct": ["i32", "bool"]}]"#;
        let questions = parse_questions(raw, 10).unwrap();
        assert_eq!(
            questions[0],
            QuizQuestion::MultipleChoice {
                prompt: "Which are Copy?".into(),
                options: vec!["i32".into(), "String".into(), "bool".into()],
                correct: vec![0, 2],
            }
        );
    }

    #[test]
    fn invalid_questions_are_dropped() {
        let raw = r#"{"questions": [
            {"type": "single_choice", "question": "Only one option", "options": ["a"], "correct": 0},
            {"type": "essay", "question": "Discuss."},
            {"type": "single_choice", "question": "Out of range", "options": ["a", "b"], "correct": 5},
            {"type": "Fill-In-Blank", "question": "A ___ owns a value.", "correct": "variable"}
        ]}"#;
        let questions = parse_questions(raw, 10).unwrap();
        assert_eq!(questions.len(), 1);
        assert!(matches!(&questions[0], QuizQuestion::FillInBlank { answers, .. } if answers == &["variable"]));
    }

    #[test]
    fn extras_are_truncated() {
        let one = r#"{"type": "fill_in_blank", "question": "x ___", "answers": ["y"]}"#;
        let raw = format!("[{}]", vec![one; 14].join(","));
        assert_eq!(parse_questions(&raw, MAX_QUIZ_QUESTIONS).unwrap().len(), 10);
    }

    #[test]
    fn no_usable_questions_is_partial_content() {
        let err = parse_questions(r#"{"questions": []}"#, 10).unwrap_err();
        assert!(matches!(err.kind, GenerationErrorKind::PartialContent(_)));
        let err = parse_questions("not json at all", 10).unwrap_err();
        assert!(matches!(err.kind, GenerationErrorKind::PartialContent(_)));
    }

    #[test]
    fn assignment_requires_both_fields() {
        let draft = parse_assignment("```json\n{\"title\": \" Build a bank \", \"content\": \"<p>Steps</p>\"}\n```").unwrap();
        assert_eq!(draft.title, "Build a bank");
        assert!(parse_assignment(r#"{"title": "", "content": "x"}"#).is_err());
        assert!(parse_assignment("no json").is_err());
    }
}
