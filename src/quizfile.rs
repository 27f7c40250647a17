//! Quiz-file validation: raw quiz JSON into a [`QuizConfig`].
//!
//! Validation is all-or-nothing. One bad question invalidates the whole file,
//! and the error message names the 1-based question number. A validated
//! config is never mutated afterwards; it is discarded when another quiz is
//! shown.

use serde::Serialize;
use serde_json::Value;

use crate::error::QuizFileError;

/// Fraction of a point deducted from a correct answer whose tip was revealed.
/// Used when the quiz file does not configure one.
pub const DEFAULT_TIP_PENALTY: f32 = 0.5;

/// One validated question. `correct_index` is guaranteed to index `answers`.
#[derive(Clone, Debug, Serialize)]
pub struct Question {
  pub prompt: String,
  pub answers: Vec<String>,
  pub correct_index: usize,
  /// Optional hint body; empty when the question has none.
  pub tip: String,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct QuizSettings {
  /// Taken as configured: values outside [0, 1] are accepted.
  pub tip_penalty: f32,
}

/// A whole validated quiz file.
#[derive(Clone, Debug, Serialize)]
pub struct QuizConfig {
  pub title: String,
  pub description: String,
  pub source_url: String,
  pub author: String,
  pub settings: QuizSettings,
  pub questions: Vec<Question>,
}

fn str_or_empty(raw: &Value, key: &str) -> String {
  raw.get(key).and_then(Value::as_str).unwrap_or("").to_string()
}

fn malformed(msg: impl Into<String>) -> QuizFileError {
  QuizFileError::Malformed(msg.into())
}

fn validate_question(raw: &Value, number: usize) -> Result<Question, QuizFileError> {
  let prompt = raw
    .get("prompt")
    .and_then(Value::as_str)
    .filter(|s| !s.is_empty())
    .ok_or_else(|| malformed(format!("question {number} is missing a prompt")))?;

  let raw_answers = raw
    .get("answers")
    .and_then(Value::as_array)
    .filter(|a| !a.is_empty())
    .ok_or_else(|| malformed(format!("question {number} has no answers list")))?;

  let answers: Vec<String> = raw_answers
    .iter()
    .map(|a| a.as_str().map(str::to_string))
    .collect::<Option<_>>()
    .ok_or_else(|| malformed(format!("question {number} has an invalid answers list")))?;

  let correct = raw
    .get("correctIndex")
    .and_then(Value::as_f64)
    .ok_or_else(|| malformed(format!("question {number} must carry a numeric correctIndex")))?;

  // The scoring engine indexes answers[correct_index]; an out-of-range value
  // would be a latent panic, so it is rejected here.
  let correct_index = correct as usize;
  if correct < 0.0 || correct.fract() != 0.0 || correct_index >= answers.len() {
    return Err(malformed(format!(
      "question {number} correctIndex {correct} does not point into its answers"
    )));
  }

  Ok(Question {
    prompt: prompt.to_string(),
    answers,
    correct_index,
    tip: str_or_empty(raw, "tip"),
  })
}

/// Validate and normalize a raw quiz document.
pub fn validate(raw: &Value) -> Result<QuizConfig, QuizFileError> {
  let raw_questions = raw
    .get("questions")
    .and_then(Value::as_array)
    .ok_or_else(|| malformed("quiz file carries no questions list"))?;
  if raw_questions.is_empty() {
    return Err(malformed("quiz file carries no questions"));
  }

  let questions = raw_questions
    .iter()
    .enumerate()
    .map(|(idx, q)| validate_question(q, idx + 1))
    .collect::<Result<Vec<_>, _>>()?;

  let tip_penalty = raw
    .get("tipPenalty")
    .and_then(Value::as_f64)
    .filter(|n| n.is_finite())
    .map(|n| n as f32)
    .unwrap_or(DEFAULT_TIP_PENALTY);

  Ok(QuizConfig {
    title: str_or_empty(raw, "title"),
    description: str_or_empty(raw, "description"),
    source_url: str_or_empty(raw, "sourceUrl"),
    author: str_or_empty(raw, "author"),
    settings: QuizSettings { tip_penalty },
    questions,
  })
}
