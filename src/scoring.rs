//! Pure scoring over validated questions plus runtime answer state.
//!
//! Scoring never performs I/O and never partially scores: if any question has
//! no submission, the outcome is the unanswered list and nothing else.

use serde::Serialize;

use crate::quizfile::Question;

/// Per-question runtime state. Created fresh when a quiz is mounted,
/// discarded when it is replaced.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnswerState {
  used_tip: bool,
}

impl AnswerState {
  /// One-way latch: once the tip is revealed it stays revealed for the rest
  /// of the attempt. Revealing again is a no-op.
  pub fn reveal(&mut self) {
    self.used_tip = true;
  }

  pub fn used_tip(&self) -> bool {
    self.used_tip
  }
}

/// Detail for one incorrectly answered question, in original question order.
#[derive(Clone, Debug, Serialize)]
pub struct IncorrectDetail {
  pub prompt: String,
  pub correct_answer: String,
  pub tip: String,
}

/// A fully scored attempt.
#[derive(Clone, Debug, Serialize)]
pub struct Report {
  pub correct_count: usize,
  pub total: usize,
  /// Raw penalized score. Round with [`Report::rounded_score`] for display.
  pub score: f32,
  pub incorrect: Vec<IncorrectDetail>,
}

impl Report {
  /// One-decimal rounding for display.
  pub fn rounded_score(&self) -> f32 {
    (self.score * 10.0).round() / 10.0
  }
}

/// Outcome of a check. Incomplete attempts are refused, not scored.
#[derive(Clone, Debug)]
pub enum Outcome {
  /// 1-based positions of questions with no submission.
  Incomplete { unanswered: Vec<usize> },
  Complete(Report),
}

/// Score an attempt. `submissions[i]` is the chosen answer index for question
/// `i`, or `None` when nothing was selected; `hints[i]` carries the tip latch.
/// A chosen index outside the question's answers counts as incorrect.
pub fn score(
  questions: &[Question],
  submissions: &[Option<usize>],
  hints: &[AnswerState],
  tip_penalty: f32,
) -> Outcome {
  let mut correct_count = 0usize;
  let mut total_score = 0f32;
  let mut incorrect = Vec::new();
  let mut unanswered = Vec::new();

  for (index, question) in questions.iter().enumerate() {
    let Some(chosen) = submissions.get(index).copied().flatten() else {
      unanswered.push(index + 1);
      continue;
    };

    if chosen == question.correct_index {
      correct_count += 1;
      let used_tip = hints.get(index).is_some_and(|h| h.used_tip());
      // Floor at zero so an oversized penalty never scores negative.
      total_score += if used_tip { (1.0 - tip_penalty).max(0.0) } else { 1.0 };
    } else {
      incorrect.push(IncorrectDetail {
        prompt: question.prompt.clone(),
        correct_answer: question.answers[question.correct_index].clone(),
        tip: question.tip.clone(),
      });
    }
  }

  if !unanswered.is_empty() {
    return Outcome::Incomplete { unanswered };
  }

  Outcome::Complete(Report {
    correct_count,
    total: questions.len(),
    score: total_score,
    incorrect,
  })
}
