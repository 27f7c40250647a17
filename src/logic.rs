//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Serving the subject-grouped menu
//!   - Opening a quiz (resolve → load file → validate → mount an attempt)
//!   - Revealing a tip (one-way latch per question)
//!   - Checking an attempt (fail-closed on unanswered questions)

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::catalog::Provenance;
use crate::error::{CatalogError, QuizFileError};
use crate::ident::Ident;
use crate::protocol::{to_check_out, to_menu, to_quiz_out, CheckOut, QuizOut, ReloadOut, SubjectOut};
use crate::scoring::{self, Outcome};
use crate::state::AppState;

/// Operation-level failures surfaced to clients. Catalog failures leave no
/// partial menu; quiz-file failures are fatal only for that navigation.
#[derive(Debug, Error)]
pub enum OpError {
  #[error(transparent)]
  Catalog(#[from] CatalogError),
  #[error(transparent)]
  QuizFile(#[from] QuizFileError),
  #[error("unknown attemptId")]
  UnknownAttempt,
  #[error("question has no tip to reveal")]
  NoTip,
}

pub struct OpenedQuiz {
  pub attempt_id: Uuid,
  pub quiz: QuizOut,
  /// Canonical id when the request resolved via a legacy identifier.
  pub legacy_redirect: Option<String>,
}

#[instrument(level = "info", skip(state))]
pub async fn menu(state: &AppState) -> Result<Vec<SubjectOut>, OpError> {
  let manifest = state.manifest().await?;
  Ok(to_menu(&manifest))
}

#[instrument(level = "info", skip(state))]
pub async fn reload_catalog(state: &AppState) -> Result<ReloadOut, OpError> {
  let manifest = state.load_catalog().await?;
  Ok(ReloadOut {
    subjects: manifest.subjects.len(),
    quizzes: manifest.quizzes.len(),
    legacy_collisions: manifest.legacy_collisions,
  })
}

/// Resolve and mount a quiz. An absent or unsanitizable identifier falls
/// back to the configured default quiz, as does an identifier neither lookup
/// map knows. `replaces` names a previous attempt the caller is navigating
/// away from; it is released unconditionally, whether or not the new quiz
/// mounts.
#[instrument(level = "info", skip(state, replaces))]
pub async fn open_quiz(
  state: &AppState,
  requested: Option<&str>,
  replaces: Option<Uuid>,
) -> Result<OpenedQuiz, OpError> {
  // Release the previous attempt before any fallible step, so a failed open
  // can never leave it registered behind a session that forgot its id.
  if let Some(prev) = replaces {
    state.remove_attempt(prev).await;
  }

  let manifest = state.manifest().await?;

  let sanitized = Ident::sanitize(requested.unwrap_or(""));
  let effective = if sanitized.is_empty() {
    state.config.default_quiz_id.clone()
  } else {
    sanitized.to_string()
  };

  let resolved = manifest.resolve(&effective).or_else(|| {
    if effective != state.config.default_quiz_id {
      info!(target: "catalog", requested = %effective, fallback = %state.config.default_quiz_id, "Quiz not found; serving the default quiz");
      manifest.resolve(&state.config.default_quiz_id)
    } else {
      None
    }
  });

  let (quiz_id, path, legacy_redirect) = match &resolved {
    Some(hit) => (
      hit.quiz.id.clone(),
      hit.quiz.path.clone(),
      matches!(hit.provenance, Provenance::Legacy).then(|| hit.quiz.id.to_string()),
    ),
    None => {
      // Not even the default quiz is listed; try its file directly.
      let id = Ident::sanitize(&state.config.default_quiz_id);
      let path = format!("{id}.json");
      (id, path, None)
    }
  };

  let config = Arc::new(state.load_quiz_file(&path).await?);

  let attempt_id = state.create_attempt(quiz_id.clone(), config.clone()).await;
  info!(target: "attempt", quiz = %quiz_id, %attempt_id, questions = config.questions.len(), "Quiz mounted");

  Ok(OpenedQuiz {
    attempt_id,
    quiz: to_quiz_out(quiz_id.as_str(), &config),
    legacy_redirect,
  })
}

/// Release an attempt a client is done with. HTTP clients have no session,
/// so this is their discard path.
#[instrument(level = "info", skip(state), fields(%attempt_id))]
pub async fn close_attempt(state: &AppState, attempt_id: Uuid) -> Result<(), OpError> {
  if state.remove_attempt(attempt_id).await {
    Ok(())
  } else {
    Err(OpError::UnknownAttempt)
  }
}

/// Reveal the tip for one question (0-based). Latching is one-way; repeat
/// reveals return the same text with no further effect.
#[instrument(level = "info", skip(state), fields(%attempt_id, question))]
pub async fn reveal_tip(state: &AppState, attempt_id: Uuid, question: usize) -> Result<String, OpError> {
  match state.reveal_tip(attempt_id, question).await {
    Some(text) => {
      info!(target: "attempt", %attempt_id, question, "Tip revealed");
      Ok(text)
    }
    None => {
      if state.snapshot_attempt(attempt_id).await.is_none() {
        Err(OpError::UnknownAttempt)
      } else {
        Err(OpError::NoTip)
      }
    }
  }
}

/// Score an attempt against a submission snapshot. Incomplete attempts come
/// back as `CheckOut::Incomplete`, never as a partial score.
#[instrument(level = "info", skip(state, answers), fields(%attempt_id, answers = answers.len()))]
pub async fn check_attempt(
  state: &AppState,
  attempt_id: Uuid,
  answers: &[Option<usize>],
) -> Result<CheckOut, OpError> {
  let (quiz_id, config, hints) = state
    .snapshot_attempt(attempt_id)
    .await
    .ok_or(OpError::UnknownAttempt)?;

  let outcome = scoring::score(&config.questions, answers, &hints, config.settings.tip_penalty);
  match &outcome {
    Outcome::Incomplete { unanswered } => {
      info!(target: "attempt", quiz = %quiz_id, %attempt_id, unanswered = unanswered.len(), "Check refused: incomplete attempt");
    }
    Outcome::Complete(report) => {
      info!(target: "attempt", quiz = %quiz_id, %attempt_id, correct = report.correct_count, total = report.total, score = %format!("{:.1}", report.rounded_score()), "Attempt checked");
    }
  }
  Ok(to_check_out(&outcome))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ServerConfig;
  use serde_json::json;
  use std::fs;
  use std::path::PathBuf;

  // Each test writes its own quiz directory under the system temp dir.
  fn quiz_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("quizhub-test-{}", Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create quiz dir");
    dir
  }

  fn write_json(dir: &PathBuf, name: &str, value: &serde_json::Value) {
    if let Some(parent) = dir.join(name).parent() {
      fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(dir.join(name), serde_json::to_string(value).expect("json")).expect("write");
  }

  fn state_for(dir: &PathBuf, default_quiz_id: &str) -> AppState {
    AppState::new(ServerConfig {
      quiz_dir: dir.to_string_lossy().into_owned(),
      manifest_file: "quizzes.json".into(),
      default_quiz_id: default_quiz_id.into(),
    })
  }

  fn sample_quiz() -> serde_json::Value {
    json!({
      "title": "Algebra",
      "tipPenalty": 0.4,
      "questions": [
        { "prompt": "2+2?", "answers": ["3", "4"], "correctIndex": 1, "tip": "count" },
        { "prompt": "3*3?", "answers": ["9", "6"], "correctIndex": 0 }
      ]
    })
  }

  #[tokio::test]
  async fn open_check_and_tip_flow() {
    let dir = quiz_dir();
    write_json(
      &dir,
      "quizzes.json",
      &json!({ "subjects": [ { "id": "math", "order": 1, "quizzes": [{ "id": "algebra" }] } ] }),
    );
    write_json(&dir, "algebra.json", &sample_quiz());
    let state = state_for(&dir, "math-algebra");

    let opened = open_quiz(&state, Some("math-algebra"), None).await.expect("open");
    assert_eq!(opened.quiz.id, "math-algebra");
    assert!(opened.legacy_redirect.is_none());
    assert_eq!(opened.quiz.questions.len(), 2);
    // Public view hides correctness, exposes tip presence only.
    assert!(opened.quiz.questions[0].has_tip);
    assert!(!opened.quiz.questions[1].has_tip);

    // Incomplete submission is refused.
    let out = check_attempt(&state, opened.attempt_id, &[Some(1), None]).await.expect("check");
    let CheckOut::Incomplete { unanswered, .. } = out else { panic!("expected incomplete") };
    assert_eq!(unanswered, vec![2]);

    // Reveal the tip for question 0; revealing twice changes nothing.
    let tip = reveal_tip(&state, opened.attempt_id, 0).await.expect("tip");
    assert_eq!(tip, "count");
    let tip = reveal_tip(&state, opened.attempt_id, 0).await.expect("tip again");
    assert_eq!(tip, "count");
    // Question 1 has no tip to reveal.
    assert!(matches!(reveal_tip(&state, opened.attempt_id, 1).await, Err(OpError::NoTip)));

    // Both correct, one tip used at penalty 0.4 → 1 + 0.6.
    let out = check_attempt(&state, opened.attempt_id, &[Some(1), Some(0)]).await.expect("check");
    let CheckOut::Complete { correct_count, total, score, incorrect } = out else {
      panic!("expected complete")
    };
    assert_eq!(correct_count, 2);
    assert_eq!(total, 2);
    assert_eq!(score, 1.6);
    assert!(incorrect.is_empty());

    fs::remove_dir_all(&dir).ok();
  }

  #[tokio::test]
  async fn legacy_lookup_reports_redirect_and_unknown_falls_back_to_default() {
    let dir = quiz_dir();
    write_json(
      &dir,
      "quizzes.json",
      &json!({ "subjects": [ { "id": "math", "order": 1, "quizzes": [{ "id": "algebra" }] } ] }),
    );
    write_json(&dir, "algebra.json", &sample_quiz());
    let state = state_for(&dir, "math-algebra");

    let opened = open_quiz(&state, Some("algebra"), None).await.expect("open via legacy");
    assert_eq!(opened.legacy_redirect.as_deref(), Some("math-algebra"));

    let opened = open_quiz(&state, Some("no-such-quiz"), None).await.expect("fallback");
    assert_eq!(opened.quiz.id, "math-algebra");
    assert!(opened.legacy_redirect.is_none());

    let opened = open_quiz(&state, None, None).await.expect("default");
    assert_eq!(opened.quiz.id, "math-algebra");

    fs::remove_dir_all(&dir).ok();
  }

  #[tokio::test]
  async fn replacing_a_quiz_releases_the_previous_attempt() {
    let dir = quiz_dir();
    write_json(
      &dir,
      "quizzes.json",
      &json!({ "subjects": [ { "id": "math", "order": 1,
        "quizzes": [{ "id": "algebra" }, { "id": "geometry" }] } ] }),
    );
    write_json(&dir, "algebra.json", &sample_quiz());
    write_json(&dir, "geometry.json", &sample_quiz());
    let state = state_for(&dir, "math-algebra");

    let first = open_quiz(&state, Some("math-algebra"), None).await.expect("first");
    reveal_tip(&state, first.attempt_id, 0).await.expect("tip");

    let second = open_quiz(&state, Some("math-geometry"), Some(first.attempt_id))
      .await
      .expect("second");
    assert_ne!(first.attempt_id, second.attempt_id);
    // The discarded attempt is gone; its hint state cannot leak anywhere.
    assert!(matches!(
      check_attempt(&state, first.attempt_id, &[Some(1), Some(0)]).await,
      Err(OpError::UnknownAttempt)
    ));
    // The fresh attempt starts with tips hidden: full score, no penalty.
    let out = check_attempt(&state, second.attempt_id, &[Some(1), Some(0)]).await.expect("check");
    let CheckOut::Complete { score, .. } = out else { panic!("expected complete") };
    assert_eq!(score, 2.0);

    fs::remove_dir_all(&dir).ok();
  }

  #[tokio::test]
  async fn failed_open_still_releases_the_replaced_attempt() {
    let dir = quiz_dir();
    write_json(
      &dir,
      "quizzes.json",
      &json!({ "subjects": [ { "id": "math", "order": 1,
        "quizzes": [{ "id": "algebra" }, { "id": "broken" }] } ] }),
    );
    write_json(&dir, "algebra.json", &sample_quiz());
    write_json(&dir, "broken.json", &json!({ "questions": [] }));
    let state = state_for(&dir, "math-algebra");

    let first = open_quiz(&state, Some("math-algebra"), None).await.expect("first");
    // Navigating to a quiz whose file fails validation: the open fails, but
    // the attempt being navigated away from must not stay registered.
    assert!(open_quiz(&state, Some("math-broken"), Some(first.attempt_id)).await.is_err());
    assert!(state.snapshot_attempt(first.attempt_id).await.is_none());

    fs::remove_dir_all(&dir).ok();
  }

  #[tokio::test]
  async fn closing_an_attempt_releases_it() {
    let dir = quiz_dir();
    write_json(
      &dir,
      "quizzes.json",
      &json!({ "subjects": [ { "id": "math", "order": 1, "quizzes": [{ "id": "algebra" }] } ] }),
    );
    write_json(&dir, "algebra.json", &sample_quiz());
    let state = state_for(&dir, "math-algebra");

    let opened = open_quiz(&state, Some("math-algebra"), None).await.expect("open");
    close_attempt(&state, opened.attempt_id).await.expect("close");
    assert!(matches!(
      check_attempt(&state, opened.attempt_id, &[Some(1), Some(0)]).await,
      Err(OpError::UnknownAttempt)
    ));
    // Closing twice reports the attempt as unknown.
    assert!(matches!(
      close_attempt(&state, opened.attempt_id).await,
      Err(OpError::UnknownAttempt)
    ));

    fs::remove_dir_all(&dir).ok();
  }

  #[tokio::test]
  async fn broken_quiz_file_is_fatal_for_that_navigation_only() {
    let dir = quiz_dir();
    write_json(
      &dir,
      "quizzes.json",
      &json!({ "subjects": [ { "id": "math", "order": 1,
        "quizzes": [{ "id": "algebra" }, { "id": "broken" }] } ] }),
    );
    write_json(&dir, "algebra.json", &sample_quiz());
    write_json(&dir, "broken.json", &json!({ "questions": [] }));
    let state = state_for(&dir, "math-algebra");

    assert!(matches!(
      open_quiz(&state, Some("math-broken"), None).await,
      Err(OpError::QuizFile(QuizFileError::Malformed(_)))
    ));
    // The catalog stays usable.
    assert!(open_quiz(&state, Some("math-algebra"), None).await.is_ok());
    assert!(menu(&state).await.is_ok());

    fs::remove_dir_all(&dir).ok();
  }

  #[tokio::test]
  async fn missing_manifest_means_catalog_unavailable() {
    let dir = quiz_dir();
    let state = state_for(&dir, "anything");
    assert!(matches!(menu(&state).await, Err(OpError::Catalog(CatalogError::Unavailable(_)))));
    fs::remove_dir_all(&dir).ok();
  }
}
