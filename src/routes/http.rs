//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs include parameters and basic result info.

use std::sync::Arc;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::{info, instrument};

use crate::error::QuizFileError;
use crate::logic::{self, OpError};
use crate::protocol::*;
use crate::state::AppState;

/// Map an operation failure to a status + JSON error body.
fn op_error(err: OpError) -> (StatusCode, Json<ErrorOut>) {
  let status = match &err {
    OpError::Catalog(_) => StatusCode::SERVICE_UNAVAILABLE,
    OpError::QuizFile(QuizFileError::Unavailable(_)) => StatusCode::NOT_FOUND,
    OpError::QuizFile(QuizFileError::Malformed(_)) => StatusCode::UNPROCESSABLE_ENTITY,
    OpError::UnknownAttempt => StatusCode::NOT_FOUND,
    OpError::NoTip => StatusCode::BAD_REQUEST,
  };
  (status, Json(ErrorOut { message: err.to_string() }))
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_menu(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  match logic::menu(&state).await {
    Ok(subjects) => {
      info!(target: "catalog", subjects = subjects.len(), "HTTP menu served");
      Json(serde_json::json!({ "subjects": subjects })).into_response()
    }
    Err(e) => op_error(e).into_response(),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_reload(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  match logic::reload_catalog(&state).await {
    Ok(out) => Json(out).into_response(),
    Err(e) => op_error(e).into_response(),
  }
}

#[instrument(level = "info", skip(state, body), fields(quiz = body.quiz.as_deref().unwrap_or("<default>")))]
pub async fn http_post_attempt(
  State(state): State<Arc<AppState>>,
  Json(body): Json<OpenQuizIn>,
) -> impl IntoResponse {
  match logic::open_quiz(&state, body.quiz.as_deref(), None).await {
    Ok(opened) => {
      info!(target: "attempt", quiz = %opened.quiz.id, attempt_id = %opened.attempt_id, "HTTP attempt opened");
      Json(AttemptOut {
        attempt_id: opened.attempt_id,
        quiz: opened.quiz,
        legacy_redirect: opened.legacy_redirect,
      })
      .into_response()
    }
    Err(e) => op_error(e).into_response(),
  }
}

#[instrument(level = "info", skip(state, body), fields(%body.attempt_id))]
pub async fn http_post_close(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CloseIn>,
) -> impl IntoResponse {
  match logic::close_attempt(&state, body.attempt_id).await {
    Ok(()) => Json(CloseOut { released: true }).into_response(),
    Err(e) => op_error(e).into_response(),
  }
}

#[instrument(level = "info", skip(state, body), fields(%body.attempt_id, question = body.question))]
pub async fn http_post_tip(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TipIn>,
) -> impl IntoResponse {
  match logic::reveal_tip(&state, body.attempt_id, body.question).await {
    Ok(text) => Json(TipOut { question: body.question, text }).into_response(),
    Err(e) => op_error(e).into_response(),
  }
}

#[instrument(level = "info", skip(state, body), fields(%body.attempt_id, answers = body.answers.len()))]
pub async fn http_post_check(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CheckIn>,
) -> impl IntoResponse {
  match logic::check_attempt(&state, body.attempt_id, &body.answers).await {
    Ok(result) => Json(result).into_response(),
    Err(e) => op_error(e).into_response(),
  }
}
