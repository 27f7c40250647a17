//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.
//!
//! The loop tracks the session's current attempt: opening another quiz
//! releases the previous one, and so does disconnecting.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::logic;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "quizhub_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "quizhub_backend", "WebSocket connected");
  let mut current_attempt: Option<Uuid> = None;

  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target = "quizhub_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state, &mut current_attempt).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "quizhub_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }

  // Release whatever this session still had mounted.
  if let Some(attempt_id) = current_attempt.take() {
    state.remove_attempt(attempt_id).await;
  }
  info!(target: "quizhub_backend", "WebSocket disconnected");
}

#[instrument(level = "info", skip(state, current_attempt))]
async fn handle_client_ws(
  msg: ClientWsMessage,
  state: &AppState,
  current_attempt: &mut Option<Uuid>,
) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Menu => match logic::menu(state).await {
      Ok(subjects) => {
        tracing::info!(target: "catalog", subjects = subjects.len(), "WS menu served");
        ServerWsMessage::Menu { subjects }
      }
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::OpenQuiz { quiz } => {
      match logic::open_quiz(state, quiz.as_deref(), current_attempt.take()).await {
        Ok(opened) => {
          tracing::info!(target: "attempt", quiz = %opened.quiz.id, attempt_id = %opened.attempt_id, "WS quiz opened");
          *current_attempt = Some(opened.attempt_id);
          ServerWsMessage::Quiz {
            attempt_id: opened.attempt_id,
            quiz: opened.quiz,
            legacy_redirect: opened.legacy_redirect,
          }
        }
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::RevealTip { attempt_id, question } => {
      match logic::reveal_tip(state, attempt_id, question).await {
        Ok(text) => ServerWsMessage::Tip { question, text },
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::CheckAnswers { attempt_id, answers } => {
      match logic::check_attempt(state, attempt_id, &answers).await {
        Ok(result) => ServerWsMessage::CheckResult { result },
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }
  }
}
