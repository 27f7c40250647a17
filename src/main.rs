//! Quizhub · Quiz Catalog Backend
//!
//! - Axum HTTP + WebSocket API over a subject→quiz catalog
//! - Manifest normalization with dual (current/legacy) identifier lookup
//! - Hint-penalized scoring of completed attempts
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT          : u16 (default 3000)
//!   QUIZHUB_CONFIG_PATH : path to TOML config (quiz dir, default quiz id)
//!   LOG_LEVEL    : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT      : "pretty" (default) or "json"

mod telemetry;
mod error;
mod ident;
mod config;
mod catalog;
mod quizfile;
mod scoring;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info, instrument};

use crate::config::load_server_config_from_env;
use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (config + in-memory catalog/attempt stores).
  let config = load_server_config_from_env().unwrap_or_default();
  let state = Arc::new(AppState::new(config));

  // Load the catalog eagerly so the inventory shows up at startup; a failure
  // is retried on first demand, the server still comes up.
  if let Err(e) = state.load_catalog().await {
    error!(target: "catalog", error = %e, "Startup catalog load failed; will retry on demand");
  }

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "quizhub_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
