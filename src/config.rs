//! Server configuration from TOML.
//!
//! Every field is defaulted so the server runs without a config file; set
//! QUIZHUB_CONFIG_PATH to point at a TOML file to override. Parse/IO failures
//! are logged and the defaults are used.

use serde::Deserialize;
use tracing::{error, info};

const DEFAULT_QUIZ_DIR: &str = "./static/assets/quizzes";
const DEFAULT_MANIFEST_FILE: &str = "quizzes.json";
const DEFAULT_QUIZ_ID: &str = "art-of-speech-9-public-speaking";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  /// Directory holding the manifest and quiz JSON files.
  pub quiz_dir: String,
  /// Manifest filename inside `quiz_dir`.
  pub manifest_file: String,
  /// Quiz served when a requested identifier cannot be resolved.
  pub default_quiz_id: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      quiz_dir: DEFAULT_QUIZ_DIR.into(),
      manifest_file: DEFAULT_MANIFEST_FILE.into(),
      default_quiz_id: DEFAULT_QUIZ_ID.into(),
    }
  }
}

/// Attempt to load `ServerConfig` from QUIZHUB_CONFIG_PATH. On any parsing/IO
/// error, returns None and the caller falls back to defaults.
pub fn load_server_config_from_env() -> Option<ServerConfig> {
  let path = std::env::var("QUIZHUB_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<ServerConfig>(&s) {
      Ok(cfg) => {
        info!(target: "quizhub_backend", %path, "Loaded server config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "quizhub_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "quizhub_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
