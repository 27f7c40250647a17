//! Application state: the catalog snapshot, disk loaders, and the attempt
//! registry.
//!
//! This module owns:
//!   - the current `Arc<Manifest>` snapshot (replaced wholesale on reload,
//!     never mutated in place)
//!   - reading + parsing the manifest and quiz files from the quiz directory
//!   - live attempts (a mounted quiz with its per-question tip latches)

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::atomic::{AtomicU64, Ordering},
    sync::Arc,
};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::{self, Manifest};
use crate::config::ServerConfig;
use crate::error::{CatalogError, QuizFileError};
use crate::ident::Ident;
use crate::quizfile::{self, QuizConfig};
use crate::scoring::AnswerState;

// HTTP clients may never close their attempts; cap the registry and evict
// the oldest entry when it fills.
const MAX_LIVE_ATTEMPTS: usize = 1024;

/// A mounted quiz: one validated config plus fresh per-question state.
/// Discarded when the session opens another quiz, closes the attempt, or
/// disconnects; the oldest attempt is evicted when the registry is full.
pub struct Attempt {
    pub quiz_id: Ident,
    pub config: Arc<QuizConfig>,
    pub hints: Vec<AnswerState>,
    /// Monotonic creation order, used for oldest-first eviction.
    seq: u64,
}

pub struct AppState {
    pub config: ServerConfig,
    manifest: RwLock<Option<Arc<Manifest>>>,
    attempts: RwLock<HashMap<Uuid, Attempt>>,
    attempt_seq: AtomicU64,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            manifest: RwLock::new(None),
            attempts: RwLock::new(HashMap::new()),
            attempt_seq: AtomicU64::new(0),
        }
    }

    /// Read, parse, and normalize the manifest file, then swap the snapshot.
    /// Readers holding the previous `Arc` keep a consistent view.
    #[instrument(level = "info", skip(self))]
    pub async fn load_catalog(&self) -> Result<Arc<Manifest>, CatalogError> {
        let path = PathBuf::from(&self.config.quiz_dir).join(&self.config.manifest_file);
        let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
            error!(target: "catalog", path = %path.display(), error = %e, "Failed to read manifest file");
            CatalogError::Unavailable(format!("{}: {e}", path.display()))
        })?;
        let raw: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            error!(target: "catalog", path = %path.display(), error = %e, "Failed to parse manifest JSON");
            CatalogError::Unavailable(format!("{}: {e}", path.display()))
        })?;

        let manifest = Arc::new(catalog::normalize(&raw)?);
        info!(
            target: "catalog",
            subjects = manifest.subjects.len(),
            quizzes = manifest.quizzes.len(),
            legacy_collisions = manifest.legacy_collisions,
            "Catalog loaded"
        );

        *self.manifest.write().await = Some(manifest.clone());
        Ok(manifest)
    }

    /// Current snapshot, loading it on first demand.
    pub async fn manifest(&self) -> Result<Arc<Manifest>, CatalogError> {
        if let Some(m) = self.manifest.read().await.clone() {
            return Ok(m);
        }
        self.load_catalog().await
    }

    /// Read + parse + validate one quiz file under the quiz directory.
    #[instrument(level = "debug", skip(self))]
    pub async fn load_quiz_file(&self, rel_path: &str) -> Result<QuizConfig, QuizFileError> {
        // Manifest paths are relative locators; refuse anything that escapes.
        if rel_path.split('/').any(|seg| seg == "..") {
            return Err(QuizFileError::Unavailable(format!(
                "refusing traversal in quiz path: {rel_path}"
            )));
        }
        let path = PathBuf::from(&self.config.quiz_dir).join(rel_path);
        let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
            error!(target: "catalog", path = %path.display(), error = %e, "Failed to read quiz file");
            QuizFileError::Unavailable(format!("{rel_path}: {e}"))
        })?;
        let raw: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            error!(target: "catalog", path = %path.display(), error = %e, "Failed to parse quiz JSON");
            QuizFileError::Unavailable(format!("{rel_path}: {e}"))
        })?;
        quizfile::validate(&raw)
    }

    /// Register a freshly mounted quiz. Every question starts with its tip
    /// hidden. When the registry is at capacity the oldest attempt is
    /// evicted first.
    pub async fn create_attempt(&self, quiz_id: Ident, config: Arc<QuizConfig>) -> Uuid {
        let id = Uuid::new_v4();
        let hints = vec![AnswerState::default(); config.questions.len()];
        let seq = self.attempt_seq.fetch_add(1, Ordering::Relaxed);

        let mut attempts = self.attempts.write().await;
        if attempts.len() >= MAX_LIVE_ATTEMPTS {
            let oldest = attempts.iter().min_by_key(|(_, a)| a.seq).map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                attempts.remove(&oldest);
                warn!(target: "attempt", evicted = %oldest, "Attempt registry full; evicted oldest attempt");
            }
        }
        attempts.insert(id, Attempt { quiz_id, config, hints, seq });
        id
    }

    /// Drop an attempt, releasing its answer state. Returns whether it was
    /// still registered; already-gone ids are fine.
    pub async fn remove_attempt(&self, id: Uuid) -> bool {
        let removed = self.attempts.write().await.remove(&id).is_some();
        if removed {
            debug!(target: "attempt", %id, "Attempt released");
        }
        removed
    }

    /// Latch the tip for one question (0-based) and return its text.
    /// Revealing twice has the same effect as once.
    pub async fn reveal_tip(&self, id: Uuid, question: usize) -> Option<String> {
        let mut attempts = self.attempts.write().await;
        let attempt = attempts.get_mut(&id)?;
        let tip = attempt.config.questions.get(question)?.tip.clone();
        if tip.is_empty() {
            return None;
        }
        attempt.hints[question].reveal();
        Some(tip)
    }

    /// Immutable snapshot of an attempt for scoring: config plus the current
    /// latch states. `AnswerState` is `Copy`, so the snapshot is cheap.
    pub async fn snapshot_attempt(
        &self,
        id: Uuid,
    ) -> Option<(Ident, Arc<QuizConfig>, Vec<AnswerState>)> {
        let attempts = self.attempts.read().await;
        let attempt = attempts.get(&id)?;
        Some((attempt.quiz_id.clone(), attempt.config.clone(), attempt.hints.clone()))
    }
}
