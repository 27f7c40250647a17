//! Load-error taxonomy.
//!
//! Catalog failures are fatal for every catalog-consuming operation.
//! Quiz-file failures are fatal only for that navigation; the catalog stays
//! usable. An incomplete attempt is not an error, see
//! `scoring::Outcome::Incomplete`.

use thiserror::Error;

/// Failure to produce a usable manifest.
#[derive(Debug, Error)]
pub enum CatalogError {
  /// The manifest file could not be read or parsed as JSON.
  #[error("quiz catalog unavailable: {0}")]
  Unavailable(String),

  /// The document parsed, but is not a JSON object at the top level.
  #[error("quiz catalog document is not an object")]
  NotAnObject,
}

/// Failure to produce a usable quiz config from one quiz file.
#[derive(Debug, Error)]
pub enum QuizFileError {
  /// The quiz file could not be read or parsed as JSON.
  #[error("quiz file unavailable: {0}")]
  Unavailable(String),

  /// Structural validation failed. The message names the 1-based question
  /// where applicable; one bad question invalidates the whole file.
  #[error("malformed quiz: {0}")]
  Malformed(String),
}
