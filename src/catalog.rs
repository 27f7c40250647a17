//! Manifest normalization and quiz resolution.
//!
//! A raw catalog document (hierarchical subjects→quizzes, or the legacy flat
//! quiz list) is reconciled into one canonical [`Manifest`]: ordered subjects,
//! an ordered flattened quiz list, and two key→index maps over that single
//! list (current id and legacy id). Built once per load, never mutated; a
//! reload replaces the whole value.
//!
//! Per-record failures never fail the batch: a subject or quiz that cannot
//! yield a usable identifier is dropped and debug-logged. Only a document
//! that is not a JSON object at all is fatal.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::CatalogError;
use crate::ident::{fallback_title_from_id, leading_number, Ident};

/// Reserved id of the implicit subject synthesized for legacy flat manifests.
pub const DEFAULT_SUBJECT_ID: &str = "general";
/// Fixed title of the implicit subject.
pub const DEFAULT_SUBJECT_TITLE: &str = "General Quizzes";

/// A named grouping of quizzes. `quizzes` holds indexes into
/// [`Manifest::quizzes`], in within-subject order.
#[derive(Clone, Debug)]
pub struct Subject {
  pub id: Ident,
  pub title: String,
  pub description: String,
  pub summary: String,
  /// Explicit ordering key; `None` sorts after every numeric order.
  pub order: Option<f64>,
  pub path: String,
  pub quizzes: Vec<usize>,
}

/// One catalog quiz record.
#[derive(Clone, Debug)]
pub struct QuizEntry {
  pub id: Ident,
  /// The quiz's original short id prior to subject-prefixing. Kept for
  /// backward-compatible lookups.
  pub legacy_id: Ident,
  pub title: String,
  pub description: String,
  pub source_url: String,
  pub author: String,
  pub summary: String,
  /// Storage locator, relative to the quiz directory.
  pub path: String,
  pub subject_id: Ident,
  pub subject_title: String,
  pub subject_order: f64,
}

/// The normalized, queryable index over the catalog.
#[derive(Clone, Debug, Default)]
pub struct Manifest {
  pub subjects: Vec<Subject>,
  /// Canonical store: every quiz lives here exactly once. Ordered by subject
  /// order, then subject title, then the per-quiz comparator.
  pub quizzes: Vec<QuizEntry>,
  map_by_id: HashMap<Ident, usize>,
  map_by_legacy_id: HashMap<Ident, usize>,
  /// How many legacy-id keys were overwritten while building the lookup map.
  /// Last-registered wins; this only records that it happened.
  pub legacy_collisions: usize,
}

/// How a lookup succeeded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provenance {
  Canonical,
  Legacy,
}

/// A successful lookup, with its provenance.
#[derive(Debug)]
pub struct Resolved<'a> {
  pub quiz: &'a QuizEntry,
  pub provenance: Provenance,
}

impl Manifest {
  /// Look up a quiz by a raw identifier. The input is sanitized, the current
  /// id map is consulted first, then the legacy map. A legacy hit is an
  /// observability signal, not an error.
  pub fn resolve(&self, raw_id: &str) -> Option<Resolved<'_>> {
    let id = Ident::sanitize(raw_id);
    if id.is_empty() {
      return None;
    }
    if let Some(&idx) = self.map_by_id.get(&id) {
      return Some(Resolved { quiz: &self.quizzes[idx], provenance: Provenance::Canonical });
    }
    if let Some(&idx) = self.map_by_legacy_id.get(&id) {
      let quiz = &self.quizzes[idx];
      warn!(target: "catalog", requested = %id, canonical = %quiz.id, "Resolved via legacy identifier; prefer the canonical id");
      return Some(Resolved { quiz, provenance: Provenance::Legacy });
    }
    None
  }

  pub fn get(&self, id: &Ident) -> Option<&QuizEntry> {
    self.map_by_id.get(id).map(|&idx| &self.quizzes[idx])
  }
}

// Why a raw record was dropped during normalization.
enum Skip {
  NotAnObject,
  NoUsableId,
}

impl Skip {
  fn reason(&self) -> &'static str {
    match self {
      Skip::NotAnObject => "record is not an object",
      Skip::NoUsableId => "no sanitizable identifier",
    }
  }
}

fn str_field<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
  obj.get(key).and_then(Value::as_str)
}

/// Non-empty string field, or `None`. Empty strings count as absent so the
/// title/id fallback chains behave like the manifest tooling expects.
fn nonempty_field<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
  str_field(obj, key).filter(|s| !s.is_empty())
}

fn finite_number_field(obj: &Value, key: &str) -> Option<f64> {
  obj.get(key).and_then(Value::as_f64).filter(|n| n.is_finite())
}

/// File stem of a manifest path: directories and a trailing `.json` stripped.
fn path_basename(path: &str) -> &str {
  let name = path.rsplit('/').next().unwrap_or(path);
  name.strip_suffix(".json").unwrap_or(name)
}

// Case-insensitive title ordering. See DESIGN.md for the locale note.
fn cmp_titles(a: &str, b: &str) -> Ordering {
  a.to_lowercase().cmp(&b.to_lowercase())
}

/// Within-subject quiz ordering: a leading decimal run on the legacy id (or
/// id) compares numerically, numbered entries sort before unnumbered ones,
/// titles break every remaining tie.
fn cmp_quizzes(a: &QuizEntry, b: &QuizEntry) -> Ordering {
  let a_source = if a.legacy_id.is_empty() { &a.id } else { &a.legacy_id };
  let b_source = if b.legacy_id.is_empty() { &b.id } else { &b.legacy_id };

  match (leading_number(a_source.as_str()), leading_number(b_source.as_str())) {
    (Some(an), Some(bn)) => an.cmp(&bn).then_with(|| cmp_titles(&a.title, &b.title)),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => cmp_titles(&a.title, &b.title),
  }
}

/// Global list ordering: subject order, then subject title across subjects,
/// then the within-subject comparator.
fn cmp_global(a: &QuizEntry, b: &QuizEntry) -> Ordering {
  match a.subject_order.partial_cmp(&b.subject_order).unwrap_or(Ordering::Equal) {
    Ordering::Equal => {}
    other => return other,
  }
  if a.subject_id != b.subject_id {
    return cmp_titles(&a.subject_title, &b.subject_title);
  }
  cmp_quizzes(a, b)
}

// Subject fields gathered before its quizzes are processed.
struct SubjectCtx {
  id: Ident,
  title: String,
  description: String,
  summary: String,
  order: Option<f64>,
  path: String,
  raw_quizzes: Vec<Value>,
}

fn normalize_subject(raw: &Value) -> Result<SubjectCtx, Skip> {
  if !raw.is_object() {
    return Err(Skip::NotAnObject);
  }

  // Fallback chain for the identifier source: id, then path, then title.
  let raw_id = nonempty_field(raw, "id")
    .or_else(|| nonempty_field(raw, "path"))
    .or_else(|| nonempty_field(raw, "title"))
    .unwrap_or("");
  let id = Ident::sanitize(raw_id);
  if id.is_empty() {
    return Err(Skip::NoUsableId);
  }

  let title = nonempty_field(raw, "title")
    .map(str::to_string)
    .unwrap_or_else(|| fallback_title_from_id(id.as_str()));

  Ok(SubjectCtx {
    title,
    description: str_field(raw, "description").unwrap_or("").to_string(),
    summary: str_field(raw, "summary").unwrap_or("").to_string(),
    order: finite_number_field(raw, "order"),
    path: str_field(raw, "path").unwrap_or("").to_string(),
    raw_quizzes: raw
      .get("quizzes")
      .and_then(Value::as_array)
      .cloned()
      .unwrap_or_default(),
    id,
  })
}

fn normalize_quiz(raw: &Value, ctx: &SubjectCtx, implicit_subject: bool) -> Result<QuizEntry, Skip> {
  if !raw.is_object() {
    return Err(Skip::NotAnObject);
  }

  // The legacy id comes first: the quiz's own declared id, or the filename
  // stem. The final id is derived from it below.
  let legacy_raw = nonempty_field(raw, "legacyId")
    .or_else(|| nonempty_field(raw, "id"))
    .or_else(|| nonempty_field(raw, "path").map(path_basename))
    .unwrap_or("");
  let legacy_id = Ident::sanitize(legacy_raw);
  if legacy_id.is_empty() {
    return Err(Skip::NoUsableId);
  }

  // Quizzes under the implicit subject keep their short id; everything else
  // is subject-prefixed (and re-sanitized) so the same short name can exist
  // in several subjects.
  let id = if implicit_subject {
    legacy_id.clone()
  } else {
    Ident::sanitize(&format!("{}-{}", ctx.id, legacy_id))
  };

  let title = nonempty_field(raw, "title")
    .map(str::to_string)
    .unwrap_or_else(|| fallback_title_from_id(legacy_id.as_str()));

  let explicit_path = str_field(raw, "path")
    .unwrap_or("")
    .trim_start_matches('/')
    .to_string();
  let path = if explicit_path.is_empty() {
    format!("{legacy_id}.json")
  } else {
    explicit_path
  };

  Ok(QuizEntry {
    id,
    legacy_id,
    title,
    description: str_field(raw, "description").unwrap_or("").to_string(),
    source_url: str_field(raw, "sourceUrl").unwrap_or("").to_string(),
    author: str_field(raw, "author").unwrap_or("").to_string(),
    summary: str_field(raw, "summary").unwrap_or("").to_string(),
    path,
    subject_id: ctx.id.clone(),
    subject_title: ctx.title.clone(),
    subject_order: ctx.order.unwrap_or(f64::INFINITY),
  })
}

fn implicit_subject_ctx(raw_quizzes: Vec<Value>) -> SubjectCtx {
  SubjectCtx {
    id: Ident::sanitize(DEFAULT_SUBJECT_ID),
    title: DEFAULT_SUBJECT_TITLE.to_string(),
    description: String::new(),
    summary: String::new(),
    // Sorts below every explicit subject.
    order: Some(f64::NEG_INFINITY),
    path: String::new(),
    raw_quizzes,
  }
}

/// Normalize a raw catalog document into a [`Manifest`].
///
/// Two shapes are accepted: `{subjects: [...]}` (hierarchical) and
/// `{quizzes: [...]}` (legacy flat, folded under the implicit subject).
pub fn normalize(raw: &Value) -> Result<Manifest, CatalogError> {
  if !raw.is_object() {
    return Err(CatalogError::NotAnObject);
  }

  let raw_subjects = raw.get("subjects").and_then(Value::as_array);

  // Per-record normalization is an explicit fold over Ok/Skip outcomes:
  // one bad record never fails the batch.
  let subject_ctxs: Vec<SubjectCtx> = match raw_subjects {
    Some(list) => list
      .iter()
      .filter_map(|value| match normalize_subject(value) {
        Ok(ctx) => Some(ctx),
        Err(skip) => {
          debug!(target: "catalog", reason = skip.reason(), "Dropping subject record");
          None
        }
      })
      .collect(),
    None => {
      let raw_quizzes = raw
        .get("quizzes")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
      vec![implicit_subject_ctx(raw_quizzes)]
    }
  };
  let implicit = raw_subjects.is_none();

  let mut subjects_with_quizzes: Vec<(SubjectCtx, Vec<QuizEntry>)> = subject_ctxs
    .into_iter()
    .map(|ctx| {
      let mut quizzes: Vec<QuizEntry> = ctx
        .raw_quizzes
        .iter()
        .filter_map(|value| match normalize_quiz(value, &ctx, implicit) {
          Ok(quiz) => Some(quiz),
          Err(skip) => {
            debug!(target: "catalog", subject = %ctx.id, reason = skip.reason(), "Dropping quiz record");
            None
          }
        })
        .collect();
      quizzes.sort_by(cmp_quizzes);
      (ctx, quizzes)
    })
    .collect();

  // Subjects: explicit order ascending, missing order last, titles break ties.
  subjects_with_quizzes.sort_by(|(a, _), (b, _)| {
    let oa = a.order.unwrap_or(f64::INFINITY);
    let ob = b.order.unwrap_or(f64::INFINITY);
    oa.partial_cmp(&ob)
      .unwrap_or(Ordering::Equal)
      .then_with(|| cmp_titles(&a.title, &b.title))
  });

  // Flatten into the canonical store, then apply the global ordering.
  let mut quizzes: Vec<QuizEntry> = Vec::new();
  let mut subjects: Vec<Subject> = Vec::new();
  for (ctx, subject_quizzes) in subjects_with_quizzes {
    quizzes.extend(subject_quizzes);
    subjects.push(Subject {
      id: ctx.id,
      title: ctx.title,
      description: ctx.description,
      summary: ctx.summary,
      order: ctx.order,
      path: ctx.path,
      quizzes: Vec::new(),
    });
  }
  quizzes.sort_by(cmp_global);

  // Rebuild per-subject index lists and both lookup maps in one pass over
  // the final ordered list. Later entries overwrite earlier ones on key
  // collision; that is accepted, counted, and warned about.
  let mut map_by_id: HashMap<Ident, usize> = HashMap::with_capacity(quizzes.len());
  let mut map_by_legacy_id: HashMap<Ident, usize> = HashMap::with_capacity(quizzes.len());
  let mut legacy_collisions = 0usize;
  for (idx, quiz) in quizzes.iter().enumerate() {
    if let Some(subject) = subjects.iter_mut().find(|s| s.id == quiz.subject_id) {
      subject.quizzes.push(idx);
    }
    if map_by_id.insert(quiz.id.clone(), idx).is_some() {
      warn!(target: "catalog", id = %quiz.id, "Duplicate quiz id; last registered wins");
    }
    if !quiz.legacy_id.is_empty() {
      if let Some(prev) = map_by_legacy_id.insert(quiz.legacy_id.clone(), idx) {
        legacy_collisions += 1;
        warn!(target: "catalog", legacy_id = %quiz.legacy_id, winner = %quiz.id, loser = %quizzes[prev].id, "Legacy id collision; last registered wins");
      }
    }
  }

  Ok(Manifest {
    subjects,
    quizzes,
    map_by_id,
    map_by_legacy_id,
    legacy_collisions,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn hierarchical_manifest_prefixes_quiz_ids_with_subject() {
    let raw = json!({
      "subjects": [
        { "id": "math", "order": 1, "quizzes": [{ "id": "algebra" }] }
      ]
    });
    let manifest = normalize(&raw).expect("manifest");

    assert_eq!(manifest.quizzes.len(), 1);
    let quiz = &manifest.quizzes[0];
    assert_eq!(quiz.id.as_str(), "math-algebra");
    assert_eq!(quiz.legacy_id.as_str(), "algebra");
    assert_eq!(quiz.path, "algebra.json");
    assert_eq!(quiz.subject_title, "Math");

    let by_id = manifest.resolve("math-algebra").expect("canonical hit");
    assert_eq!(by_id.provenance, Provenance::Canonical);
    let by_legacy = manifest.resolve("algebra").expect("legacy hit");
    assert_eq!(by_legacy.provenance, Provenance::Legacy);
    assert_eq!(by_legacy.quiz.id.as_str(), "math-algebra");
  }

  #[test]
  fn legacy_flat_manifest_gets_implicit_subject_and_number_ordering() {
    let raw = json!({ "quizzes": [{ "id": "2-history" }, { "id": "1-art" }] });
    let manifest = normalize(&raw).expect("manifest");

    assert_eq!(manifest.subjects.len(), 1);
    let subject = &manifest.subjects[0];
    assert_eq!(subject.id.as_str(), DEFAULT_SUBJECT_ID);
    assert_eq!(subject.title, DEFAULT_SUBJECT_TITLE);

    let ids: Vec<&str> = manifest.quizzes.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, vec!["1-art", "2-history"]);
    // Implicit subject: final id is the legacy id, no prefixing.
    assert!(manifest.resolve("1-art").is_some());
  }

  #[test]
  fn subjects_sort_by_order_then_title_with_missing_order_last() {
    let raw = json!({
      "subjects": [
        { "id": "b", "order": 2, "quizzes": [] },
        { "id": "c", "quizzes": [] },
        { "id": "a", "order": 1, "quizzes": [] }
      ]
    });
    let manifest = normalize(&raw).expect("manifest");
    let ids: Vec<&str> = manifest.subjects.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
  }

  #[test]
  fn global_list_orders_by_subject_then_quiz_comparator() {
    let raw = json!({
      "subjects": [
        { "id": "late", "title": "Late", "order": 5,
          "quizzes": [{ "id": "zz" }, { "id": "1-first" }] },
        { "id": "early", "title": "Early", "order": 1,
          "quizzes": [{ "id": "beta" }, { "id": "alpha" }] }
      ]
    });
    let manifest = normalize(&raw).expect("manifest");
    let ids: Vec<&str> = manifest.quizzes.iter().map(|q| q.id.as_str()).collect();
    // "early" first by order; unnumbered quizzes by title; numbered before
    // unnumbered inside "late".
    assert_eq!(ids, vec!["early-alpha", "early-beta", "late-1-first", "late-zz"]);
  }

  #[test]
  fn bad_records_are_dropped_without_failing_the_batch() {
    let raw = json!({
      "subjects": [
        { "id": "!!!", "quizzes": [{ "id": "lost" }] },
        42,
        { "id": "ok", "quizzes": [{ "title": "No id here, no path" }, { "id": "kept" }] }
      ]
    });
    let manifest = normalize(&raw).expect("manifest");
    assert_eq!(manifest.subjects.len(), 1);
    assert_eq!(manifest.quizzes.len(), 1);
    assert_eq!(manifest.quizzes[0].id.as_str(), "ok-kept");
  }

  #[test]
  fn quiz_without_title_falls_back_to_id_and_path_basename_is_used() {
    let raw = json!({
      "subjects": [
        { "id": "history", "order": 1,
          "quizzes": [{ "path": "/history/1-ancient-rome.json" }] }
      ]
    });
    let manifest = normalize(&raw).expect("manifest");
    let quiz = &manifest.quizzes[0];
    assert_eq!(quiz.legacy_id.as_str(), "1-ancient-rome");
    assert_eq!(quiz.id.as_str(), "history-1-ancient-rome");
    assert_eq!(quiz.title, "1 Ancient Rome");
    // Explicit path survives with the leading slash stripped.
    assert_eq!(quiz.path, "history/1-ancient-rome.json");
  }

  #[test]
  fn subject_id_falls_back_to_path_then_title() {
    let raw = json!({
      "subjects": [
        { "path": "geo", "quizzes": [] },
        { "title": "Fine Arts!", "quizzes": [] }
      ]
    });
    let manifest = normalize(&raw).expect("manifest");
    let ids: Vec<&str> = manifest.subjects.iter().map(|s| s.id.as_str()).collect();
    assert!(ids.contains(&"geo"));
    assert!(ids.contains(&"finearts"));
  }

  #[test]
  fn legacy_collisions_count_and_last_write_wins() {
    let raw = json!({
      "subjects": [
        { "id": "alpha", "order": 1, "quizzes": [{ "id": "intro" }] },
        { "id": "beta", "order": 2, "quizzes": [{ "id": "intro" }] }
      ]
    });
    let manifest = normalize(&raw).expect("manifest");
    assert_eq!(manifest.legacy_collisions, 1);
    // Beta registers later in the final ordered list, so it owns the key.
    let hit = manifest.resolve("intro").expect("legacy hit");
    assert_eq!(hit.quiz.id.as_str(), "beta-intro");
    assert_eq!(hit.provenance, Provenance::Legacy);
    // Both canonical ids still resolve.
    assert!(manifest.resolve("alpha-intro").is_some());
    assert!(manifest.resolve("beta-intro").is_some());
  }

  #[test]
  fn resolve_misses_return_none() {
    let manifest = normalize(&json!({ "quizzes": [{ "id": "only" }] })).expect("manifest");
    assert!(manifest.resolve("absent").is_none());
    assert!(manifest.resolve("").is_none());
    assert!(manifest.resolve("!!!").is_none());
  }

  #[test]
  fn non_object_document_is_fatal() {
    assert!(matches!(normalize(&json!([1, 2, 3])), Err(CatalogError::NotAnObject)));
    assert!(matches!(normalize(&json!("nope")), Err(CatalogError::NotAnObject)));
  }

  #[test]
  fn empty_object_yields_implicit_subject_with_no_quizzes() {
    let manifest = normalize(&json!({})).expect("manifest");
    assert_eq!(manifest.subjects.len(), 1);
    assert!(manifest.quizzes.is_empty());
  }
}
