//! Catalog identifiers and the helpers derived from them.
//!
//! Every key used against the manifest maps goes through [`Ident::sanitize`];
//! nothing else constructs an identifier.

use std::fmt;

use serde::Serialize;

/// A sanitized, URL-safe identifier: lowercase `[a-z0-9-_]` with no run of
/// two or more hyphens.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Ident(String);

impl Ident {
  /// Normalize an arbitrary string into an identifier. Lossy and total:
  /// anything outside the allowed alphabet is stripped, runs of hyphens
  /// collapse to one. Empty input stays empty. Idempotent.
  pub fn sanitize(raw: &str) -> Ident {
    let mut out = String::with_capacity(raw.len());
    let mut prev_hyphen = false;
    for ch in raw.chars().flat_map(char::to_lowercase) {
      let keep = matches!(ch, 'a'..='z' | '0'..='9' | '-' | '_');
      if !keep {
        continue;
      }
      if ch == '-' {
        if prev_hyphen {
          continue;
        }
        prev_hyphen = true;
      } else {
        prev_hyphen = false;
      }
      out.push(ch);
    }
    Ident(out)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Ident {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl AsRef<str> for Ident {
  fn as_ref(&self) -> &str {
    &self.0
  }
}

/// Title-casing fallback when a record carries no explicit title:
/// split the id on `-`/`_`, capitalize each token, join with spaces.
pub fn fallback_title_from_id(id: &str) -> String {
  id.split(['-', '_'])
    .filter(|w| !w.is_empty())
    .map(|w| {
      let mut chars = w.chars();
      match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
      }
    })
    .collect::<Vec<_>>()
    .join(" ")
}

/// Parse a leading run of decimal digits, used by the quiz ordering rule
/// ("1-art" sorts before "2-history", numbered before unnumbered).
pub fn leading_number(id: &str) -> Option<u64> {
  let digits: String = id.chars().take_while(|c| c.is_ascii_digit()).collect();
  if digits.is_empty() {
    None
  } else {
    // Saturate rather than fail on absurdly long digit runs.
    Some(digits.parse::<u64>().unwrap_or(u64::MAX))
  }
}
