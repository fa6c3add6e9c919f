//! Compiles a JSON-path expression once and evaluates it against any number
//! of JSON documents, normalizing the match into a flat list of strings
//! ready to be used as node property values.

use std::panic::{self, AssertUnwindSafe};

use jsonpath_rust::JsonPath;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JsonSelectError {
  #[error("invalid JSON path {path:?}: {reason}")]
  BadPath { path: String, reason: String },
  #[error("invalid JSON document: {0}")]
  BadJson(#[from] serde_json::Error),
  #[error("error evaluating JSON path: {0}")]
  EvalError(String),
}

/// A compiled JSON-path expression, ready to evaluate against many
/// documents without re-parsing the path string each time.
pub struct CompiledPath {
  normalized: String,
  inner: JsonPath,
}

impl CompiledPath {
  /// Compiles `path`. An empty path selects the whole document (`$`); a
  /// bare identifier like `foo` is equivalent to `$.foo`.
  pub fn compile(path: &str) -> Result<Self, JsonSelectError> {
    let normalized = normalize(path);
    let inner = normalized.parse::<JsonPath>().map_err(|e| {
      JsonSelectError::BadPath {
        path: path.to_string(),
        reason: e.to_string(),
      }
    })?;
    Ok(Self { normalized, inner })
  }

  pub fn as_str(&self) -> &str {
    &self.normalized
  }

  /// Evaluates the compiled path against `json`, returning the ordered
  /// list of extracted string values. Array matches yield one element per
  /// array item, in order; a single non-array match yields one element;
  /// no match yields an empty list.
  pub fn eval(&self, json: &Value) -> Result<Vec<String>, JsonSelectError> {
    let matched = panic::catch_unwind(AssertUnwindSafe(|| {
      self.inner.find(json)
    }))
    .map_err(|_| {
      JsonSelectError::EvalError(
        "JSON path evaluation panicked".to_string(),
      )
    })?;
    Ok(render(matched))
  }
}

/// Convenience one-shot entry point: compiles `path`, parses `json_text`,
/// and evaluates in one call.
pub fn select(
  path: &str,
  json_text: &str,
) -> Result<Vec<String>, JsonSelectError> {
  let compiled = CompiledPath::compile(path)?;
  let doc: Value = serde_json::from_str(json_text)?;
  compiled.eval(&doc)
}

fn normalize(path: &str) -> String {
  let trimmed = path.trim();
  if trimmed.is_empty() {
    return "$".to_string();
  }
  if trimmed.starts_with('$') {
    return trimmed.to_string();
  }
  format!("$.{trimmed}")
}

/// Renders a jsonpath match into the property-ready string list. Strings
/// are unquoted; any other scalar or composite value round-trips as its
/// compact JSON rendering.
fn render(matched: Value) -> Vec<String> {
  match matched {
    Value::Null => Vec::new(),
    Value::Array(items) => {
      items.into_iter().map(render_scalar).collect()
    }
    other => vec![render_scalar(other)],
  }
}

/// Renders a single JSON value the way a node property expects it: a JSON
/// string round-trips as the bare string, anything else round-trips as its
/// compact JSON rendering. Shared with `ds-model`'s `DefaultValue` handling
/// so both use the same asymmetry.
pub fn render_scalar(value: Value) -> String {
  match value {
    Value::String(s) => s,
    other => other.to_string(),
  }
}
