//! Templated-string expansion.
//!
//! Fields like a data source's `url`, `path`, and header/param names and
//! values may contain `${...}` placeholders resolved against the node,
//! policy server, and global parameters in scope for one fan-out. This
//! crate owns that contract; callers only ever see [`Interpolator::expand`].

use std::collections::HashMap;

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InterpolationError {
  #[error("unresolved placeholder '${{{0}}}' in template")]
  UnresolvedPlaceholder(String),
  #[error("malformed placeholder in template near {0:?}")]
  Malformed(String),
}

/// The expansion contract the update engine composes over every
/// templated field. Implementations are free to support a richer
/// templating language; [`ContextInterpolator`] is the default.
pub trait Interpolator: Send + Sync {
  fn expand(&self, input: &str) -> Result<String, InterpolationError>;
}

fn placeholder_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(r"\$\{([^}]*)\}").expect("static regex is valid")
  })
}

/// Resolves `${node.<attr>}`, `${policyServer.<attr>}`, and
/// `${<parameterName>}` placeholders against the node/policy-server
/// attribute maps and the global parameter map supplied at construction.
#[derive(Debug, Clone, Default)]
pub struct ContextInterpolator {
  node: HashMap<String, String>,
  policy_server: HashMap<String, String>,
  parameters: HashMap<String, String>,
}

impl ContextInterpolator {
  pub fn new(
    node: HashMap<String, String>,
    policy_server: HashMap<String, String>,
    parameters: HashMap<String, String>,
  ) -> Self {
    Self { node, policy_server, parameters }
  }

  fn resolve(&self, key: &str) -> Option<&str> {
    if let Some(attr) = key.strip_prefix("node.") {
      return self.node.get(attr).map(String::as_str);
    }
    if let Some(attr) = key.strip_prefix("policyServer.") {
      return self.policy_server.get(attr).map(String::as_str);
    }
    self.parameters.get(key).map(String::as_str)
  }
}

impl Interpolator for ContextInterpolator {
  fn expand(&self, input: &str) -> Result<String, InterpolationError> {
    let re = placeholder_re();
    let mut out = String::with_capacity(input.len());
    let mut last_end = 0;
    for caps in re.captures_iter(input) {
      let whole = caps.get(0).unwrap();
      let key = caps.get(1).unwrap().as_str().trim();
      if key.is_empty() {
        return Err(InterpolationError::Malformed(input.to_string()));
      }
      out.push_str(&input[last_end..whole.start()]);
      let value = self.resolve(key).ok_or_else(|| {
        InterpolationError::UnresolvedPlaceholder(key.to_string())
      })?;
      out.push_str(value);
      last_end = whole.end();
    }
    out.push_str(&input[last_end..]);
    Ok(out)
  }
}
