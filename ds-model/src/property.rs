/// Audit metadata attached to every property write this system performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCause {
  pub modification_id: String,
  pub actor: String,
  pub reason: Option<String>,
}

/// A `(name, value, provider)` triple written to a node. `provider`
/// identifies this system so the node-property writer can refuse
/// overwrites from other writers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeProperty {
  pub name: String,
  pub value: String,
  pub provider: Option<String>,
}

/// The provider tag this system stamps on every property it writes.
pub const PROVIDER: &str = "datasources";

impl NodeProperty {
  pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      value: value.into(),
      provider: Some(PROVIDER.to_string()),
    }
  }
}
