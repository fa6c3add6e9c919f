use std::collections::HashMap;

/// The minimal projection of node inventory data the engine needs: enough
/// to resolve the policy server and to build interpolation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
  pub id: String,
  pub policy_server_id: String,
  pub attributes: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
  pub name: String,
  pub value: String,
}

/// Pre-resolved working set for one fan-out: the caller (the application
/// embedding the engine) queries inventory and parameters once up front so
/// the executor never re-queries them mid-run.
#[derive(Debug, Clone, Default)]
pub struct PartialNodeUpdate {
  pub nodes: HashMap<String, NodeInfo>,
  pub policy_servers: HashMap<String, NodeInfo>,
  pub parameters: Vec<Parameter>,
}

impl PartialNodeUpdate {
  pub fn parameters_by_name(&self) -> HashMap<String, String> {
    self
      .parameters
      .iter()
      .map(|p| (p.name.clone(), p.value.clone()))
      .collect()
  }
}
