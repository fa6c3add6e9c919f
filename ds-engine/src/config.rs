use std::time::Duration;

/// Engine-wide knobs that are not per-data-source. Defaults match §4 of the
/// spec this engine implements.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Ceiling on in-flight per-node queries across the whole engine, not
  /// per source.
  pub max_parallel_node_queries: usize,
  /// Delay between successive periodic sources armed at boot, to avoid a
  /// thundering herd of fan-outs firing together.
  pub boot_stagger: Duration,
  pub http_user_agent: String,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      max_parallel_node_queries: 50,
      boot_stagger: Duration::from_secs(60),
      http_user_agent: "ds-engine/0.1".to_string(),
    }
  }
}
