use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
  Registry, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
  #[default]
  Standard,
  Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
  #[serde(default = "default_level")]
  pub level: String,
  #[serde(default)]
  pub format: LogFormat,
  #[serde(default = "default_ansi")]
  pub ansi: bool,
}

fn default_level() -> String {
  "info".to_string()
}

fn default_ansi() -> bool {
  true
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_level(),
      format: LogFormat::default(),
      ansi: default_ansi(),
    }
  }
}

/// Initializes the global tracing subscriber. Should be called exactly
/// once, as early as possible in `main`.
pub fn init(config: &LogConfig) -> anyhow::Result<()> {
  let level: LevelFilter = config
    .level
    .parse()
    .context("invalid log level in LogConfig")?;

  let registry = Registry::default().with(level);

  match config.format {
    LogFormat::Standard => registry
      .with(
        tracing_subscriber::fmt::layer()
          .with_target(false)
          .with_ansi(config.ansi),
      )
      .try_init(),
    LogFormat::Json => {
      registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    }
  }
  .context("failed to init logger")
}
