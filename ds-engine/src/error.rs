use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error(transparent)]
  Config(#[from] ds_model::ConfigError),

  #[error(transparent)]
  Interpolation(#[from] interpolate::InterpolationError),

  #[error(transparent)]
  Json(#[from] jsonselect::JsonSelectError),

  #[error("node not found: {0}")]
  NodeNotFound(String),

  #[error("no policy server on record for node {0}")]
  PolicyServerNotFound(String),

  #[error("HTTP {status}: {body}")]
  Http { status: u16, body: String },

  #[error("transport error: {0}")]
  Transport(String),

  #[error(transparent)]
  Storage(#[from] anyhow::Error),
}
