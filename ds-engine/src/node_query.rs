//! Composes interpolation, HTTP fetch, and JSON extraction into the
//! per-node query described in §4.4: expand every templated field against
//! this node's context, fetch, then extract the property value (or apply
//! the missing-node policy) from the response.

use std::collections::HashMap;

use ds_model::{HttpSourceConfig, MissingNodeBehavior, NodeInfo, NodeProperty};
use indexmap::IndexMap;
use interpolate::{ContextInterpolator, Interpolator};
use jsonselect::CompiledPath;

use crate::error::EngineError;
use crate::http_fetch::{FetchOutcome, FetchRequest, HttpTransport};

pub struct NodeQueryContext<'a> {
  pub source_id: &'a str,
  pub http: &'a HttpSourceConfig,
  pub node: &'a NodeInfo,
  pub policy_server: &'a NodeInfo,
  pub parameters: &'a HashMap<String, String>,
  pub user_agent: &'a str,
}

fn expand_map(
  interpolator: &dyn Interpolator,
  map: &IndexMap<String, String>,
) -> Result<IndexMap<String, String>, EngineError> {
  let mut out = IndexMap::with_capacity(map.len());
  for (key, value) in map {
    out.insert(interpolator.expand(key)?, interpolator.expand(value)?);
  }
  Ok(out)
}

/// Runs one node's query. Returns `Ok(None)` when the missing-node policy
/// is `NoChange` and the endpoint returned 404: no property should be
/// written for this node on this run.
pub async fn run_node_query(
  transport: &dyn HttpTransport,
  ctx: NodeQueryContext<'_>,
) -> Result<Option<NodeProperty>, EngineError> {
  let interpolator = ContextInterpolator::new(
    ctx.node.attributes.clone(),
    ctx.policy_server.attributes.clone(),
    ctx.parameters.clone(),
  );

  let url = interpolator.expand(&ctx.http.url)?;
  let path = interpolator.expand(&ctx.http.path)?;
  let headers = expand_map(&interpolator, &ctx.http.headers)?;
  let params = expand_map(&interpolator, &ctx.http.params)?;

  let outcome = transport
    .fetch(FetchRequest {
      method: ctx.http.method,
      url,
      headers,
      params,
      check_ssl: ctx.http.check_ssl,
      connect_timeout: ctx.http.request_timeout,
      read_timeout: ctx.http.request_timeout,
      user_agent: ctx.user_agent.to_string(),
    })
    .await;

  let value = match outcome {
    FetchOutcome::Success(body) => {
      let compiled = CompiledPath::compile(&path)?;
      let doc: serde_json::Value = serde_json::from_str(&body)
        .map_err(jsonselect::JsonSelectError::BadJson)?;
      let values = compiled.eval(&doc)?;
      Some(values.first().cloned().unwrap_or_default())
    }
    FetchOutcome::NotFound => match &ctx.http.missing_node_behavior {
      MissingNodeBehavior::Delete => Some(String::new()),
      MissingNodeBehavior::DefaultValue(v) => {
        Some(jsonselect::render_scalar(v.clone()))
      }
      MissingNodeBehavior::NoChange => None,
    },
    FetchOutcome::HttpError(status, body) => {
      return Err(EngineError::Http { status, body });
    }
    FetchOutcome::TransportError(reason) => {
      return Err(EngineError::Transport(reason));
    }
  };

  Ok(value.map(|v| NodeProperty::new(ctx.source_id, v)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use std::time::Duration;

  struct StubTransport(FetchOutcome);

  #[async_trait]
  impl HttpTransport for StubTransport {
    async fn fetch(&self, _request: FetchRequest) -> FetchOutcome {
      self.0.clone()
    }
  }

  fn node(id: &str) -> NodeInfo {
    NodeInfo { id: id.to_string(), policy_server_id: "ps1".to_string(), attributes: HashMap::new() }
  }

  fn http() -> HttpSourceConfig {
    HttpSourceConfig {
      url: "https://example.com/${node.id}".to_string(),
      path: "$.value".to_string(),
      method: ds_model::HttpMethod::Get,
      check_ssl: true,
      headers: IndexMap::new(),
      params: IndexMap::new(),
      request_timeout: Duration::from_secs(5),
      request_mode: ds_model::RequestMode::OneRequestByNode,
      missing_node_behavior: MissingNodeBehavior::Delete,
    }
  }

  #[tokio::test]
  async fn success_extracts_value() {
    let transport =
      StubTransport(FetchOutcome::Success(r#"{"value":"42"}"#.to_string()));
    let n = node("n1");
    let ps = node("ps1");
    let params = HashMap::new();
    let http = http();
    let result = run_node_query(
      &transport,
      NodeQueryContext {
        source_id: "src",
        http: &http,
        node: &n,
        policy_server: &ps,
        parameters: &params,
        user_agent: "test",
      },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(result.value, "42");
    assert_eq!(result.name, "src");
  }

  #[tokio::test]
  async fn not_found_with_delete_policy_yields_empty_value() {
    let transport = StubTransport(FetchOutcome::NotFound);
    let n = node("n1");
    let ps = node("ps1");
    let params = HashMap::new();
    let http = http();
    let result = run_node_query(
      &transport,
      NodeQueryContext {
        source_id: "src",
        http: &http,
        node: &n,
        policy_server: &ps,
        parameters: &params,
        user_agent: "test",
      },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(result.value, "");
  }

  #[tokio::test]
  async fn not_found_with_no_change_policy_yields_no_write() {
    let transport = StubTransport(FetchOutcome::NotFound);
    let n = node("n1");
    let ps = node("ps1");
    let params = HashMap::new();
    let mut http = http();
    http.missing_node_behavior = MissingNodeBehavior::NoChange;
    let result = run_node_query(
      &transport,
      NodeQueryContext {
        source_id: "src",
        http: &http,
        node: &n,
        policy_server: &ps,
        parameters: &params,
        user_agent: "test",
      },
    )
    .await
    .unwrap();
    assert!(result.is_none());
  }

  #[tokio::test]
  async fn http_error_is_propagated() {
    let transport =
      StubTransport(FetchOutcome::HttpError(500, "boom".to_string()));
    let n = node("n1");
    let ps = node("ps1");
    let params = HashMap::new();
    let http = http();
    let err = run_node_query(
      &transport,
      NodeQueryContext {
        source_id: "src",
        http: &http,
        node: &n,
        policy_server: &ps,
        parameters: &params,
        user_agent: "test",
      },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::Http { status: 500, .. }));
  }
}
