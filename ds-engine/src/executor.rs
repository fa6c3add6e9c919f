//! Fans a single data source's query out across a node set, bounded to at
//! most `max_parallel` in-flight node queries and cut off at `deadline`
//! (§4.5). Best-effort: one node's failure never aborts the others, and
//! the run reports an aggregated error rather than failing the whole
//! fan-out.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ds_model::{HttpSourceConfig, PartialNodeUpdate, UpdateCause};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::EngineError;
use crate::http_fetch::HttpTransport;
use crate::node_query::{run_node_query, NodeQueryContext};
use crate::repository::NodePropertyWriter;

#[derive(Debug, Default)]
pub struct FanOutOutcome {
  pub updated: HashSet<String>,
  /// `;`-joined `"node_id: reason"` entries, one per failed node.
  pub error: Option<String>,
}

enum NodeOutcome {
  Written(String),
  Skipped,
  Failed(String, String),
}

/// Runs the fan-out for `source_id` over every node in `update`.
#[allow(clippy::too_many_arguments)]
pub async fn run_fan_out(
  transport: Arc<dyn HttpTransport>,
  writer: Arc<dyn NodePropertyWriter>,
  source_id: &str,
  http: &HttpSourceConfig,
  update: &PartialNodeUpdate,
  cause: &UpdateCause,
  deadline: Duration,
  max_parallel: usize,
  user_agent: &str,
) -> FanOutOutcome {
  let cancel = CancellationToken::new();
  let deadline_guard = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(deadline).await;
    deadline_guard.cancel();
  });

  let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
  let parameters = Arc::new(update.parameters_by_name());

  let mut handles = Vec::with_capacity(update.nodes.len());
  for (node_id, node) in &update.nodes {
    let node_id = node_id.clone();
    let node = node.clone();
    let policy_server = update.policy_servers.get(&node.policy_server_id).cloned();
    let http = http.clone();
    let parameters = parameters.clone();
    let transport = transport.clone();
    let writer = writer.clone();
    let cause = cause.clone();
    let source_id = source_id.to_string();
    let user_agent = user_agent.to_string();
    let semaphore = semaphore.clone();
    let cancel = cancel.clone();

    handles.push(tokio::spawn(async move {
      tokio::select! {
        biased;
        _ = cancel.cancelled() => NodeOutcome::Failed(node_id, "deadline exceeded".to_string()),
        outcome = run_one_node(
          semaphore,
          transport,
          writer,
          source_id,
          http,
          node,
          policy_server,
          parameters,
          cause,
          user_agent,
        ) => outcome,
      }
    }));
  }

  let mut updated = HashSet::new();
  let mut failures = Vec::new();
  for handle in handles {
    match handle.await {
      Ok(NodeOutcome::Written(id)) => {
        updated.insert(id);
      }
      Ok(NodeOutcome::Skipped) => {}
      Ok(NodeOutcome::Failed(id, reason)) => {
        warn!(node_id = %id, source_id, %reason, "node query failed");
        failures.push(format!("{id}: {reason}"));
      }
      Err(join_err) => {
        failures.push(format!("task panicked: {join_err}"));
      }
    }
  }

  FanOutOutcome {
    updated,
    error: if failures.is_empty() { None } else { Some(failures.join("; ")) },
  }
}

#[allow(clippy::too_many_arguments)]
async fn run_one_node(
  semaphore: Arc<Semaphore>,
  transport: Arc<dyn HttpTransport>,
  writer: Arc<dyn NodePropertyWriter>,
  source_id: String,
  http: HttpSourceConfig,
  node: ds_model::NodeInfo,
  policy_server: Option<ds_model::NodeInfo>,
  parameters: Arc<std::collections::HashMap<String, String>>,
  cause: UpdateCause,
  user_agent: String,
) -> NodeOutcome {
  let _permit = match semaphore.acquire_owned().await {
    Ok(permit) => permit,
    Err(_) => return NodeOutcome::Failed(node.id, "scheduler shut down".to_string()),
  };

  let policy_server = match policy_server {
    Some(p) => p,
    None => {
      return NodeOutcome::Failed(
        node.id.clone(),
        EngineError::PolicyServerNotFound(node.id).to_string(),
      );
    }
  };

  let result = run_node_query(
    transport.as_ref(),
    NodeQueryContext {
      source_id: &source_id,
      http: &http,
      node: &node,
      policy_server: &policy_server,
      parameters: &parameters,
      user_agent: &user_agent,
    },
  )
  .await;

  match result {
    Ok(None) => NodeOutcome::Skipped,
    Ok(Some(property)) => {
      match writer.write(&node.id, property, cause).await {
        Ok(()) => NodeOutcome::Written(node.id),
        Err(e) => NodeOutcome::Failed(node.id, e.to_string()),
      }
    }
    Err(e) => NodeOutcome::Failed(node.id, e.to_string()),
  }
}
