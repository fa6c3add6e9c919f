//! The top-level collaborator: owns the data source registry and the
//! scheduler for each entry, and turns inventory/generation events into
//! scheduler triggers (§4.7).

use std::collections::HashMap;
use std::sync::Arc;

use cache::CloneCache;
use ds_model::{is_reserved, ConfigError, DataSource, NodeInfo, Parameter, PartialNodeUpdate, Schedule, UpdateCause};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::executor::run_fan_out;
use crate::http_fetch::HttpTransport;
use crate::repository::{DataSourceRepository, NodeInventory, NodePropertyWriter, ParameterStore};
use crate::scheduler::{RunFn, SourceScheduler, TriggerKind, TriggerScope};

#[derive(Clone)]
struct SchedulerEntry {
  scheduler: Arc<SourceScheduler>,
  enabled: bool,
  on_generation: bool,
  on_new_node: bool,
}

pub struct UpdateManager {
  repository: Arc<dyn DataSourceRepository>,
  inventory: Arc<dyn NodeInventory>,
  parameters: Arc<dyn ParameterStore>,
  writer: Arc<dyn NodePropertyWriter>,
  transport: Arc<dyn HttpTransport>,
  config: EngineConfig,
  schedulers: CloneCache<String, SchedulerEntry>,
  mutation_lock: Mutex<()>,
}

impl UpdateManager {
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    repository: Arc<dyn DataSourceRepository>,
    inventory: Arc<dyn NodeInventory>,
    parameters: Arc<dyn ParameterStore>,
    writer: Arc<dyn NodePropertyWriter>,
    transport: Arc<dyn HttpTransport>,
    config: EngineConfig,
  ) -> Self {
    Self {
      repository,
      inventory,
      parameters,
      writer,
      transport,
      config,
      schedulers: CloneCache::default(),
      mutation_lock: Mutex::new(()),
    }
  }

  /// Loads every persisted descriptor and arms a scheduler for each, idle
  /// until `start_all` or an event hook triggers a run.
  pub async fn initialize(&self) -> anyhow::Result<()> {
    for source in self.repository.get_all().await? {
      self.install_scheduler(source).await;
    }
    Ok(())
  }

  /// Staggers the first run of every enabled periodic source, ascending by
  /// period, `boot_stagger` apart, so a cold boot doesn't fire every
  /// fan-out in the same instant.
  pub async fn start_all(&self) {
    let mut periodic: Vec<(String, SchedulerEntry)> = self
      .schedulers
      .get_entries()
      .await
      .into_iter()
      .filter(|(_, entry)| entry.enabled && entry.scheduler.schedule().is_periodic())
      .collect();
    periodic.sort_by_key(|(_, entry)| entry.scheduler.schedule().period());

    for (index, (id, entry)) in periodic.into_iter().enumerate() {
      let delay = self.config.boot_stagger * index as u32;
      let scheduler = entry.scheduler.clone();
      tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        info!(source_id = %id, "arming");
        scheduler.trigger(TriggerKind::ResetSchedule, TriggerScope::AllNodes);
      });
    }
  }

  pub async fn get_all(&self) -> anyhow::Result<Vec<DataSource>> {
    self.repository.get_all().await
  }

  pub async fn get(&self, id: &str) -> anyhow::Result<Option<DataSource>> {
    self.repository.get(id).await
  }

  /// Persists `source` and replaces its scheduler with one reflecting the
  /// new descriptor. Mutually exclusive with `delete`.
  pub async fn save(&self, source: DataSource) -> Result<(), EngineError> {
    if is_reserved(&source.id) {
      return Err(EngineError::Config(ConfigError::ReservedId(source.id)));
    }
    let _guard = self.mutation_lock.lock().await;
    self.repository.save(source.clone()).await?;
    if let Some(old) = self.schedulers.remove(&source.id).await {
      old.scheduler.cancel();
    }
    self.install_scheduler(source).await;
    Ok(())
  }

  /// Cancels the scheduler synchronously, then deletes the descriptor.
  /// Mutually exclusive with `save`.
  pub async fn delete(&self, id: &str) -> Result<(), EngineError> {
    let _guard = self.mutation_lock.lock().await;
    if let Some(entry) = self.schedulers.remove(&id.to_string()).await {
      entry.scheduler.cancel();
    }
    self.repository.delete(id).await?;
    Ok(())
  }

  pub async fn on_new_node(&self, node: NodeInfo) {
    for (_, entry) in self.schedulers.get_entries().await {
      if entry.enabled && entry.on_new_node {
        entry
          .scheduler
          .trigger(TriggerKind::FireAndForget, TriggerScope::SingleNode(node.id.clone()));
      }
    }
  }

  pub async fn on_generation_started(&self) {
    for (_, entry) in self.schedulers.get_entries().await {
      if entry.enabled && entry.on_generation {
        entry.scheduler.trigger(TriggerKind::ResetSchedule, TriggerScope::AllNodes);
      }
    }
  }

  pub async fn on_user_ask_update_all_nodes(&self) {
    for (_, entry) in self.schedulers.get_entries().await {
      if entry.enabled {
        entry.scheduler.trigger(TriggerKind::ResetSchedule, TriggerScope::AllNodes);
      }
    }
  }

  pub async fn on_user_ask_update_all_nodes_for(&self, source_id: &str) {
    if let Some(entry) = self.schedulers.get(&source_id.to_string()).await {
      if entry.enabled {
        entry.scheduler.trigger(TriggerKind::ResetSchedule, TriggerScope::AllNodes);
      }
    }
  }

  pub async fn on_user_ask_update_node(&self, node_id: &str) {
    for (_, entry) in self.schedulers.get_entries().await {
      if entry.enabled {
        entry
          .scheduler
          .trigger(TriggerKind::FireAndForget, TriggerScope::SingleNode(node_id.to_string()));
      }
    }
  }

  pub async fn on_user_ask_update_node_for(&self, source_id: &str, node_id: &str) {
    if let Some(entry) = self.schedulers.get(&source_id.to_string()).await {
      if entry.enabled {
        entry
          .scheduler
          .trigger(TriggerKind::FireAndForget, TriggerScope::SingleNode(node_id.to_string()));
      }
    }
  }

  async fn install_scheduler(&self, source: DataSource) {
    let entry = SchedulerEntry {
      enabled: source.enabled,
      on_generation: source.run_param.on_generation,
      on_new_node: source.run_param.on_new_node,
      scheduler: Arc::new(self.spawn_scheduler(&source)),
    };
    self.schedulers.insert(source.id.clone(), entry).await;
  }

  fn spawn_scheduler(&self, source: &DataSource) -> SourceScheduler {
    // A disabled source keeps its registry entry (so its id stays
    // reserved) but is armed with no periodic timer, and every event hook
    // above skips disabled entries - so it never fires on its own.
    let effective_schedule = if source.enabled {
      source.run_param.schedule
    } else {
      Schedule::NoSchedule(source.run_param.schedule.period())
    };
    SourceScheduler::spawn(source.id.clone(), effective_schedule, self.make_run_fn(source.clone()))
  }

  fn make_run_fn(&self, source: DataSource) -> RunFn {
    let inventory = self.inventory.clone();
    let parameters = self.parameters.clone();
    let writer = self.writer.clone();
    let transport = self.transport.clone();
    let max_parallel = self.config.max_parallel_node_queries;
    let user_agent = self.config.http_user_agent.clone();

    Arc::new(move |scope: TriggerScope| {
      let source = source.clone();
      let inventory = inventory.clone();
      let parameters = parameters.clone();
      let writer = writer.clone();
      let transport = transport.clone();
      let user_agent = user_agent.clone();
      Box::pin(async move {
        let update = match resolve_partial_update(inventory.as_ref(), parameters.as_ref(), &scope).await {
          Ok(update) => update,
          Err(e) => {
            error!(source_id = %source.id, error = %e, "failed resolving node set");
            return;
          }
        };

        let cause = UpdateCause {
          modification_id: uuid::Uuid::new_v4().to_string(),
          actor: "ds-engine".to_string(),
          reason: Some(format!("{scope:?}")),
        };

        let http = source.source_type.as_http();
        let started = std::time::Instant::now();
        let outcome = run_fan_out(
          transport,
          writer,
          &source.id,
          http,
          &update,
          &cause,
          source.update_timeout,
          max_parallel,
          &user_agent,
        )
        .await;
        let elapsed = started.elapsed();

        match &outcome.error {
          None => info!(
            source_id = %source.id, nodes_updated = outcome.updated.len(), elapsed = ?elapsed,
            "refresh completed"
          ),
          Some(err) => error!(
            source_id = %source.id, nodes_updated = outcome.updated.len(), elapsed = ?elapsed, error = %err,
            "refresh completed with errors"
          ),
        }
      })
    })
  }
}

async fn resolve_partial_update(
  inventory: &dyn NodeInventory,
  parameters: &dyn ParameterStore,
  scope: &TriggerScope,
) -> anyhow::Result<PartialNodeUpdate> {
  let parameter_list: Vec<Parameter> = parameters.list_parameters().await?;

  match scope {
    TriggerScope::AllNodes => {
      let nodes = inventory.list_nodes().await?;
      let mut policy_servers = HashMap::new();
      for node in nodes.values() {
        if policy_servers.contains_key(&node.policy_server_id) {
          continue;
        }
        if let Some(policy_server) = inventory.get_node(&node.policy_server_id).await? {
          policy_servers.insert(node.policy_server_id.clone(), policy_server);
        }
      }
      Ok(PartialNodeUpdate { nodes, policy_servers, parameters: parameter_list })
    }
    TriggerScope::SingleNode(node_id) => {
      let node = inventory
        .get_node(node_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!(EngineError::NodeNotFound(node_id.clone())))?;
      let mut policy_servers = HashMap::new();
      if let Some(policy_server) = inventory.get_node(&node.policy_server_id).await? {
        policy_servers.insert(node.policy_server_id.clone(), policy_server);
      }
      let mut nodes = HashMap::new();
      nodes.insert(node_id.clone(), node);
      Ok(PartialNodeUpdate { nodes, policy_servers, parameters: parameter_list })
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{FakeDataSourceRepository, FakeNodeInventory, FakeParameterStore, RecordingPropertyWriter};
  use crate::http_fetch::{FetchOutcome, FetchRequest, HttpTransport};
  use async_trait::async_trait;
  use ds_model::{HttpMethod, HttpSourceConfig, MissingNodeBehavior, RequestMode, RunParam, SourceType};
  use indexmap::IndexMap;
  use std::time::Duration;

  struct AlwaysSucceeds;

  #[async_trait]
  impl HttpTransport for AlwaysSucceeds {
    async fn fetch(&self, _request: FetchRequest) -> FetchOutcome {
      FetchOutcome::Success(r#"{"value":"ok"}"#.to_string())
    }
  }

  fn sample_source(id: &str, enabled: bool) -> DataSource {
    DataSource {
      id: id.to_string(),
      name: id.to_string(),
      description: String::new(),
      enabled,
      update_timeout: Duration::from_secs(5),
      run_param: RunParam {
        on_generation: true,
        on_new_node: true,
        schedule: Schedule::NoSchedule(Duration::from_secs(3600)),
      },
      source_type: SourceType::Http(HttpSourceConfig {
        url: "https://example.com".to_string(),
        path: "$.value".to_string(),
        method: HttpMethod::Get,
        check_ssl: true,
        headers: IndexMap::new(),
        params: IndexMap::new(),
        request_timeout: Duration::from_secs(5),
        request_mode: RequestMode::OneRequestByNode,
        missing_node_behavior: MissingNodeBehavior::Delete,
      }),
    }
  }

  fn manager_with(inventory: FakeNodeInventory, writer: Arc<RecordingPropertyWriter>) -> UpdateManager {
    UpdateManager::new(
      Arc::new(FakeDataSourceRepository::default()),
      Arc::new(inventory),
      Arc::new(FakeParameterStore::default()),
      writer,
      Arc::new(AlwaysSucceeds),
      EngineConfig::default(),
    )
  }

  #[tokio::test]
  async fn save_rejects_reserved_id() {
    let manager = manager_with(FakeNodeInventory::default(), Arc::new(RecordingPropertyWriter::default()));
    let err = manager.save(sample_source("hostname", true)).await.unwrap_err();
    assert!(matches!(err, EngineError::Config(ConfigError::ReservedId(_))));
  }

  #[tokio::test]
  async fn save_then_get_round_trips() {
    let manager = manager_with(FakeNodeInventory::default(), Arc::new(RecordingPropertyWriter::default()));
    manager.save(sample_source("src1", true)).await.unwrap();
    let fetched = manager.get("src1").await.unwrap();
    assert!(fetched.is_some());
  }

  #[tokio::test]
  async fn delete_removes_descriptor() {
    let manager = manager_with(FakeNodeInventory::default(), Arc::new(RecordingPropertyWriter::default()));
    manager.save(sample_source("src1", true)).await.unwrap();
    manager.delete("src1").await.unwrap();
    assert!(manager.get("src1").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn new_node_trigger_runs_only_sources_subscribed_to_it() {
    let mut inventory = FakeNodeInventory::default();
    inventory.add_node(NodeInfo { id: "n1".to_string(), policy_server_id: "ps1".to_string(), attributes: HashMap::new() });
    inventory.add_node(NodeInfo { id: "ps1".to_string(), policy_server_id: "ps1".to_string(), attributes: HashMap::new() });

    let writer = Arc::new(RecordingPropertyWriter::default());
    let manager = manager_with(inventory, writer.clone());

    let mut subscribed = sample_source("src1", true);
    subscribed.run_param.on_new_node = true;
    manager.save(subscribed).await.unwrap();

    let mut not_subscribed = sample_source("src2", true);
    not_subscribed.run_param.on_new_node = false;
    manager.save(not_subscribed).await.unwrap();

    manager
      .on_new_node(NodeInfo { id: "n1".to_string(), policy_server_id: "ps1".to_string(), attributes: HashMap::new() })
      .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let writes = writer.writes.lock().await;
    assert!(writes.iter().any(|(source_id, node_id, _)| source_id == "src1" && node_id == "n1"));
    assert!(!writes.iter().any(|(source_id, _, _)| source_id == "src2"));
  }
}
