use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ds_engine::testing::{FakeDataSourceRepository, FakeNodeInventory, FakeParameterStore, RecordingPropertyWriter};
use ds_engine::{EngineConfig, FetchOutcome, FetchRequest, HttpTransport, UpdateManager};
use ds_model::{
  DataSource, HttpMethod, HttpSourceConfig, MissingNodeBehavior, NodeInfo, RequestMode, RunParam, Schedule,
  SourceType,
};
use indexmap::IndexMap;

struct ScriptedTransport {
  outcome: FetchOutcome,
  calls: Arc<AtomicUsize>,
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
  async fn fetch(&self, _request: FetchRequest) -> FetchOutcome {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.outcome.clone()
  }
}

fn http_source(id: &str, enabled: bool, missing: MissingNodeBehavior) -> DataSource {
  DataSource {
    id: id.to_string(),
    name: id.to_string(),
    description: "test source".to_string(),
    enabled,
    update_timeout: Duration::from_secs(5),
    run_param: RunParam {
      on_generation: true,
      on_new_node: true,
      schedule: Schedule::NoSchedule(Duration::from_secs(3600)),
    },
    source_type: SourceType::Http(HttpSourceConfig {
      url: "https://inventory.example.com/${node.id}".to_string(),
      path: "$.publicIp".to_string(),
      method: HttpMethod::Get,
      check_ssl: true,
      headers: IndexMap::new(),
      params: IndexMap::new(),
      request_timeout: Duration::from_secs(5),
      request_mode: RequestMode::OneRequestByNode,
      missing_node_behavior: missing,
    }),
  }
}

fn two_node_inventory() -> FakeNodeInventory {
  let mut inventory = FakeNodeInventory::default();
  inventory.add_node(NodeInfo {
    id: "policy-server".to_string(),
    policy_server_id: "policy-server".to_string(),
    attributes: HashMap::new(),
  });
  inventory.add_node(NodeInfo {
    id: "node-a".to_string(),
    policy_server_id: "policy-server".to_string(),
    attributes: HashMap::new(),
  });
  inventory.add_node(NodeInfo {
    id: "node-b".to_string(),
    policy_server_id: "policy-server".to_string(),
    attributes: HashMap::new(),
  });
  inventory
}

#[tokio::test]
async fn operator_refresh_writes_a_property_per_node() {
  let transport = Arc::new(ScriptedTransport {
    outcome: FetchOutcome::Success(r#"{"publicIp":"203.0.113.5"}"#.to_string()),
    calls: Arc::new(AtomicUsize::new(0)),
  });
  let writer = Arc::new(RecordingPropertyWriter::default());

  let manager = UpdateManager::new(
    Arc::new(FakeDataSourceRepository::default()),
    Arc::new(two_node_inventory()),
    Arc::new(FakeParameterStore::default()),
    writer.clone(),
    transport,
    EngineConfig::default(),
  );

  manager.initialize().await.unwrap();
  manager
    .save(http_source("public_ip", true, MissingNodeBehavior::Delete))
    .await
    .unwrap();

  manager.on_user_ask_update_all_nodes_for("public_ip").await;
  tokio::time::sleep(Duration::from_millis(100)).await;

  let writes = writer.writes.lock().await;
  assert_eq!(writes.len(), 2);
  assert!(writes.iter().all(|(source, _, value)| source == "public_ip" && value == "203.0.113.5"));
}

#[tokio::test]
async fn disabled_source_never_fires_on_any_event() {
  let transport = Arc::new(ScriptedTransport {
    outcome: FetchOutcome::Success(r#"{"publicIp":"203.0.113.5"}"#.to_string()),
    calls: Arc::new(AtomicUsize::new(0)),
  });
  let writer = Arc::new(RecordingPropertyWriter::default());
  let calls = transport.calls.clone();

  let manager = UpdateManager::new(
    Arc::new(FakeDataSourceRepository::default()),
    Arc::new(two_node_inventory()),
    Arc::new(FakeParameterStore::default()),
    writer,
    transport,
    EngineConfig::default(),
  );

  manager
    .save(http_source("public_ip", false, MissingNodeBehavior::Delete))
    .await
    .unwrap();

  manager.on_generation_started().await;
  manager.on_user_ask_update_all_nodes().await;
  tokio::time::sleep(Duration::from_millis(100)).await;

  assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_node_with_default_value_writes_the_default() {
  let transport = Arc::new(ScriptedTransport {
    outcome: FetchOutcome::NotFound,
    calls: Arc::new(AtomicUsize::new(0)),
  });
  let writer = Arc::new(RecordingPropertyWriter::default());

  let manager = UpdateManager::new(
    Arc::new(FakeDataSourceRepository::default()),
    Arc::new(two_node_inventory()),
    Arc::new(FakeParameterStore::default()),
    writer.clone(),
    transport,
    EngineConfig::default(),
  );

  manager
    .save(http_source(
      "public_ip",
      true,
      MissingNodeBehavior::DefaultValue(serde_json::json!("unknown")),
    ))
    .await
    .unwrap();

  manager.on_user_ask_update_all_nodes_for("public_ip").await;
  tokio::time::sleep(Duration::from_millis(100)).await;

  let writes = writer.writes.lock().await;
  assert_eq!(writes.len(), 2);
  assert!(writes.iter().all(|(_, _, value)| value == "unknown"));
}

#[tokio::test]
async fn deleting_a_source_stops_further_event_driven_runs() {
  let transport = Arc::new(ScriptedTransport {
    outcome: FetchOutcome::Success(r#"{"publicIp":"1.2.3.4"}"#.to_string()),
    calls: Arc::new(AtomicUsize::new(0)),
  });
  let writer = Arc::new(RecordingPropertyWriter::default());
  let calls = transport.calls.clone();

  let manager = UpdateManager::new(
    Arc::new(FakeDataSourceRepository::default()),
    Arc::new(two_node_inventory()),
    Arc::new(FakeParameterStore::default()),
    writer,
    transport,
    EngineConfig::default(),
  );

  manager
    .save(http_source("public_ip", true, MissingNodeBehavior::Delete))
    .await
    .unwrap();
  manager.delete("public_ip").await.unwrap();

  manager.on_user_ask_update_all_nodes().await;
  tokio::time::sleep(Duration::from_millis(100)).await;

  assert_eq!(calls.load(Ordering::SeqCst), 0);
  assert!(manager.get("public_ip").await.unwrap().is_none());
}
