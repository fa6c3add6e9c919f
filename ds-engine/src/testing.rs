//! In-memory collaborator implementations for tests, both this crate's own
//! and downstream integration tests. Not behind a feature flag, matching
//! how small this surface is; a larger one would earn its own crate.

use std::collections::HashMap;

use async_trait::async_trait;
use ds_model::{DataSource, NodeInfo, NodeProperty, Parameter, UpdateCause};
use tokio::sync::Mutex;

use crate::repository::{DataSourceRepository, NodeInventory, NodePropertyWriter, ParameterStore};

#[derive(Default)]
pub struct FakeDataSourceRepository {
  sources: Mutex<HashMap<String, DataSource>>,
}

#[async_trait]
impl DataSourceRepository for FakeDataSourceRepository {
  async fn get_all(&self) -> anyhow::Result<Vec<DataSource>> {
    Ok(self.sources.lock().await.values().cloned().collect())
  }

  async fn get(&self, id: &str) -> anyhow::Result<Option<DataSource>> {
    Ok(self.sources.lock().await.get(id).cloned())
  }

  async fn save(&self, source: DataSource) -> anyhow::Result<()> {
    self.sources.lock().await.insert(source.id.clone(), source);
    Ok(())
  }

  async fn delete(&self, id: &str) -> anyhow::Result<()> {
    self.sources.lock().await.remove(id);
    Ok(())
  }
}

#[derive(Default)]
pub struct FakeNodeInventory {
  nodes: HashMap<String, NodeInfo>,
}

impl FakeNodeInventory {
  pub fn add_node(&mut self, node: NodeInfo) {
    self.nodes.insert(node.id.clone(), node);
  }
}

#[async_trait]
impl NodeInventory for FakeNodeInventory {
  async fn list_nodes(&self) -> anyhow::Result<HashMap<String, NodeInfo>> {
    Ok(self.nodes.clone())
  }

  async fn get_node(&self, id: &str) -> anyhow::Result<Option<NodeInfo>> {
    Ok(self.nodes.get(id).cloned())
  }
}

#[derive(Default)]
pub struct FakeParameterStore {
  parameters: Vec<Parameter>,
}

impl FakeParameterStore {
  pub fn with_parameters(parameters: Vec<Parameter>) -> Self {
    Self { parameters }
  }
}

#[async_trait]
impl ParameterStore for FakeParameterStore {
  async fn list_parameters(&self) -> anyhow::Result<Vec<Parameter>> {
    Ok(self.parameters.clone())
  }
}

/// Records every write as `(source_id, node_id, value)` - `source_id` comes
/// from `NodeProperty::name`, which `run_node_query` sets to the data
/// source id.
#[derive(Default)]
pub struct RecordingPropertyWriter {
  pub writes: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl NodePropertyWriter for RecordingPropertyWriter {
  async fn write(&self, node_id: &str, property: NodeProperty, _cause: UpdateCause) -> anyhow::Result<()> {
    self.writes.lock().await.push((property.name, node_id.to_string(), property.value));
    Ok(())
  }
}

/// A writer that always fails, for exercising the executor's
/// best-effort-aggregation path.
pub struct FailingPropertyWriter;

#[async_trait]
impl NodePropertyWriter for FailingPropertyWriter {
  async fn write(&self, _node_id: &str, _property: NodeProperty, _cause: UpdateCause) -> anyhow::Result<()> {
    Err(anyhow::anyhow!("storage unavailable"))
  }
}
