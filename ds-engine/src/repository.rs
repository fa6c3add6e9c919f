//! The collaborator traits the embedding application implements. The
//! engine owns scheduling and extraction; it never talks to a database or
//! a node inventory service directly.

use std::collections::HashMap;

use async_trait::async_trait;
use ds_model::{DataSource, NodeInfo, NodeProperty, Parameter, UpdateCause};

#[async_trait]
pub trait DataSourceRepository: Send + Sync {
  async fn get_all(&self) -> anyhow::Result<Vec<DataSource>>;
  async fn get(&self, id: &str) -> anyhow::Result<Option<DataSource>>;
  async fn save(&self, source: DataSource) -> anyhow::Result<()>;
  async fn delete(&self, id: &str) -> anyhow::Result<()>;
}

#[async_trait]
pub trait NodeInventory: Send + Sync {
  async fn list_nodes(&self) -> anyhow::Result<HashMap<String, NodeInfo>>;
  async fn get_node(&self, id: &str) -> anyhow::Result<Option<NodeInfo>>;
}

#[async_trait]
pub trait ParameterStore: Send + Sync {
  async fn list_parameters(&self) -> anyhow::Result<Vec<Parameter>>;
}

#[async_trait]
pub trait NodePropertyWriter: Send + Sync {
  async fn write(
    &self,
    node_id: &str,
    property: NodeProperty,
    cause: UpdateCause,
  ) -> anyhow::Result<()>;
}
