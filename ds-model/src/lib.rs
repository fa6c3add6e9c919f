mod datasource;
mod node;
mod property;
mod reserved;
mod wire;

pub use datasource::{
  DataSource, HttpMethod, HttpSourceConfig, MissingNodeBehavior,
  RequestMode, RunParam, Schedule, SourceType,
};
pub use node::{NodeInfo, Parameter, PartialNodeUpdate};
pub use property::{NodeProperty, PROVIDER, UpdateCause};
pub use reserved::{ConfigError, RESERVED_IDS, is_reserved};
pub use wire::{
  WireDataSource, WireHttpParameters, WireNameValue, WireOnMissing,
  WireRequestMode, WireRunParameters, WireSchedule, WireSourceType,
  from_wire, to_wire,
};
