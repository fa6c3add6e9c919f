use thiserror::Error;

/// Property names the host system reserves for its own node inventory
/// fields. A data source may never use one of these as its id, because the
/// property it would write collides with a built-in.
pub const RESERVED_IDS: &[&str] = &[
  "hostname",
  "os_name",
  "os_version",
  "os_kernel_version",
  "architecture_description",
  "ipv4",
  "ipv6",
  "agent_version",
  "policy_server",
  "last_run_date",
  "last_inventory_date",
  "id",
];

pub fn is_reserved(id: &str) -> bool {
  RESERVED_IDS.contains(&id)
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error(
    "'{0}' is a reserved id and cannot be used for a data source"
  )]
  ReservedId(String),
  #[error("malformed data source descriptor: {0}")]
  MalformedDescriptor(String),
  #[error(
    "'onMissing' is 'defaultValue' but no 'value' was provided"
  )]
  MissingDefaultValue,
}
