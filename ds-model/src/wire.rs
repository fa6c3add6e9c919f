//! The JSON schema used by the storage collaborator (§6). The core neither
//! parses nor emits this directly in day-to-day operation, but exposes
//! symmetric `to_wire`/`from_wire` helpers so the storage layer has one
//! place to go for the mechanical projection.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::datasource::{
  DataSource, HttpMethod, HttpSourceConfig, MissingNodeBehavior,
  RequestMode, RunParam, Schedule, SourceType,
};
use crate::reserved::{ConfigError, is_reserved};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDataSource {
  pub name: String,
  pub id: String,
  pub description: String,
  pub enabled: bool,
  pub update_timeout: u64,
  pub run_parameters: WireRunParameters,
  #[serde(rename = "type")]
  pub source_type: WireSourceType,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRunParameters {
  pub on_generation: bool,
  pub on_new_node: bool,
  pub schedule: WireSchedule,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireSchedule {
  #[serde(rename = "type")]
  pub kind: String,
  pub duration: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireSourceType {
  pub name: String,
  pub parameters: WireHttpParameters,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireHttpParameters {
  pub url: String,
  pub path: String,
  pub request_method: String,
  pub check_ssl: bool,
  pub request_timeout: u64,
  #[serde(default)]
  pub headers: Vec<WireNameValue>,
  #[serde(default)]
  pub params: Vec<WireNameValue>,
  pub request_mode: WireRequestMode,
  #[serde(default)]
  pub on_missing: Option<WireOnMissing>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireNameValue {
  pub name: String,
  pub value: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRequestMode {
  pub name: String,
  #[serde(default)]
  pub path: Option<String>,
  #[serde(default)]
  pub attribute: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireOnMissing {
  pub name: String,
  #[serde(default)]
  pub value: Option<Value>,
}

/// Parses and validates a persisted descriptor, failing with `ConfigError`
/// on a reserved id or a malformed shape (an `onMissing: defaultValue`
/// without a `value`, an unrecognized tag, etc).
pub fn from_wire(wire: WireDataSource) -> Result<DataSource, ConfigError> {
  if is_reserved(&wire.id) {
    return Err(ConfigError::ReservedId(wire.id));
  }

  let schedule = match wire.run_parameters.schedule.kind.as_str() {
    "scheduled" => Schedule::Scheduled(Duration::from_secs(
      wire.run_parameters.schedule.duration,
    )),
    "notscheduled" => Schedule::NoSchedule(Duration::from_secs(
      wire.run_parameters.schedule.duration,
    )),
    other => {
      return Err(ConfigError::MalformedDescriptor(format!(
        "unknown schedule type '{other}'"
      )));
    }
  };

  if wire.source_type.name != "HTTP" {
    return Err(ConfigError::MalformedDescriptor(format!(
      "unknown source type '{}'",
      wire.source_type.name
    )));
  }

  let params = wire.source_type.parameters;

  let method = match params.request_method.as_str() {
    "GET" => HttpMethod::Get,
    "POST" => HttpMethod::Post,
    other => {
      return Err(ConfigError::MalformedDescriptor(format!(
        "unknown requestMethod '{other}'"
      )));
    }
  };

  let request_mode = match params.request_mode.name.as_str() {
    "byNode" => RequestMode::OneRequestByNode,
    "allNodes" => {
      let sub_path = params
        .request_mode
        .path
        .clone()
        .unwrap_or_default();
      let node_attribute = params
        .request_mode
        .attribute
        .clone()
        .ok_or_else(|| {
          ConfigError::MalformedDescriptor(
            "requestMode 'allNodes' missing 'attribute'".to_string(),
          )
        })?;
      RequestMode::OneRequestAllNodes { sub_path, node_attribute }
    }
    other => {
      return Err(ConfigError::MalformedDescriptor(format!(
        "unknown requestMode '{other}'"
      )));
    }
  };

  let missing_node_behavior = match params.on_missing {
    None => MissingNodeBehavior::Delete,
    Some(WireOnMissing { name, value }) => match name.as_str() {
      "delete" => MissingNodeBehavior::Delete,
      "noChange" => MissingNodeBehavior::NoChange,
      "defaultValue" => {
        let value = value.ok_or(ConfigError::MissingDefaultValue)?;
        MissingNodeBehavior::DefaultValue(value)
      }
      other => {
        return Err(ConfigError::MalformedDescriptor(format!(
          "unknown onMissing '{other}'"
        )));
      }
    },
  };

  let headers: IndexMap<String, String> = params
    .headers
    .into_iter()
    .map(|nv| (nv.name, nv.value))
    .collect();
  let query_params: IndexMap<String, String> = params
    .params
    .into_iter()
    .map(|nv| (nv.name, nv.value))
    .collect();

  Ok(DataSource {
    id: wire.id,
    name: wire.name,
    description: wire.description,
    enabled: wire.enabled,
    update_timeout: Duration::from_secs(wire.update_timeout),
    run_param: RunParam {
      on_generation: wire.run_parameters.on_generation,
      on_new_node: wire.run_parameters.on_new_node,
      schedule,
    },
    source_type: SourceType::Http(HttpSourceConfig {
      url: params.url,
      path: params.path,
      method,
      check_ssl: params.check_ssl,
      headers,
      params: query_params,
      request_timeout: Duration::from_secs(params.request_timeout),
      request_mode,
      missing_node_behavior,
    }),
  })
}

/// The inverse mechanical projection, used when handing a `DataSource`
/// back to the storage collaborator.
pub fn to_wire(ds: &DataSource) -> WireDataSource {
  let (kind, duration) = match ds.run_param.schedule {
    Schedule::Scheduled(d) => ("scheduled", d),
    Schedule::NoSchedule(d) => ("notscheduled", d),
  };

  let SourceType::Http(http) = &ds.source_type;

  let (mode_name, mode_path, mode_attribute) = match &http.request_mode
  {
    RequestMode::OneRequestByNode => ("byNode", None, None),
    RequestMode::OneRequestAllNodes { sub_path, node_attribute } => (
      "allNodes",
      Some(sub_path.clone()),
      Some(node_attribute.clone()),
    ),
  };

  let on_missing = match &http.missing_node_behavior {
    MissingNodeBehavior::Delete => WireOnMissing {
      name: "delete".to_string(),
      value: None,
    },
    MissingNodeBehavior::NoChange => WireOnMissing {
      name: "noChange".to_string(),
      value: None,
    },
    MissingNodeBehavior::DefaultValue(v) => WireOnMissing {
      name: "defaultValue".to_string(),
      value: Some(v.clone()),
    },
  };

  WireDataSource {
    name: ds.name.clone(),
    id: ds.id.clone(),
    description: ds.description.clone(),
    enabled: ds.enabled,
    update_timeout: ds.update_timeout.as_secs(),
    run_parameters: WireRunParameters {
      on_generation: ds.run_param.on_generation,
      on_new_node: ds.run_param.on_new_node,
      schedule: WireSchedule {
        kind: kind.to_string(),
        duration: duration.as_secs(),
      },
    },
    source_type: WireSourceType {
      name: "HTTP".to_string(),
      parameters: WireHttpParameters {
        url: http.url.clone(),
        path: http.path.clone(),
        request_method: match http.method {
          HttpMethod::Get => "GET".to_string(),
          HttpMethod::Post => "POST".to_string(),
        },
        check_ssl: http.check_ssl,
        request_timeout: http.request_timeout.as_secs(),
        headers: http
          .headers
          .iter()
          .map(|(name, value)| WireNameValue {
            name: name.clone(),
            value: value.clone(),
          })
          .collect(),
        params: http
          .params
          .iter()
          .map(|(name, value)| WireNameValue {
            name: name.clone(),
            value: value.clone(),
          })
          .collect(),
        request_mode: WireRequestMode {
          name: mode_name.to_string(),
          path: mode_path,
          attribute: mode_attribute,
        },
        on_missing: Some(on_missing),
      },
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_json() -> &'static str {
    r#"{
      "name": "Public IP",
      "id": "public_ip",
      "description": "fetches the public ip",
      "enabled": true,
      "updateTimeout": 30,
      "runParameters": {
        "onGeneration": true,
        "onNewNode": true,
        "schedule": { "type": "scheduled", "duration": 300 }
      },
      "type": {
        "name": "HTTP",
        "parameters": {
          "url": "https://api.example.com/${node.id}",
          "path": "$.ip",
          "requestMethod": "GET",
          "checkSsl": true,
          "requestTimeout": 5,
          "headers": [{"name": "Accept", "value": "application/json"}],
          "params": [],
          "requestMode": { "name": "byNode" }
        }
      }
    }"#
  }

  #[test]
  fn parses_full_descriptor() {
    let wire: WireDataSource =
      serde_json::from_str(sample_json()).unwrap();
    let ds = from_wire(wire).unwrap();
    assert_eq!(ds.id, "public_ip");
    assert!(matches!(
      ds.run_param.schedule,
      Schedule::Scheduled(d) if d.as_secs() == 300
    ));
    assert_eq!(
      ds.source_type.as_http().missing_node_behavior,
      MissingNodeBehavior::Delete
    );
  }

  #[test]
  fn reserved_id_is_rejected() {
    let mut wire: WireDataSource =
      serde_json::from_str(sample_json()).unwrap();
    wire.id = "hostname".to_string();
    let err = from_wire(wire).unwrap_err();
    assert!(matches!(err, ConfigError::ReservedId(_)));
  }

  #[test]
  fn default_value_without_value_is_an_error() {
    let mut wire: WireDataSource =
      serde_json::from_str(sample_json()).unwrap();
    wire.source_type.parameters.on_missing = Some(WireOnMissing {
      name: "defaultValue".to_string(),
      value: None,
    });
    let err = from_wire(wire).unwrap_err();
    assert!(matches!(err, ConfigError::MissingDefaultValue));
  }

  #[test]
  fn round_trips_through_wire() {
    let wire: WireDataSource =
      serde_json::from_str(sample_json()).unwrap();
    let ds = from_wire(wire).unwrap();
    let wire_again = to_wire(&ds);
    let ds_again = from_wire(wire_again).unwrap();
    assert_eq!(ds, ds_again);
  }
}
