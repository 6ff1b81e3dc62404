//! YAML loading for mesh configuration documents
//!
//! Parses with yaml-rust2 and converts into a `serde_json::Value` so typed
//! config structs only need serde derives.

use std::fmt;

use serde_json::{Map, Number, Value};
use yaml_rust2::{Yaml, YamlLoader};

/// Error type for YAML parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlError(String);

impl fmt::Display for YamlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid yaml: {}", self.0)
    }
}

impl std::error::Error for YamlError {}

/// Parse the first document of a YAML string into a `serde_json::Value`.
///
/// Returns `Value::Null` for empty input.
pub fn parse_yaml(input: &str) -> Result<Value, YamlError> {
    let docs = YamlLoader::load_from_str(input).map_err(|e| YamlError(e.to_string()))?;
    match docs.into_iter().next() {
        Some(doc) => to_json(doc),
        None => Ok(Value::Null),
    }
}

fn to_json(yaml: Yaml) -> Result<Value, YamlError> {
    match yaml {
        Yaml::Null => Ok(Value::Null),
        Yaml::Boolean(b) => Ok(Value::Bool(b)),
        Yaml::Integer(i) => Ok(Value::Number(i.into())),
        Yaml::Real(s) => s
            .parse::<f64>()
            .map(|f| Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null))
            .map_err(|e| YamlError(format!("{}: {}", s, e))),
        Yaml::String(s) => Ok(Value::String(s)),
        Yaml::Array(items) => items
            .into_iter()
            .map(to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Yaml::Hash(map) => map
            .into_iter()
            .map(|(k, v)| Ok((key_string(k)?, to_json(v)?)))
            .collect::<Result<Map<String, Value>, _>>()
            .map(Value::Object),
        Yaml::Alias(_) => Err(YamlError("aliases are not supported".to_string())),
        Yaml::BadValue => Err(YamlError("bad value".to_string())),
    }
}

fn key_string(key: Yaml) -> Result<String, YamlError> {
    match key {
        Yaml::String(s) | Yaml::Real(s) => Ok(s),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Boolean(b) => Ok(b.to_string()),
        _ => Err(YamlError("mapping keys must be scalars".to_string())),
    }
}
