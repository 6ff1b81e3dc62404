//! Typed attribute bags attached to mixer filter configuration
//!
//! An attribute bag maps a dotted attribute name to a typed value. Names
//! are unique within a bag; inserting an existing name replaces its value.
//! The serialized form follows the JSON mapping of the mixer client
//! config (`{"attributes": {"name": {"stringValue": "..."}}}`).

use std::collections::BTreeMap;
use std::net::IpAddr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single typed attribute value
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeValue {
    /// String value
    StringValue(String),
    /// Boolean value
    BoolValue(bool),
    /// Raw bytes, base64 in JSON
    BytesValue(#[serde(with = "base64_bytes")] Vec<u8>),
    /// String to string map
    StringMapValue(StringMap),
}

/// Entries of a string map attribute
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringMap {
    /// Map entries
    #[serde(default)]
    pub entries: BTreeMap<String, String>,
}

impl AttributeValue {
    /// String attribute
    pub fn string(value: impl Into<String>) -> Self {
        Self::StringValue(value.into())
    }

    /// Boolean attribute
    pub fn bool(value: bool) -> Self {
        Self::BoolValue(value)
    }

    /// String map attribute
    pub fn string_map(entries: BTreeMap<String, String>) -> Self {
        Self::StringMapValue(StringMap { entries })
    }

    /// IP address attribute in 16-byte form.
    ///
    /// IPv4 addresses are stored IPv4-mapped. An unparseable address gives
    /// an empty byte value rather than an error.
    pub fn ip(address: &str) -> Self {
        let bytes = match address.parse::<IpAddr>() {
            Ok(IpAddr::V4(v4)) => v4.to_ipv6_mapped().octets().to_vec(),
            Ok(IpAddr::V6(v6)) => v6.octets().to_vec(),
            Err(_) => Vec::new(),
        };
        Self::BytesValue(bytes)
    }

    /// The string payload, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::StringValue(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean payload, if this is a boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::BoolValue(b) => Some(*b),
            _ => None,
        }
    }

    /// The byte payload, if this is a bytes value
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::BytesValue(b) => Some(b),
            _ => None,
        }
    }

    /// The map entries, if this is a string map value
    pub fn as_string_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::StringMapValue(m) => Some(&m.entries),
            _ => None,
        }
    }
}

/// Attribute bag keyed by attribute name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    /// Attribute values by name
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Attributes {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an attribute
    pub fn insert(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.attributes.insert(name.into(), value);
    }

    /// Insert or replace a string attribute
    pub fn insert_string(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.insert(name, AttributeValue::string(value));
    }

    /// Look up an attribute
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Look up a string attribute's payload
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttributeValue::as_str)
    }

    /// Whether an attribute is present
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the bag is empty
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
