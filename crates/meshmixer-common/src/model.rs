//! Proxy, service instance and mesh configuration model
//!
//! These are read-only inputs to filter generation. `MeshConfig` is passed
//! explicitly into every build call so the check/report matrix can be
//! exercised without environment setup.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{yaml, Error, Result};

/// Kind of proxy a workload runs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Application sidecar
    #[default]
    Sidecar,
    /// Ingress proxy
    Ingress,
    /// Standalone router / gateway
    Router,
}

impl NodeType {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sidecar => "sidecar",
            Self::Ingress => "ingress",
            Self::Router => "router",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the proxy being configured
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proxy {
    /// Proxy kind
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Workload IP address (may be empty)
    #[serde(default)]
    pub ip_address: String,
    /// Opaque workload ID, typically `{pod}.{namespace}`
    pub id: String,
    /// DNS domain suffix of the workload, e.g. `default.svc.cluster.local`
    #[serde(default)]
    pub domain: String,
}

impl Proxy {
    /// Create a new proxy identity
    pub fn new(
        node_type: NodeType,
        ip_address: impl Into<String>,
        id: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            node_type,
            ip_address: ip_address.into(),
            id: id.into(),
            domain: domain.into(),
        }
    }

    /// Whether this proxy is a standalone router / gateway
    pub fn is_router(&self) -> bool {
        self.node_type == NodeType::Router
    }
}

/// A service bound to a workload co-located with the proxy
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstance {
    /// Fully qualified service hostname
    pub hostname: String,
    /// Workload labels of the instance
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ServiceInstance {
    /// Create an instance without labels
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            labels: BTreeMap::new(),
        }
    }

    /// Attach workload labels
    pub fn with_labels<K, V>(mut self, labels: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.labels
            .extend(labels.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

/// Mesh-wide transport security mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthPolicy {
    /// Plaintext between proxies and control plane services
    #[default]
    None,
    /// Mutual TLS between proxies and control plane services
    MutualTls,
}

/// Mesh-wide settings consumed by filter generation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeshConfig {
    /// `host:port` of the mixer check service
    pub mixer_check_server: String,
    /// `host:port` of the mixer report service
    pub mixer_report_server: String,
    /// Disable policy checks everywhere in the mesh
    pub disable_policy_checks: bool,
    /// Transport security mode, selects the mixer port
    pub auth_policy: AuthPolicy,
}

impl MeshConfig {
    /// Parse mesh config from a YAML document
    ///
    /// An empty document yields the default config.
    pub fn from_yaml(input: &str) -> Result<Self> {
        let value = yaml::parse_yaml(input)
            .map_err(|e| Error::serialization_for("MeshConfig", e.to_string()))?;
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|e| Error::serialization_for("MeshConfig", e.to_string()))
    }

    /// Whether any mixer endpoint is configured at all
    pub fn has_mixer(&self) -> bool {
        !self.mixer_check_server.is_empty() || !self.mixer_report_server.is_empty()
    }
}
