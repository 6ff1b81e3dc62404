//! Mesh constants and naming helpers for mixer filter generation
//!
//! Single source of truth for attribute names, backend ports and the
//! cluster naming scheme. The cluster names produced here must match what
//! the cluster generator emits byte for byte, since the proxy resolves
//! transport targets by exact cluster name.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Ports and Filter Names
// =============================================================================

/// Plaintext gRPC port of the mixer check/report service.
pub const MIXER_PORT: u16 = 9091;

/// Mutual-TLS gRPC port of the mixer check/report service.
pub const MIXER_MTLS_PORT: u16 = 15004;

/// Name of the mixer filter in HTTP and network filter chains, also the
/// key of per-route filter overrides.
pub const MIXER_FILTER_NAME: &str = "mixer";

// =============================================================================
// Attribute Names
// =============================================================================

/// Identity of the proxy that produced the report.
pub const ATTR_REPORTER_UID: &str = "context.reporter.uid";

/// Whether the reporting proxy is co-located with the destination workload.
pub const ATTR_REPORTER_LOCAL: &str = "context.reporter.local";

/// Destination service hostname. Legacy attribute, still emitted.
pub const ATTR_DESTINATION_SERVICE: &str = "destination.service";

/// Destination service hostname.
pub const ATTR_DESTINATION_SERVICE_HOST: &str = "destination.service.host";

/// Destination service UID (`istio://{namespace}/services/{name}`).
pub const ATTR_DESTINATION_SERVICE_UID: &str = "destination.service.uid";

/// Destination service short name.
pub const ATTR_DESTINATION_SERVICE_NAME: &str = "destination.service.name";

/// Destination service namespace. Omitted when it cannot be derived.
pub const ATTR_DESTINATION_SERVICE_NAMESPACE: &str = "destination.service.namespace";

/// Labels of the destination workload.
pub const ATTR_DESTINATION_LABELS: &str = "destination.labels";

/// Prefix for attributes describing the traffic source.
pub const ATTR_SOURCE_PREFIX: &str = "source";

/// Prefix for attributes describing the traffic destination.
pub const ATTR_DESTINATION_PREFIX: &str = "destination";

/// Suffix of the raw IP address attribute.
pub const ATTR_IP_SUFFIX: &str = "ip";

/// Suffix of the workload UID attribute.
pub const ATTR_UID_SUFFIX: &str = "uid";

/// Suffix of the workload labels attribute.
pub const ATTR_LABELS_SUFFIX: &str = "labels";

// =============================================================================
// UID Schemes
// =============================================================================

/// Scheme of workload UIDs.
pub const KUBERNETES_UID_SCHEME: &str = "kubernetes://";

/// Scheme of service UIDs.
pub const ISTIO_UID_SCHEME: &str = "istio://";

/// Build a workload UID from a proxy ID.
pub fn workload_uid(id: &str) -> String {
    format!("{}{}", KUBERNETES_UID_SCHEME, id)
}

/// Build a service UID from a namespace and service name.
pub fn service_uid(namespace: &str, name: &str) -> String {
    format!("{}{}/services/{}", ISTIO_UID_SCHEME, namespace, name)
}

// =============================================================================
// Cluster Naming
// =============================================================================

/// Direction of traffic relative to the proxy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficDirection {
    /// Traffic arriving at the co-located workload
    Inbound,
    /// Traffic leaving the co-located workload
    Outbound,
}

impl TrafficDirection {
    /// Lowercase name used in cluster keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

impl fmt::Display for TrafficDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a cluster key: `{direction}|{port}|{subset}|{hostname}`.
pub fn build_subset_key(
    direction: TrafficDirection,
    subset: &str,
    hostname: &str,
    port: u16,
) -> String {
    format!("{}|{}|{}|{}", direction, port, subset, hostname)
}

/// Name of the outbound cluster (no subset) for a hostname and port.
pub fn outbound_cluster_name(hostname: &str, port: u16) -> String {
    build_subset_key(TrafficDirection::Outbound, "", hostname, port)
}

/// Split a `host:port` endpoint into host and port.
///
/// Accepts bracketed IPv6 hosts (`[::1]:9091`). Returns `None` when the
/// port is missing, a bracket is unbalanced, or an unbracketed host
/// contains a colon.
pub fn split_host_port(endpoint: &str) -> Option<(&str, &str)> {
    let colon = endpoint.rfind(':')?;
    let (raw_host, port) = (&endpoint[..colon], &endpoint[colon + 1..]);

    let host = if let Some(rest) = raw_host.strip_prefix('[') {
        // the closing bracket must sit right before the port separator
        let inner = rest.strip_suffix(']')?;
        if inner.contains('[') || inner.contains(']') {
            return None;
        }
        inner
    } else {
        if raw_host.contains(':') || raw_host.contains('[') || raw_host.contains(']') {
            return None;
        }
        raw_host
    };

    if port.contains('[') || port.contains(']') {
        return None;
    }

    Some((host, port))
}
