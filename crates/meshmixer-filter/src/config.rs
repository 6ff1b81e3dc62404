//! Mixer client configuration produced for proxy filters
//!
//! Field names serialize in the camelCase form of the mixer client config
//! so the listener pipeline can embed them as filter config directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use meshmixer_common::store::{HttpApiSpec, QuotaSpec};
use meshmixer_common::Attributes;

/// Clusters the filter sends check and report calls to
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportConfig {
    /// Cluster for check calls
    pub check_cluster: String,
    /// Cluster for report calls
    pub report_cluster: String,
}

/// Per-destination service configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Skip check calls for this destination
    #[serde(default)]
    pub disable_check_calls: bool,
    /// Skip report calls for this destination
    #[serde(default)]
    pub disable_report_calls: bool,
    /// Attributes sent to mixer for this destination
    #[serde(default)]
    pub mixer_attributes: Attributes,
    /// API specs bound to the destination, sorted by config key
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http_api_spec: Vec<HttpApiSpec>,
    /// Quota specs bound to the destination, sorted by config key
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quota_spec: Vec<QuotaSpec>,
}

/// Mixer config for HTTP filters
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpClientConfig {
    /// Attributes sent to mixer on every request
    #[serde(default)]
    pub mixer_attributes: Attributes,
    /// Attributes forwarded to the upstream; absent when forwarding is off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_attributes: Option<Attributes>,
    /// Per-destination config keyed by service hostname
    #[serde(default)]
    pub service_configs: BTreeMap<String, ServiceConfig>,
    /// Service used when a request matches no service config
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_destination_service: String,
    /// Check/report clusters
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Mixer config for TCP filters
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpClientConfig {
    /// Attributes sent to mixer for every connection
    #[serde(default)]
    pub mixer_attributes: Attributes,
    /// Skip check calls
    #[serde(default)]
    pub disable_check_calls: bool,
    /// Check/report clusters
    #[serde(default)]
    pub transport: TransportConfig,
}

/// HTTP filter entry in a filter chain
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HttpFilter {
    /// Filter name
    pub name: String,
    /// Mixer config
    pub config: HttpClientConfig,
}

/// Network filter entry in a filter chain
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NetworkFilter {
    /// Filter name
    pub name: String,
    /// Mixer config
    pub config: TcpClientConfig,
}

/// A single route of a virtual host
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Route name
    pub name: String,
    /// Per-filter overrides keyed by filter name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub per_filter_config: BTreeMap<String, ServiceConfig>,
}

/// A virtual host and its routes
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct VirtualHost {
    /// Virtual host name
    pub name: String,
    /// Domains served
    pub domains: Vec<String>,
    /// Routes in match order
    pub routes: Vec<Route>,
}

/// Route configuration of an HTTP listener
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfiguration {
    /// Route configuration name
    pub name: String,
    /// Virtual hosts
    pub virtual_hosts: Vec<VirtualHost>,
}
