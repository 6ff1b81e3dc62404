//! Mixer filter configuration builder
//!
//! Builds are split by protocol into sub-modules:
//! - [`http`]: HTTP filter config with per-destination service configs
//! - [`tcp`]: TCP filter config for a single bound destination
//! - [`route`]: per-route overrides for inbound route configurations
//!
//! ## Check / report matrix
//!
//! | direction | proxy            | checks                 | reports  |
//! |-----------|------------------|------------------------|----------|
//! | outbound  | sidecar, ingress | off                    | off      |
//! | outbound  | router           | on unless mesh-off     | on       |
//! | inbound   | any              | on unless mesh-off     | on       |
//!
//! Routers sit at the mesh edge, so their upstream listeners count as
//! outbound yet are still enforced. TCP and per-route configs ignore the
//! direction and only honor the mesh-wide switch.

mod http;
mod route;
mod tcp;

use std::collections::BTreeMap;

use tracing::warn;

use meshmixer_common::mesh::{self, TrafficDirection};
use meshmixer_common::store::{sort_configs, ConfigStore};
use meshmixer_common::{AttributeValue, Attributes, AuthPolicy, MeshConfig, Proxy, ServiceInstance};

use crate::config::{ServiceConfig, TransportConfig};

/// Derives mixer filter configuration for one proxy
///
/// Holds only borrowed, immutable inputs; any number of builds may run
/// concurrently against the same mesh config and store.
pub struct FilterConfigBuilder<'a> {
    mesh: &'a MeshConfig,
    proxy: &'a Proxy,
    proxy_instances: &'a [ServiceInstance],
    store: &'a dyn ConfigStore,
}

impl<'a> FilterConfigBuilder<'a> {
    /// Create a builder
    ///
    /// # Arguments
    /// * `mesh` - Mesh-wide mixer endpoints and policy switches
    /// * `proxy` - Identity of the proxy being configured
    /// * `proxy_instances` - Service instances co-located with the proxy
    /// * `store` - Source of API and quota specs per destination
    pub fn new(
        mesh: &'a MeshConfig,
        proxy: &'a Proxy,
        proxy_instances: &'a [ServiceInstance],
        store: &'a dyn ConfigStore,
    ) -> Self {
        Self {
            mesh,
            proxy,
            proxy_instances,
            store,
        }
    }

    /// Whether check calls are disabled for listeners in `direction`
    pub fn checks_disabled(&self, direction: TrafficDirection) -> bool {
        self.unenforced_outbound(direction) || self.mesh.disable_policy_checks
    }

    /// Whether report calls are disabled for listeners in `direction`
    pub fn reports_disabled(&self, direction: TrafficDirection) -> bool {
        self.unenforced_outbound(direction)
    }

    fn unenforced_outbound(&self, direction: TrafficDirection) -> bool {
        direction == TrafficDirection::Outbound && !self.proxy.is_router()
    }

    /// Labels of the workload behind the proxy.
    ///
    /// All co-located instances run on the same workload, so the first
    /// instance's labels stand for the node.
    fn node_labels(&self) -> Option<&'a BTreeMap<String, String>> {
        self.proxy_instances.first().map(|i| &i.labels)
    }

    /// Add the standard node block for this proxy under `prefix`
    fn add_node_attributes(
        &self,
        attrs: &mut Attributes,
        prefix: &str,
        labels: Option<&BTreeMap<String, String>>,
    ) {
        add_standard_node_attributes(attrs, prefix, &self.proxy.ip_address, &self.proxy.id, labels);
    }

    /// Check and report clusters for the configured mixer servers
    pub fn transport_config(&self) -> TransportConfig {
        let port = match self.mesh.auth_policy {
            AuthPolicy::MutualTls => mesh::MIXER_MTLS_PORT,
            AuthPolicy::None => mesh::MIXER_PORT,
        };

        TransportConfig {
            check_cluster: mesh::outbound_cluster_name(
                mixer_host(&self.mesh.mixer_check_server),
                port,
            ),
            report_cluster: mesh::outbound_cluster_name(
                mixer_host(&self.mesh.mixer_report_server),
                port,
            ),
        }
    }

    /// Service config for one destination
    ///
    /// Attaches the destination's labels and bound API/quota specs, sorted by
    /// config key so identical inputs always produce identical output.
    pub fn service_config(
        &self,
        hostname: &str,
        instance: &ServiceInstance,
        disable_check: bool,
        disable_report: bool,
    ) -> ServiceConfig {
        let mut attrs = Attributes::new();
        attrs.insert_string(mesh::ATTR_DESTINATION_SERVICE, hostname);

        if !instance.labels.is_empty() {
            attrs.insert(
                mesh::ATTR_DESTINATION_LABELS,
                AttributeValue::string_map(instance.labels.clone()),
            );
        }

        let mut api_specs = self.store.http_api_specs_by_destination(instance);
        sort_configs(&mut api_specs);
        let mut quota_specs = self.store.quota_specs_by_destination(instance);
        sort_configs(&mut quota_specs);

        add_destination_service_attributes(&mut attrs, hostname, &self.proxy.domain);

        ServiceConfig {
            disable_check_calls: disable_check,
            disable_report_calls: disable_report,
            mixer_attributes: attrs,
            http_api_spec: api_specs.into_iter().map(|c| c.spec).collect(),
            quota_spec: quota_specs.into_iter().map(|c| c.spec).collect(),
        }
    }
}

/// Host part of a mixer server endpoint; empty when it does not parse.
fn mixer_host(endpoint: &str) -> &str {
    match mesh::split_host_port(endpoint) {
        Some((host, _)) => host,
        None => {
            if !endpoint.is_empty() {
                warn!(endpoint = %endpoint, "mixer server is not host:port, using empty host");
            }
            ""
        }
    }
}

/// Add `<prefix>.ip`, `<prefix>.uid` and `<prefix>.labels` for a workload.
///
/// The IP attribute is skipped for an empty address and carries empty bytes
/// for an unparseable one. Labels are skipped when absent or empty.
pub fn add_standard_node_attributes(
    attrs: &mut Attributes,
    prefix: &str,
    ip_address: &str,
    id: &str,
    labels: Option<&BTreeMap<String, String>>,
) {
    if !ip_address.is_empty() {
        attrs.insert(
            format!("{}.{}", prefix, mesh::ATTR_IP_SUFFIX),
            AttributeValue::ip(ip_address),
        );
    }

    attrs.insert_string(
        format!("{}.{}", prefix, mesh::ATTR_UID_SUFFIX),
        mesh::workload_uid(id),
    );

    if let Some(labels) = labels.filter(|l| !l.is_empty()) {
        attrs.insert(
            format!("{}.{}", prefix, mesh::ATTR_LABELS_SUFFIX),
            AttributeValue::string_map(labels.clone()),
        );
    }
}

/// Add the `destination.service` attribute family for a hostname.
///
/// `destination.service.namespace` is only set when a namespace can be
/// derived; see [`name_and_namespace`].
pub fn add_destination_service_attributes(attrs: &mut Attributes, hostname: &str, domain: &str) {
    let (name, namespace) = name_and_namespace(hostname, domain);
    // legacy attribute, still read by older adapters
    attrs.insert_string(mesh::ATTR_DESTINATION_SERVICE, hostname);
    attrs.insert_string(mesh::ATTR_DESTINATION_SERVICE_HOST, hostname);
    attrs.insert_string(
        mesh::ATTR_DESTINATION_SERVICE_UID,
        mesh::service_uid(namespace, name),
    );
    attrs.insert_string(mesh::ATTR_DESTINATION_SERVICE_NAME, name);
    if !namespace.is_empty() {
        attrs.insert_string(mesh::ATTR_DESTINATION_SERVICE_NAMESPACE, namespace);
    }
}

/// Split a service hostname into `(name, namespace)` relative to a domain.
///
/// The domain loses its first label (`default.svc.cluster.local` becomes
/// `svc.cluster.local`). A hostname not ending in that remainder is all
/// name with no namespace. Otherwise the first two hostname labels are the
/// name and namespace; a single-label hostname has no namespace. A domain
/// without a dot leaves an empty remainder, which every hostname ends with.
pub fn name_and_namespace<'h>(hostname: &'h str, domain: &str) -> (&'h str, &'h str) {
    let rest = domain.split_once('.').map(|(_, rest)| rest).unwrap_or("");
    if !hostname.ends_with(rest) {
        return (hostname, "");
    }

    let mut parts = hostname.split('.');
    match (parts.next(), parts.next()) {
        (Some(name), Some(namespace)) => (name, namespace),
        _ => (hostname, ""),
    }
}
