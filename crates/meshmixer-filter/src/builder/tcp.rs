//! TCP mixer filter configuration

use tracing::debug;

use meshmixer_common::mesh;
use meshmixer_common::{AttributeValue, Attributes, ServiceInstance};

use super::{add_destination_service_attributes, FilterConfigBuilder};
use crate::config::TcpClientConfig;

impl<'a> FilterConfigBuilder<'a> {
    /// Build the TCP filter config for an inbound listener bound to `instance`.
    ///
    /// TCP has no per-route overrides, so destination attributes are always
    /// present. Workload labels are not attached. Reports are never
    /// disabled; checks follow the mesh-wide switch only.
    pub fn build_tcp_filter_config(&self, instance: &ServiceInstance) -> TcpClientConfig {
        let mut attrs = Attributes::new();
        self.add_node_attributes(&mut attrs, mesh::ATTR_DESTINATION_PREFIX, None);
        add_destination_service_attributes(&mut attrs, &instance.hostname, &self.proxy.domain);
        attrs.insert_string(mesh::ATTR_REPORTER_UID, mesh::workload_uid(&self.proxy.id));
        attrs.insert(mesh::ATTR_REPORTER_LOCAL, AttributeValue::bool(true));

        debug!(
            node = %self.proxy.id,
            hostname = %instance.hostname,
            disable_check = self.mesh.disable_policy_checks,
            "built tcp mixer filter config"
        );

        TcpClientConfig {
            mixer_attributes: attrs,
            disable_check_calls: self.mesh.disable_policy_checks,
            transport: self.transport_config(),
        }
    }
}
