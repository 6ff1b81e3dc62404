//! Per-route mixer overrides for inbound route configurations

use tracing::debug;

use meshmixer_common::mesh::{self, TrafficDirection};
use meshmixer_common::{Attributes, ServiceInstance};

use super::{add_destination_service_attributes, FilterConfigBuilder};
use crate::config::{RouteConfiguration, ServiceConfig};

impl<'a> FilterConfigBuilder<'a> {
    /// Build the per-route override for routes served by `instance`.
    ///
    /// Checks follow the mesh-wide switch and reports are never disabled.
    /// When `destination_service` is known, the mixer attributes are replaced
    /// by that destination's `destination.service` family. Inbound routes
    /// and router routes then get the proxy's destination node attributes.
    pub fn build_per_route_config(
        &self,
        instance: &ServiceInstance,
        direction: TrafficDirection,
        destination_service: Option<&str>,
    ) -> ServiceConfig {
        let disable_check = self.mesh.disable_policy_checks;
        let mut out = self.service_config(&instance.hostname, instance, disable_check, false);

        if let Some(destination) = destination_service.filter(|d| !d.is_empty()) {
            let mut attrs = Attributes::new();
            attrs.insert_string(mesh::ATTR_DESTINATION_SERVICE, destination);
            add_destination_service_attributes(&mut attrs, destination, &self.proxy.domain);
            out.mixer_attributes = attrs;
        }

        if direction == TrafficDirection::Inbound || self.proxy.is_router() {
            self.add_node_attributes(
                &mut out.mixer_attributes,
                mesh::ATTR_DESTINATION_PREFIX,
                self.node_labels(),
            );
        }

        out
    }

    /// Attach the mixer override to every route of an inbound route configuration.
    ///
    /// Every route targets the listener's bound service, so all routes share
    /// one override.
    pub fn apply_inbound_route_overrides(
        &self,
        route_config: &mut RouteConfiguration,
        instance: &ServiceInstance,
    ) {
        let per_route = self.build_per_route_config(
            instance,
            TrafficDirection::Inbound,
            Some(&instance.hostname),
        );

        let mut routes = 0usize;
        for virtual_host in &mut route_config.virtual_hosts {
            for route in &mut virtual_host.routes {
                route
                    .per_filter_config
                    .insert(mesh::MIXER_FILTER_NAME.to_string(), per_route.clone());
                routes += 1;
            }
        }

        debug!(
            node = %self.proxy.id,
            route_config = %route_config.name,
            hostname = %instance.hostname,
            routes,
            "attached mixer per-route config"
        );
    }
}
