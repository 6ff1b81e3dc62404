//! Listener hooks that insert mixer filters
//!
//! The listener pipeline calls a [`ListenerPlugin`] for every listener and
//! route configuration it builds. [`MixerPlugin`] appends mixer filters to
//! filter chains and per-route overrides to inbound routes. Deciding which
//! listeners exist, and encoding the result for the proxy, stays with the
//! pipeline.

use std::fmt;

use tracing::{debug, warn};

use meshmixer_common::mesh::{self, TrafficDirection};
use meshmixer_common::store::ConfigStore;
use meshmixer_common::{Error, MeshConfig, Proxy, Result, ServiceInstance};

use crate::builder::FilterConfigBuilder;
use crate::config::{HttpFilter, NetworkFilter, RouteConfiguration};

/// Protocol of the listener being configured
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ListenerProtocol {
    /// Protocol not determined by the pipeline
    #[default]
    Unknown,
    /// HTTP connection manager listener
    Http,
    /// Plain TCP proxy listener
    Tcp,
}

impl fmt::Display for ListenerProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Http => "http",
            Self::Tcp => "tcp",
        })
    }
}

/// Inputs shared by all hooks for one listener
pub struct InputParams<'a> {
    /// Listener protocol
    pub listener_protocol: ListenerProtocol,
    /// Mesh-wide settings
    pub mesh: &'a MeshConfig,
    /// Spec store
    pub store: &'a dyn ConfigStore,
    /// Proxy being configured
    pub node: &'a Proxy,
    /// Service instances co-located with the proxy
    pub proxy_instances: &'a [ServiceInstance],
    /// Service instance the listener is bound to (inbound listeners only)
    pub service_instance: Option<&'a ServiceInstance>,
}

impl<'a> InputParams<'a> {
    fn builder(&self) -> FilterConfigBuilder<'a> {
        FilterConfigBuilder::new(self.mesh, self.node, self.proxy_instances, self.store)
    }

    fn bound_instance(&self, context: &str) -> Result<&'a ServiceInstance> {
        self.service_instance
            .ok_or_else(|| Error::missing_service_instance(context))
    }
}

/// Filters of one filter chain
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterChain {
    /// HTTP filters, in order
    pub http: Vec<HttpFilter>,
    /// Network filters, in order
    pub tcp: Vec<NetworkFilter>,
}

/// Listener parts hooks may mutate
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MutableObjects {
    /// Filter chains of the listener
    pub filter_chains: Vec<FilterChain>,
}

/// Hooks invoked by the listener pipeline
pub trait ListenerPlugin: Send + Sync {
    /// Called for each outbound listener
    fn on_outbound_listener(&self, input: &InputParams<'_>, mutable: &mut MutableObjects) -> Result<()>;

    /// Called for each inbound listener
    fn on_inbound_listener(&self, input: &InputParams<'_>, mutable: &mut MutableObjects) -> Result<()>;

    /// Called for each inbound route configuration
    fn on_inbound_route_configuration(
        &self,
        input: &InputParams<'_>,
        route_config: &mut RouteConfiguration,
    ) -> Result<()>;
}

/// Inserts mixer filters and per-route overrides
#[derive(Clone, Copy, Debug, Default)]
pub struct MixerPlugin;

impl MixerPlugin {
    /// Create the plugin
    pub fn new() -> Self {
        Self
    }

    fn http_filter(input: &InputParams<'_>, direction: TrafficDirection) -> Option<HttpFilter> {
        if !input.mesh.has_mixer() {
            return None;
        }
        Some(HttpFilter {
            name: mesh::MIXER_FILTER_NAME.to_string(),
            config: input.builder().build_http_filter_config(direction),
        })
    }

    fn tcp_filter(input: &InputParams<'_>, instance: &ServiceInstance) -> Option<NetworkFilter> {
        if !input.mesh.has_mixer() {
            return None;
        }
        Some(NetworkFilter {
            name: mesh::MIXER_FILTER_NAME.to_string(),
            config: input.builder().build_tcp_filter_config(instance),
        })
    }

    fn append_http(
        input: &InputParams<'_>,
        mutable: &mut MutableObjects,
        direction: TrafficDirection,
    ) {
        let Some(filter) = Self::http_filter(input, direction) else {
            return;
        };
        for chain in &mut mutable.filter_chains {
            chain.http.push(filter.clone());
        }
    }
}

impl ListenerPlugin for MixerPlugin {
    fn on_outbound_listener(&self, input: &InputParams<'_>, mutable: &mut MutableObjects) -> Result<()> {
        match input.listener_protocol {
            ListenerProtocol::Http => {
                Self::append_http(input, mutable, TrafficDirection::Outbound);
                Ok(())
            }
            // outbound TCP traffic is reported by the destination's inbound filter
            ListenerProtocol::Tcp => Ok(()),
            ListenerProtocol::Unknown => Err(Error::unsupported_listener(
                input.listener_protocol.to_string(),
                TrafficDirection::Outbound.as_str(),
            )),
        }
    }

    fn on_inbound_listener(&self, input: &InputParams<'_>, mutable: &mut MutableObjects) -> Result<()> {
        match input.listener_protocol {
            ListenerProtocol::Http => {
                Self::append_http(input, mutable, TrafficDirection::Inbound);
                Ok(())
            }
            ListenerProtocol::Tcp => {
                let instance = input.bound_instance("inbound tcp listener")?;
                if let Some(filter) = Self::tcp_filter(input, instance) {
                    for chain in &mut mutable.filter_chains {
                        chain.tcp.push(filter.clone());
                    }
                }
                Ok(())
            }
            ListenerProtocol::Unknown => Err(Error::unsupported_listener(
                input.listener_protocol.to_string(),
                TrafficDirection::Inbound.as_str(),
            )),
        }
    }

    fn on_inbound_route_configuration(
        &self,
        input: &InputParams<'_>,
        route_config: &mut RouteConfiguration,
    ) -> Result<()> {
        match input.listener_protocol {
            ListenerProtocol::Http => {
                let instance = input.bound_instance("inbound route configuration")?;
                input
                    .builder()
                    .apply_inbound_route_overrides(route_config, instance);
            }
            ListenerProtocol::Tcp => {
                debug!(route_config = %route_config.name, "no mixer route overrides for tcp");
            }
            ListenerProtocol::Unknown => {
                warn!(
                    route_config = %route_config.name,
                    "unknown listener type in mixer inbound route configuration"
                );
            }
        }
        Ok(())
    }
}
