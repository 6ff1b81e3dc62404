//! Mixer filter configuration for sidecar, ingress and router proxies
//!
//! Given mesh settings, a proxy's identity and its co-located service
//! instances, [`FilterConfigBuilder`] derives the attribute bags, check and
//! report switches and transport clusters that the proxy's mixer filter
//! needs on each listener:
//!
//! - **HTTP** ([`HttpClientConfig`]): default attributes, forwarded
//!   attributes and one [`ServiceConfig`] per co-located service
//! - **TCP** ([`TcpClientConfig`]): a single destination's attributes
//! - **Per-route** ([`ServiceConfig`]): overrides attached to inbound routes
//!
//! [`plugin::MixerPlugin`] wires these into listener filter chains and
//! route configurations.

pub mod builder;
pub mod config;
pub mod plugin;

pub use builder::FilterConfigBuilder;
pub use config::{HttpClientConfig, ServiceConfig, TcpClientConfig, TransportConfig};
