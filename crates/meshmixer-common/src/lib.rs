//! Common types for meshmixer: proxy model, attribute bags, config store and errors
//!
//! Everything in here is shared between the snapshot runtime and the
//! filter configuration builder. Inputs are plain immutable values; the
//! builders never read ambient state.

#![deny(missing_docs)]

pub mod attributes;
pub mod error;
pub mod mesh;
pub mod model;
pub mod store;
pub mod telemetry;
pub mod yaml;

pub use attributes::{AttributeValue, Attributes};
pub use error::Error;
pub use model::{AuthPolicy, MeshConfig, NodeType, Proxy, ServiceInstance};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
