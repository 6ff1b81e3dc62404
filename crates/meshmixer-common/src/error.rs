//! Error types for meshmixer
//!
//! Filter configuration is built infallibly: malformed endpoints, IPs and
//! hostnames degrade to fallback values. The variants here cover the few
//! places that do signal failure: listener dispatch, snapshot construction
//! and configuration decoding.

use thiserror::Error;

/// Main error type for meshmixer operations
#[derive(Debug, Error)]
pub enum Error {
    /// A listener hook was invoked for a protocol it cannot configure
    #[error("unsupported listener type {protocol} in mixer {direction} listener")]
    UnsupportedListener {
        /// Listener protocol as rendered by the caller
        protocol: String,
        /// Traffic direction of the listener (inbound, outbound)
        direction: String,
    },

    /// An inbound hook needs the listener's bound service instance but got none
    #[error("missing service instance for {context}")]
    MissingServiceInstance {
        /// Which hook required the instance (e.g., "inbound tcp listener")
        context: String,
    },

    /// Invalid snapshot graph or configuration value
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "rules[0].actions[1].handler")
        field: Option<String>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The document kind being decoded (if known)
        kind: Option<String>,
    },
}

impl Error {
    /// Create an unsupported listener error
    pub fn unsupported_listener(protocol: impl Into<String>, direction: impl Into<String>) -> Self {
        Self::UnsupportedListener {
            protocol: protocol.into(),
            direction: direction.into(),
        }
    }

    /// Create a missing service instance error
    pub fn missing_service_instance(context: impl Into<String>) -> Self {
        Self::MissingServiceInstance {
            context: context.into(),
        }
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error pointing at a field path
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error for a specific document kind
    pub fn serialization_for(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// The field path for validation errors, if one was recorded
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}
