//! Error types and result aliases for bulwark.
//!
//! This module defines the shared error types used by the core primitives.
//! Errors are structured for programmatic handling and include the offending
//! value where one exists.

use std::fmt;

/// The result type used throughout bulwark-core.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Job configuration is missing, incomplete or holds an unusable value.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// An argument was outside its accepted range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An invalid identifier was provided.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of what made the ID invalid.
        message: String,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// Opening, reading or decoding one resource failed.
    #[error("read failed for resource {resource}: {message}")]
    Read {
        /// Identifier of the resource being read.
        resource: String,
        /// Description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A named object was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization(message: impl fmt::Display) -> Self {
        Self::Serialization {
            message: message.to_string(),
        }
    }

    /// Creates a read error without an underlying cause.
    #[must_use]
    pub fn read(resource: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::Read {
            resource: resource.to_string(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a read error carrying its cause.
    #[must_use]
    pub fn read_with_source(
        resource: impl fmt::Display,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Read {
            resource: resource.to_string(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}
