//! Error types for split planning and reading.

/// The result type used throughout bulwark-split.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while planning, transporting or reading splits.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An access request could not be resolved and the planner was asked to fail fast.
    #[error("resolution failed for {resource_id}: {message}")]
    Resolution {
        /// Resource id of the failed request.
        resource_id: String,
        /// Description of the failure.
        message: String,
    },

    /// A reader was handed a split of a type it does not understand.
    #[error("unsupported split type: expected {expected}")]
    SplitType {
        /// The split type the reader accepts.
        expected: &'static str,
    },

    /// A reader was handed a split with no resources.
    #[error("split {split_id} has no resources")]
    SplitEmpty {
        /// The empty split's id.
        split_id: String,
    },

    /// A split could not be put into its wire form.
    #[error("encode error: {message}")]
    Encode {
        /// Description of what could not be encoded.
        message: String,
    },

    /// A split payload could not be decoded.
    #[error("decode error: {message}")]
    Decode {
        /// Description of the malformed input.
        message: String,
    },

    /// Streaming a split failed and the failure mode requires aborting.
    #[error("execution failed: {message}")]
    Execution {
        /// Description of the failure.
        message: String,
        /// The underlying cause.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An invalid reader state transition was attempted.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },

    /// An error from bulwark-core.
    #[error("core error: {0}")]
    Core(#[from] bulwark_core::error::Error),
}

impl Error {
    /// Creates a new encode error.
    #[must_use]
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Creates a new decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates an execution error wrapping its cause.
    #[must_use]
    pub fn execution(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Execution {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true if this error is a configuration error from the core.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Core(err) if err.is_configuration())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn decode_error_display() {
        let err = Error::decode("negative length -1");
        assert!(err.to_string().contains("negative length"));
    }

    #[test]
    fn encode_and_decode_errors_are_distinct() {
        let err = Error::encode("field too large");
        assert!(err.to_string().starts_with("encode error"));
        assert!(!matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn execution_error_keeps_source() {
        let cause = bulwark_core::Error::read("t:a", "connection refused");
        let err = Error::execution("reading split", cause);
        assert!(err.to_string().contains("execution failed"));
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn configuration_errors_are_recognised_through_core() {
        let err: Error = bulwark_core::Error::configuration("no service").into();
        assert!(err.is_configuration());
        assert!(!Error::decode("x").is_configuration());
    }
}
