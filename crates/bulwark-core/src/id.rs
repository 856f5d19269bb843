//! Strongly-typed identifiers for bulwark entities.
//!
//! All identifiers are:
//! - **Strongly typed**: a split id cannot be passed where a request id is expected
//! - **Lexicographically sortable**: ULIDs encode creation time and sort naturally
//! - **Globally unique**: no coordination required between planners
//!
//! # Example
//!
//! ```rust
//! use bulwark_core::id::{RequestId, SplitId};
//!
//! let split = SplitId::generate();
//! let request = RequestId::generate();
//!
//! // IDs are different types - this won't compile:
//! // let wrong: SplitId = request;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::error::{Error, Result};

/// Identifies one resolved access request.
///
/// Assigned by the access-control service when it registers a request;
/// carried on the resulting grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Ulid);

impl RequestId {
    /// Generates a new unique request ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| Error::InvalidId {
                message: format!("invalid request ID '{s}': {e}"),
            })
    }
}

/// Identifies one split produced by a planning pass.
///
/// The id is a planning-time tracking handle. Once resources from several
/// requests share a split it no longer maps back to a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SplitId(Ulid);

impl SplitId {
    /// Generates a new unique split ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for SplitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SplitId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| Error::InvalidId {
                message: format!("invalid split ID '{s}': {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_id_roundtrip() {
        let id = SplitId::generate();
        let parsed: SplitId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn request_id_roundtrip() {
        let id = RequestId::generate();
        let parsed: RequestId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(SplitId::generate(), SplitId::generate());
    }

    #[test]
    fn invalid_id_returns_error() {
        let result: Result<SplitId> = "not-a-valid-ulid".parse();
        assert!(matches!(result, Err(Error::InvalidId { .. })));
    }
}
