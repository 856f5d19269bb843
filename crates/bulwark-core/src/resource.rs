//! Addressable resources.
//!
//! A [`Resource`] is the smallest unit subject to access and read operations.
//! Identity is by value, and resources order by id first so that maps keyed
//! by resource iterate in a stable, meaningful order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A leaf resource that can be read through a data client.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Resource identifier (for file-like resources, the path).
    pub id: String,
    /// Logical record type held by the resource (e.g. `employee`).
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Encoding of the stored bytes (e.g. `avro`, `jsonl`).
    pub serialised_format: String,
    /// Free-form descriptive attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Resource {
    /// Creates a resource with no attributes.
    #[must_use]
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        serialised_format: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            serialised_format: serialised_format.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds a descriptive attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns an attribute value if set.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Checks that the identifying fields are populated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] naming the first empty field.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("id", &self.id),
            ("type", &self.resource_type),
            ("serialised format", &self.serialised_format),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "resource {field} must not be empty"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.id)
    }
}
