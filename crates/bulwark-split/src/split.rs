//! Splits: the unit of work handed to a remote reader.
//!
//! [`InputSplit`] is the interface a host execution framework sees; it knows
//! nothing about resources. [`ResourceSplit`] is the one implementation this
//! crate produces and the one [`crate::reader::ResourceStreamReader`]
//! accepts.

use std::any::Any;
use std::collections::BTreeMap;

use bytes::Bytes;

use bulwark_core::{ConnectionDetail, Resource, SplitId};

use crate::codec;
use crate::error::Result;

/// A unit of work as seen by a host execution framework.
pub trait InputSplit: Send + Sync {
    /// Size of the split, in resources.
    fn len(&self) -> usize;

    /// Returns true if the split holds no work.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Preferred hosts for processing this split.
    fn locations(&self) -> Vec<String>;

    /// Returns `self` for downcasting to the concrete split type.
    fn as_any(&self) -> &dyn Any;
}

/// An immutable set of resources, each with the capability to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSplit {
    id: SplitId,
    resources: BTreeMap<Resource, ConnectionDetail>,
}

impl ResourceSplit {
    /// Creates a split with a fresh id.
    #[must_use]
    pub fn new(resources: BTreeMap<Resource, ConnectionDetail>) -> Self {
        Self::with_id(SplitId::generate(), resources)
    }

    /// Creates a split with a known id.
    #[must_use]
    pub const fn with_id(id: SplitId, resources: BTreeMap<Resource, ConnectionDetail>) -> Self {
        Self { id, resources }
    }

    /// The split's id.
    #[must_use]
    pub const fn id(&self) -> SplitId {
        self.id
    }

    /// The resources assigned to this split, in read order.
    #[must_use]
    pub const fn resources(&self) -> &BTreeMap<Resource, ConnectionDetail> {
        &self.resources
    }

    /// Encodes the split into its wire form.
    ///
    /// # Errors
    ///
    /// See [`codec::encode_split`].
    pub fn to_bytes(&self) -> Result<Bytes> {
        codec::encode_split(self)
    }

    /// Decodes a split from its wire form.
    ///
    /// # Errors
    ///
    /// See [`codec::decode_split`].
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        codec::decode_split(data)
    }
}

impl InputSplit for ResourceSplit {
    fn len(&self) -> usize {
        self.resources.len()
    }

    fn locations(&self) -> Vec<String> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
