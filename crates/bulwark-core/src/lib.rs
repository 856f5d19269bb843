//! # bulwark-core
//!
//! Core primitives for bulwark's policy-governed split planning and reads.
//!
//! This crate provides the types shared by planners and workers:
//!
//! - **Resources**: the addressable units subject to access and read
//! - **Access Requests & Grants**: who wants what for which purpose, and what
//!   the access-control service allowed
//! - **Data Clients**: the per-resource read contract and connection details
//! - **Serializers**: the closed set of record codecs a job can select
//! - **Job Configuration**: the key/value surface a job driver fills in
//! - **Error Types**: shared error definitions and result types
//!
//! ## Example
//!
//! ```rust
//! use bulwark_core::prelude::*;
//!
//! let request = AccessRequest::new("file:/hr/employees", "alice", Context::purpose("payroll"));
//! let mut config = JobConfig::new();
//! config.add_access_request(request).unwrap();
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod config;
pub mod error;
pub mod id;
pub mod observability;
pub mod request;
pub mod resource;
pub mod serializer;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::client::{ClientRegistry, ConnectionDetail, DataClient, ReadRequest, ReadResponse};
    pub use crate::config::{JobConfig, PartitionScope, ReaderFailureMode};
    pub use crate::error::{Error, Result};
    pub use crate::id::{RequestId, SplitId};
    pub use crate::request::{AccessControlService, AccessGrant, AccessRequest, Context};
    pub use crate::resource::Resource;
    pub use crate::serializer::{Record, RecordSerializer, SerializerKind};
}

pub use client::{
    ClientRegistry, ConnectionDetail, DataClient, LocalDataClient, MemoryDataClient, ReadRequest,
    ReadResponse,
};
pub use config::{JobConfig, PartitionScope, ReaderFailureMode};
pub use error::{Error, Result};
pub use id::{RequestId, SplitId};
pub use observability::{LogFormat, init_logging};
pub use request::{AccessControlService, AccessGrant, AccessRequest, Context, MemoryAccessControl};
pub use resource::Resource;
pub use serializer::{Record, RecordIter, RecordSerializer, SerializerKind};
