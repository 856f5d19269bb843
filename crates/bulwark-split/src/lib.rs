//! # bulwark-split
//!
//! Split planning and streaming reads for bulwark jobs.
//!
//! This crate turns a job's access requests into parallel units of work and
//! reads them back on workers:
//!
//! - **Planning**: concurrent resolution of access requests and round-robin
//!   partitioning of the granted resources into splits
//! - **Wire Codec**: the length-prefixed binary form a split travels in
//! - **Reading**: a pull-based reader that streams each resource's records
//!   exactly once, with a configurable read-failure policy
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bulwark_core::prelude::*;
//! use bulwark_core::MemoryAccessControl;
//! use bulwark_split::planner::SplitPlanner;
//! use bulwark_split::reader::{ResourceStreamReader, TaskContext};
//!
//! # async fn run() -> bulwark_split::error::Result<()> {
//! let service = Arc::new(MemoryAccessControl::new());
//! let mut config = JobConfig::new();
//! config.set_access_control_service(service);
//! config.add_access_request(AccessRequest::new("dir:/hr", "alice", Context::purpose("payroll")))?;
//! config.set_serializer(SerializerKind::JsonLines)?;
//!
//! let splits = SplitPlanner::new().plan(&config).await?;
//! for split in &splits {
//!     let bytes = split.to_bytes()?;
//!     let split = bulwark_split::split::ResourceSplit::from_bytes(bytes)?;
//!
//!     let mut reader = ResourceStreamReader::new();
//!     reader.initialize(&split, &TaskContext::new(config.clone(), ClientRegistry::new()))?;
//!     while reader.next_key_value().await? {
//!         let _record = reader.current_value();
//!     }
//!     reader.close();
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod codec;
pub mod error;
pub mod metrics;
pub mod planner;
pub mod reader;
pub mod settings;
pub mod split;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::planner::SplitPlanner;
    pub use crate::reader::{ReaderState, ReaderStats, ResourceStreamReader, TaskContext};
    pub use crate::settings::PlannerSettings;
    pub use crate::split::{InputSplit, ResourceSplit};
}

pub use error::{Error, Result};
pub use planner::SplitPlanner;
pub use reader::{ResourceStreamReader, TaskContext};
pub use settings::PlannerSettings;
pub use split::{InputSplit, ResourceSplit};
