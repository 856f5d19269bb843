//! Per-resource data access.
//!
//! This module defines the data-client contract a reader uses to fetch the
//! raw bytes of one resource, and the [`ConnectionDetail`] capability that a
//! grant attaches to every resource it hands out.
//!
//! ## Connection details
//!
//! Connection details are a closed, tagged set. The `type` tag travels in
//! the serialized form so a remote worker reconstructs the same variant:
//!
//! - [`ConnectionDetail::Local`]: read from a directory on the worker's filesystem
//! - [`ConnectionDetail::Service`]: read through a named client registered in
//!   the worker's [`ClientRegistry`]

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::SplitId;
use crate::resource::Resource;

/// A request to read one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    /// Resource to read.
    pub resource: Resource,
    /// Split on whose behalf the read is issued.
    pub split_id: SplitId,
}

/// Raw bytes returned for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResponse {
    /// Serialized records, decoded by the job's serializer.
    pub data: Bytes,
}

/// Client able to read resources from one backing service.
///
/// Implementations must be `Send + Sync`; a single client may be shared
/// across readers running on different worker threads.
#[async_trait]
pub trait DataClient: Send + Sync {
    /// Reads the full content of a resource.
    ///
    /// Returns [`Error::Read`] or [`Error::NotFound`] if the resource cannot
    /// be served. Implementations perform no retries.
    async fn read(&self, request: ReadRequest) -> Result<ReadResponse>;
}

/// Capability that can construct a client for reading one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionDetail {
    /// Resource bytes live under `root` on the worker's filesystem.
    Local {
        /// Directory resource ids are resolved against.
        root: PathBuf,
    },
    /// Resource bytes are served by a client registered under `name`.
    Service {
        /// Registry name of the data client.
        name: String,
    },
}

impl ConnectionDetail {
    /// Creates a filesystem connection detail.
    #[must_use]
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self::Local { root: root.into() }
    }

    /// Creates a named-service connection detail.
    #[must_use]
    pub fn service(name: impl Into<String>) -> Self {
        Self::Service { name: name.into() }
    }

    /// Builds the client this detail describes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if a service name is not registered.
    pub fn build_client(&self, registry: &ClientRegistry) -> Result<Arc<dyn DataClient>> {
        match self {
            Self::Local { root } => Ok(Arc::new(LocalDataClient::new(root.clone()))),
            Self::Service { name } => registry.get(name),
        }
    }
}

/// Named data clients available to readers on one worker.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, Arc<dyn DataClient>>,
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.clients.keys().collect();
        names.sort();
        f.debug_struct("ClientRegistry").field("clients", &names).finish()
    }
}

impl ClientRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client under `name`, replacing any previous entry.
    #[must_use]
    pub fn with_client(mut self, name: impl Into<String>, client: Arc<dyn DataClient>) -> Self {
        self.register(name, client);
        self
    }

    /// Registers a client under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, client: Arc<dyn DataClient>) {
        self.clients.insert(name.into(), client);
    }

    /// Looks up a client by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no client is registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<dyn DataClient>> {
        self.clients
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("data client not registered: {name}")))
    }
}

/// Reads resources from files under a root directory.
///
/// A resource id is treated as a relative path; ids that would escape the
/// root are rejected.
#[derive(Debug, Clone)]
pub struct LocalDataClient {
    root: PathBuf,
}

impl LocalDataClient {
    /// Creates a client rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, resource: &Resource) -> Result<PathBuf> {
        let relative = Path::new(&resource.id);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(Error::read(
                resource,
                "resource id must be a relative path inside the connection root",
            ));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DataClient for LocalDataClient {
    async fn read(&self, request: ReadRequest) -> Result<ReadResponse> {
        let path = self.resolve(&request.resource)?;
        let data = tokio::fs::read(&path).await.map_err(|e| {
            Error::read_with_source(&request.resource, format!("reading {}", path.display()), e)
        })?;
        Ok(ReadResponse {
            data: Bytes::from(data),
        })
    }
}

/// In-memory data client for testing.
///
/// Serves payloads keyed by resource id, can be told to fail specific ids,
/// and counts how often each id was read.
#[derive(Debug, Default)]
pub struct MemoryDataClient {
    state: RwLock<MemoryClientState>,
}

#[derive(Debug, Default)]
struct MemoryClientState {
    payloads: HashMap<String, Bytes>,
    failing: HashSet<String>,
    reads: HashMap<String, usize>,
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::Internal {
        message: "memory data client lock poisoned".into(),
    }
}

impl MemoryDataClient {
    /// Creates an empty client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the payload served for `resource_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert(&self, resource_id: impl Into<String>, data: impl Into<Bytes>) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.payloads.insert(resource_id.into(), data.into());
        Ok(())
    }

    /// Makes every read of `resource_id` fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn fail(&self, resource_id: impl Into<String>) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.failing.insert(resource_id.into());
        Ok(())
    }

    /// Returns how many reads were issued for `resource_id`.
    #[must_use]
    pub fn read_count(&self, resource_id: &str) -> usize {
        self.state
            .read()
            .map(|s| s.reads.get(resource_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Returns the total number of reads issued.
    #[must_use]
    pub fn total_reads(&self) -> usize {
        self.state
            .read()
            .map(|s| s.reads.values().sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DataClient for MemoryDataClient {
    async fn read(&self, request: ReadRequest) -> Result<ReadResponse> {
        let mut state = self.state.write().map_err(poison_err)?;
        let id = &request.resource.id;
        *state.reads.entry(id.clone()).or_insert(0) += 1;

        if state.failing.contains(id) {
            return Err(Error::read(&request.resource, "injected read failure"));
        }
        state
            .payloads
            .get(id)
            .cloned()
            .map(|data| ReadResponse { data })
            .ok_or_else(|| Error::NotFound(format!("resource not found: {id}")))
    }
}
