//! Access requests and their resolution into grants.
//!
//! A client states *who* wants *what* and *why* as an [`AccessRequest`]. The
//! external access-control service resolves each request into an
//! [`AccessGrant`]: the concrete resources the user may read, each paired
//! with the [`ConnectionDetail`] needed to read it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::ConnectionDetail;
use crate::error::{Error, Result};
use crate::id::RequestId;
use crate::resource::Resource;

/// Why an access is being made, plus any extra context the policy engine uses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    /// Stated purpose of the access.
    pub purpose: String,
    /// Additional context entries.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Context {
    /// Creates a context for the given purpose.
    #[must_use]
    pub fn purpose(purpose: impl Into<String>) -> Self {
        Self {
            purpose: purpose.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds a context entry.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// A client's pending ask for access to one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    /// Resource (or resource prefix) being requested.
    pub resource_id: String,
    /// User on whose behalf the request is made.
    pub user_id: String,
    /// Purpose and extra context.
    pub context: Context,
}

impl AccessRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(resource_id: impl Into<String>, user_id: impl Into<String>, context: Context) -> Self {
        Self {
            resource_id: resource_id.into(),
            user_id: user_id.into(),
            context,
        }
    }

    /// Checks that resource id, user id and purpose are all present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the first missing field.
    pub fn validate(&self) -> Result<()> {
        if self.resource_id.trim().is_empty() {
            return Err(Error::configuration("access request is missing a resource id"));
        }
        if self.user_id.trim().is_empty() {
            return Err(Error::configuration(format!(
                "access request for {} is missing a user id",
                self.resource_id
            )));
        }
        if self.context.purpose.trim().is_empty() {
            return Err(Error::configuration(format!(
                "access request for {} is missing a purpose",
                self.resource_id
            )));
        }
        Ok(())
    }
}

/// The resolved outcome of one access request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    /// Identifier assigned by the access-control service.
    pub request_id: RequestId,
    /// Granted resources and how to read each.
    pub resources: BTreeMap<Resource, ConnectionDetail>,
}

impl AccessGrant {
    /// Creates an empty grant.
    #[must_use]
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            resources: BTreeMap::new(),
        }
    }

    /// Adds a granted resource.
    #[must_use]
    pub fn with_resource(mut self, resource: Resource, connection: ConnectionDetail) -> Self {
        self.resources.insert(resource, connection);
        self
    }

    /// Number of granted resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if nothing was granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Resolves access requests into grants.
///
/// The policy decision itself happens behind this trait. Calls for distinct
/// requests must be independent of one another.
#[async_trait]
pub trait AccessControlService: Send + Sync {
    /// Registers a request and returns what the user may read.
    async fn register_request(&self, request: &AccessRequest) -> Result<AccessGrant>;
}

/// In-memory access-control service for testing.
///
/// Grants are canned per `resource_id`. Requests for unknown ids, or ids
/// marked failing, are rejected. An optional delay simulates a slow service.
#[derive(Debug, Default)]
pub struct MemoryAccessControl {
    grants: RwLock<HashMap<String, Vec<(Resource, ConnectionDetail)>>>,
    failing: RwLock<HashSet<String>>,
    delays: RwLock<HashMap<String, Duration>>,
    calls: AtomicUsize,
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::Internal {
        message: "access control lock poisoned".into(),
    }
}

impl MemoryAccessControl {
    /// Creates a service with no grants.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `resources` to any request for `resource_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn grant(
        &self,
        resource_id: impl Into<String>,
        resources: impl IntoIterator<Item = (Resource, ConnectionDetail)>,
    ) -> Result<()> {
        let mut grants = self.grants.write().map_err(poison_err)?;
        grants
            .entry(resource_id.into())
            .or_default()
            .extend(resources);
        Ok(())
    }

    /// Makes resolution of `resource_id` fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn fail(&self, resource_id: impl Into<String>) -> Result<()> {
        self.failing
            .write()
            .map_err(poison_err)?
            .insert(resource_id.into());
        Ok(())
    }

    /// Delays resolution of `resource_id` by `delay`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn delay(&self, resource_id: impl Into<String>, delay: Duration) -> Result<()> {
        self.delays
            .write()
            .map_err(poison_err)?
            .insert(resource_id.into(), delay);
        Ok(())
    }

    /// Number of `register_request` calls received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessControlService for MemoryAccessControl {
    async fn register_request(&self, request: &AccessRequest) -> Result<AccessGrant> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self
            .delays
            .read()
            .map_err(poison_err)?
            .get(&request.resource_id)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self
            .failing
            .read()
            .map_err(poison_err)?
            .contains(&request.resource_id)
        {
            return Err(Error::Internal {
                message: format!("access denied for {}", request.resource_id),
            });
        }

        let grants = self.grants.read().map_err(poison_err)?;
        let granted = grants
            .get(&request.resource_id)
            .ok_or_else(|| Error::NotFound(format!("no resources under {}", request.resource_id)))?;

        Ok(AccessGrant {
            request_id: RequestId::generate(),
            resources: granted.iter().cloned().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(resource_id: &str, user_id: &str, purpose: &str) -> AccessRequest {
        AccessRequest::new(resource_id, user_id, Context::purpose(purpose))
    }

    #[test]
    fn complete_request_validates() {
        assert!(request("file:/data", "alice", "payroll").validate().is_ok());
    }

    #[test]
    fn incomplete_requests_are_rejected() {
        for (res, user, purpose, field) in [
            ("", "alice", "payroll", "resource id"),
            ("file:/data", "  ", "payroll", "user id"),
            ("file:/data", "alice", "", "purpose"),
        ] {
            let err = request(res, user, purpose).validate().unwrap_err();
            assert!(err.is_configuration());
            assert!(err.to_string().contains(field), "{err}");
        }
    }

    #[test]
    fn request_json_roundtrip() {
        let req = AccessRequest::new(
            "file:/data",
            "alice",
            Context::purpose("audit").with_attribute("ticket", "T-1"),
        );
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("resourceId"));
        let parsed: AccessRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, req);
    }

    #[tokio::test]
    async fn memory_access_control_grants_and_fails() {
        let service = MemoryAccessControl::new();
        service
            .grant(
                "dir",
                [
                    (Resource::new("t", "a", "lines"), ConnectionDetail::service("s")),
                    (Resource::new("t", "b", "lines"), ConnectionDetail::service("s")),
                ],
            )
            .unwrap();
        service.fail("denied").unwrap();

        let grant = service
            .register_request(&request("dir", "alice", "p"))
            .await
            .unwrap();
        assert_eq!(grant.len(), 2);

        assert!(service.register_request(&request("denied", "alice", "p")).await.is_err());
        assert!(service.register_request(&request("unknown", "alice", "p")).await.is_err());
        assert_eq!(service.calls(), 3);
    }
}
