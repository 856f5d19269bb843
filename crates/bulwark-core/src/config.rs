//! Job configuration.
//!
//! [`JobConfig`] is a plain string key/value map, so that a host framework
//! can ship it to workers as-is, plus one process-local slot for the
//! access-control service handle. Typed accessors encode values under the
//! keys in [`keys`] and validate eagerly: bad input is rejected when it is
//! set, not when the planner first reads it.
//!
//! ```rust
//! use bulwark_core::config::{JobConfig, ReaderFailureMode};
//! use bulwark_core::request::{AccessRequest, Context};
//! use bulwark_core::serializer::SerializerKind;
//!
//! # fn main() -> bulwark_core::Result<()> {
//! let mut config = JobConfig::new();
//! config.add_access_request(AccessRequest::new("file:/hr", "alice", Context::purpose("payroll")))?;
//! config.set_max_split_hint(4)?;
//! config.set_serializer(SerializerKind::JsonLines)?;
//! config.set_failure_mode(ReaderFailureMode::ContinueOnReadFailure);
//!
//! assert_eq!(config.access_requests()?.len(), 1);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::request::{AccessControlService, AccessRequest};
use crate::serializer::SerializerKind;

/// Well-known configuration keys.
pub mod keys {
    /// JSON array of pending access requests.
    pub const ACCESS_REQUESTS: &str = "bulwark.split.requests";
    /// Maximum splits hint (decimal integer, 0 = one resource per split).
    pub const MAX_SPLIT_HINT: &str = "bulwark.split.max_split_hint";
    /// Tagged JSON form of the record serializer.
    pub const SERIALIZER: &str = "bulwark.split.serializer";
    /// Reader failure mode.
    pub const FAILURE_MODE: &str = "bulwark.split.failure_mode";
    /// Whether the split hint applies per grant or to the merged plan.
    pub const PARTITION_SCOPE: &str = "bulwark.split.partition_scope";
}

/// Split hint used when none is configured.
pub const DEFAULT_MAX_SPLIT_HINT: i64 = 0;

/// How a reader reacts when one resource cannot be opened or read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderFailureMode {
    /// Log the failure, treat the resource as empty and move on.
    ContinueOnReadFailure,
    /// Abort the read and surface the failure to the caller.
    #[default]
    FailOnReadFailure,
}

impl ReaderFailureMode {
    /// Returns the configuration string for this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ContinueOnReadFailure => "continue_on_read_failure",
            Self::FailOnReadFailure => "fail_on_read_failure",
        }
    }
}

impl fmt::Display for ReaderFailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReaderFailureMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue_on_read_failure" => Ok(Self::ContinueOnReadFailure),
            "fail_on_read_failure" => Ok(Self::FailOnReadFailure),
            other => Err(Error::configuration(format!(
                "{} must be continue_on_read_failure or fail_on_read_failure (got {other})",
                keys::FAILURE_MODE
            ))),
        }
    }
}

/// Which resources a split hint is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionScope {
    /// Partition each grant's resources separately; the hint caps splits per request.
    #[default]
    PerGrant,
    /// Partition all granted resources together; the hint caps splits per plan.
    Merged,
}

impl PartitionScope {
    /// Returns the configuration string for this scope.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PerGrant => "per_grant",
            Self::Merged => "merged",
        }
    }
}

impl fmt::Display for PartitionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartitionScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_grant" => Ok(Self::PerGrant),
            "merged" => Ok(Self::Merged),
            other => Err(Error::configuration(format!(
                "{} must be per_grant or merged (got {other})",
                keys::PARTITION_SCOPE
            ))),
        }
    }
}

/// Key/value configuration for one split-planning job.
#[derive(Clone, Default)]
pub struct JobConfig {
    values: BTreeMap<String, String>,
    access_control: Option<Arc<dyn AccessControlService>>,
}

impl fmt::Debug for JobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobConfig")
            .field("values", &self.values)
            .field(
                "access_control",
                &self.access_control.as_ref().map(|_| "<service>"),
            )
            .finish()
    }
}

impl JobConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from raw key/value pairs, e.g. as received by a worker.
    #[must_use]
    pub fn from_values(values: BTreeMap<String, String>) -> Self {
        Self {
            values,
            access_control: None,
        }
    }

    /// Returns the raw key/value pairs.
    #[must_use]
    pub const fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Sets a raw value, bypassing typed validation.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns a raw value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns true if `key` has a value.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Validates and appends one access request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the request is incomplete; nothing
    /// is stored in that case.
    pub fn add_access_request(&mut self, request: AccessRequest) -> Result<()> {
        request.validate()?;
        let mut requests = self.access_requests()?;
        requests.push(request);
        let encoded = serde_json::to_string(&requests)?;
        self.set(keys::ACCESS_REQUESTS, encoded);
        Ok(())
    }

    /// Validates and appends each request in order.
    ///
    /// Requests before the first invalid one remain added.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn add_access_requests(
        &mut self,
        requests: impl IntoIterator<Item = AccessRequest>,
    ) -> Result<()> {
        requests
            .into_iter()
            .try_for_each(|request| self.add_access_request(request))
    }

    /// Returns the configured requests, or an empty list if none were added.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the stored value is not a request list.
    pub fn access_requests(&self) -> Result<Vec<AccessRequest>> {
        self.get(keys::ACCESS_REQUESTS)
            .map_or_else(|| Ok(Vec::new()), |raw| Ok(serde_json::from_str(raw)?))
    }

    /// Sets the maximum split hint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `hint` is negative.
    pub fn set_max_split_hint(&mut self, hint: i64) -> Result<()> {
        if hint < 0 {
            return Err(Error::InvalidArgument(format!(
                "max split hint must be >= 0 (got {hint})"
            )));
        }
        self.set(keys::MAX_SPLIT_HINT, hint.to_string());
        Ok(())
    }

    /// Returns the maximum split hint as stored.
    ///
    /// The value is returned signed and unchecked so that callers can detect
    /// a negative value written through [`JobConfig::set`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the stored value is not an integer.
    pub fn max_split_hint(&self) -> Result<i64> {
        let Some(raw) = self.get(keys::MAX_SPLIT_HINT) else {
            return Ok(DEFAULT_MAX_SPLIT_HINT);
        };
        raw.trim().parse::<i64>().map_err(|e| {
            Error::configuration(format!("{} must be an integer: {e}", keys::MAX_SPLIT_HINT))
        })
    }

    /// Stores the access-control service handle.
    pub fn set_access_control_service(&mut self, service: Arc<dyn AccessControlService>) {
        self.access_control = Some(service);
    }

    /// Returns the access-control service handle, if set.
    #[must_use]
    pub fn access_control_service(&self) -> Option<Arc<dyn AccessControlService>> {
        self.access_control.clone()
    }

    /// Stores the record serializer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the serializer cannot be encoded.
    pub fn set_serializer(&mut self, serializer: SerializerKind) -> Result<()> {
        let encoded = serde_json::to_string(&serializer)?;
        self.set(keys::SERIALIZER, encoded);
        Ok(())
    }

    /// Returns the configured record serializer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no serializer is set or the stored
    /// value names an unknown serializer.
    pub fn serializer(&self) -> Result<SerializerKind> {
        let raw = self.get(keys::SERIALIZER).ok_or_else(|| {
            Error::configuration("no serializer configured; call set_serializer first")
        })?;
        serde_json::from_str(raw)
            .map_err(|e| Error::configuration(format!("couldn't create serializer: {e}")))
    }

    /// Stores the reader failure mode.
    pub fn set_failure_mode(&mut self, mode: ReaderFailureMode) {
        self.set(keys::FAILURE_MODE, mode.as_str());
    }

    /// Returns the reader failure mode, defaulting to fail-on-read-failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the stored value is unknown.
    pub fn failure_mode(&self) -> Result<ReaderFailureMode> {
        self.get(keys::FAILURE_MODE)
            .map_or_else(|| Ok(ReaderFailureMode::default()), str::parse)
    }

    /// Stores the partition scope.
    pub fn set_partition_scope(&mut self, scope: PartitionScope) {
        self.set(keys::PARTITION_SCOPE, scope.as_str());
    }

    /// Returns the partition scope, defaulting to per-grant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the stored value is unknown.
    pub fn partition_scope(&self) -> Result<PartitionScope> {
        self.get(keys::PARTITION_SCOPE)
            .map_or_else(|| Ok(PartitionScope::default()), str::parse)
    }
}
