//! Split planning.
//!
//! The planner resolves every configured access request concurrently,
//! merges the granted resources and partitions them round-robin into
//! [`ResourceSplit`]s.
//!
//! ## Algorithm
//!
//! 1. Check preconditions (service configured, at least one request, hint >= 0)
//! 2. Spawn one resolution task per request, each bounded by the resolution timeout
//! 3. Join all; a failed or timed-out request contributes nothing
//! 4. Group granted resources per [`PartitionScope`], first grant wins on duplicates;
//!    resources with an empty id, type or format are dropped
//! 5. Per group, deal resources into `split_count(len, hint)` buckets
//!
//! ## Example
//!
//! ```rust
//! use bulwark_split::planner::{partition_round_robin, split_count};
//!
//! assert_eq!(split_count(5, 2), 2);
//! assert_eq!(partition_round_robin(vec![0, 1, 2, 3, 4], 2), vec![vec![0, 2, 4], vec![1, 3]]);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{Instrument, debug, info, warn};

use bulwark_core::observability::planning_span;
use bulwark_core::{
    AccessControlService, AccessGrant, AccessRequest, ConnectionDetail, JobConfig,
    PartitionScope, Resource,
};

use crate::error::{Error, Result};
use crate::metrics::{ResolutionOutcome, SplitMetrics};
use crate::settings::PlannerSettings;
use crate::split::ResourceSplit;

type Group = Vec<(Resource, ConnectionDetail)>;

/// Number of splits to create for `total` resources under `hint`.
///
/// A hint of 0 means one split per resource. Otherwise the hint caps the
/// split count and never creates empty splits.
#[must_use]
pub fn split_count(total: usize, hint: usize) -> usize {
    if hint == 0 { total } else { hint.min(total) }
}

/// Deals `items` into `num_splits` buckets: item `i` lands in bucket
/// `i % num_splits`.
///
/// Returns no buckets when `num_splits` is 0.
#[must_use]
pub fn partition_round_robin<T>(items: Vec<T>, num_splits: usize) -> Vec<Vec<T>> {
    if num_splits == 0 {
        return Vec::new();
    }
    let per_bucket = items.len().div_ceil(num_splits);
    let mut buckets: Vec<Vec<T>> = (0..num_splits)
        .map(|_| Vec::with_capacity(per_bucket))
        .collect();
    for (index, item) in items.into_iter().enumerate() {
        buckets[index % num_splits].push(item);
    }
    buckets
}

/// Turns a job configuration into splits.
#[derive(Debug, Clone, Default)]
pub struct SplitPlanner {
    settings: PlannerSettings,
    metrics: SplitMetrics,
}

impl SplitPlanner {
    /// Creates a planner with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a planner with explicit settings.
    #[must_use]
    pub const fn with_settings(settings: PlannerSettings) -> Self {
        Self {
            settings,
            metrics: SplitMetrics::new(),
        }
    }

    /// Returns the planner settings.
    #[must_use]
    pub const fn settings(&self) -> &PlannerSettings {
        &self.settings
    }

    /// Plans the splits for a job.
    ///
    /// All requests are issued before any is awaited. A request that fails
    /// or times out is logged and excluded; if every request fails the plan
    /// is empty.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no access-control service or no
    /// request is configured, or if the split hint is negative or unparsable.
    /// With fail-fast enabled, returns [`Error::Resolution`] for the first
    /// failed request in configured order.
    pub async fn plan(&self, config: &JobConfig) -> Result<Vec<ResourceSplit>> {
        let service = config.access_control_service().ok_or_else(|| {
            bulwark_core::Error::configuration("no access control service configured")
        })?;
        let requests = config.access_requests()?;
        if requests.is_empty() {
            return Err(bulwark_core::Error::configuration("no access requests configured").into());
        }
        let hint = config.max_split_hint()?;
        let hint = usize::try_from(hint).map_err(|_| {
            bulwark_core::Error::configuration(format!("split hint must be >= 0 (got {hint})"))
        })?;
        let scope = config.partition_scope()?;

        let span = planning_span(requests.len());
        async move {
            let timer = self.metrics.start_timer();

            let grants = self.resolve(service, requests).await?;
            let groups = group_resources(grants, scope);
            let total: usize = groups.iter().map(Vec::len).sum();

            let splits: Vec<ResourceSplit> = groups
                .into_iter()
                .flat_map(|group| {
                    let num_splits = split_count(group.len(), hint);
                    partition_round_robin(group, num_splits)
                })
                .map(|bucket| ResourceSplit::new(bucket.into_iter().collect()))
                .collect();

            self.metrics.record_plan(timer.elapsed(), splits.len());
            info!(
                resources = total,
                splits = splits.len(),
                hint,
                scope = %scope,
                "planned splits"
            );
            Ok(splits)
        }
        .instrument(span)
        .await
    }

    async fn resolve(
        &self,
        service: Arc<dyn AccessControlService>,
        requests: Vec<AccessRequest>,
    ) -> Result<Vec<AccessGrant>> {
        let timeout = self.settings.resolution_timeout;
        let handles: Vec<_> = requests
            .iter()
            .cloned()
            .map(|request| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    tokio::time::timeout(timeout, service.register_request(&request)).await
                })
            })
            .collect();

        let outcomes = join_all(handles).await;

        let mut grants = Vec::with_capacity(outcomes.len());
        for (request, outcome) in requests.iter().zip(outcomes) {
            let (result, message) = match outcome {
                Ok(Ok(Ok(grant))) => {
                    self.metrics.record_resolution(ResolutionOutcome::Success);
                    debug!(
                        resource_id = %request.resource_id,
                        request_id = %grant.request_id,
                        resources = grant.len(),
                        "access request resolved"
                    );
                    grants.push(grant);
                    continue;
                }
                Ok(Ok(Err(e))) => (ResolutionOutcome::Failure, e.to_string()),
                Ok(Err(_)) => (
                    ResolutionOutcome::Timeout,
                    format!("timed out after {}ms", timeout.as_millis()),
                ),
                Err(e) => (
                    ResolutionOutcome::Failure,
                    format!("resolution task failed: {e}"),
                ),
            };

            self.metrics.record_resolution(result);
            warn!(
                resource_id = %request.resource_id,
                user_id = %request.user_id,
                error = %message,
                "access request resolution failed, excluding it from the plan"
            );
            if self.settings.fail_fast {
                return Err(Error::Resolution {
                    resource_id: request.resource_id.clone(),
                    message,
                });
            }
        }
        Ok(grants)
    }
}

fn group_resources(grants: Vec<AccessGrant>, scope: PartitionScope) -> Vec<Group> {
    let mut seen = BTreeSet::new();
    let mut dedup = |group: &mut Group, resources: BTreeMap<Resource, ConnectionDetail>| {
        for (resource, connection) in resources {
            if let Err(e) = resource.validate() {
                warn!(resource = %resource, error = %e, "dropping malformed granted resource");
                continue;
            }
            if seen.insert(resource.clone()) {
                group.push((resource, connection));
            }
        }
    };

    match scope {
        PartitionScope::PerGrant => grants
            .into_iter()
            .map(|grant| {
                let mut group = Group::new();
                dedup(&mut group, grant.resources);
                group
            })
            .filter(|group| !group.is_empty())
            .collect(),
        PartitionScope::Merged => {
            let mut group = Group::new();
            for grant in grants {
                dedup(&mut group, grant.resources);
            }
            if group.is_empty() {
                Vec::new()
            } else {
                vec![group]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulwark_core::RequestId;

    fn grant(ids: &[&str]) -> AccessGrant {
        ids.iter().fold(AccessGrant::new(RequestId::generate()), |grant, id| {
            grant.with_resource(Resource::new("t", *id, "lines"), ConnectionDetail::service("s"))
        })
    }

    #[test]
    fn split_count_follows_hint() {
        assert_eq!(split_count(5, 0), 5);
        assert_eq!(split_count(5, 1), 1);
        assert_eq!(split_count(5, 2), 2);
        assert_eq!(split_count(5, 99_999), 5);
        assert_eq!(split_count(0, 3), 0);
        assert_eq!(split_count(0, 0), 0);
    }

    #[test]
    fn round_robin_deals_in_index_order() {
        let buckets = partition_round_robin(vec!["a", "b", "c", "d", "e"], 2);
        assert_eq!(buckets, vec![vec!["a", "c", "e"], vec!["b", "d"]]);
    }

    #[test]
    fn round_robin_with_zero_splits_is_empty() {
        assert!(partition_round_robin(vec![1, 2, 3], 0).is_empty());
    }

    #[test]
    fn per_grant_scope_keeps_grants_apart() {
        let groups = group_resources(
            vec![grant(&["a", "b", "c"]), grant(&[]), grant(&["d"])],
            PartitionScope::PerGrant,
        );
        let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 1]);
    }

    #[test]
    fn merged_scope_unions_grants_in_order() {
        let groups = group_resources(
            vec![grant(&["c", "d"]), grant(&["a", "b"])],
            PartitionScope::Merged,
        );
        assert_eq!(groups.len(), 1);
        let ids: Vec<&str> = groups[0].iter().map(|(r, _)| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d", "a", "b"]);
    }

    #[test]
    fn duplicate_resources_keep_first_grant() {
        let groups = group_resources(
            vec![grant(&["a", "b"]), grant(&["b", "c"])],
            PartitionScope::PerGrant,
        );
        let ids: Vec<Vec<&str>> = groups
            .iter()
            .map(|g| g.iter().map(|(r, _)| r.id.as_str()).collect())
            .collect();
        assert_eq!(ids, vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn malformed_granted_resources_are_dropped() {
        let grant = grant(&["a"])
            .with_resource(Resource::new("t", "  ", "lines"), ConnectionDetail::service("s"))
            .with_resource(Resource::new("", "b", "lines"), ConnectionDetail::service("s"));
        let groups = group_resources(vec![grant], PartitionScope::PerGrant);
        let ids: Vec<&str> = groups[0].iter().map(|(r, _)| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn no_grants_yield_no_groups() {
        assert!(group_resources(Vec::new(), PartitionScope::Merged).is_empty());
        assert!(group_resources(vec![grant(&[])], PartitionScope::PerGrant).is_empty());
    }
}
