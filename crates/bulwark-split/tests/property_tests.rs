//! Property-based tests for split planning invariants.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;
use tokio_test::block_on;

use bulwark_core::prelude::*;
use bulwark_core::MemoryAccessControl;
use bulwark_split::planner::{SplitPlanner, partition_round_robin, split_count};
use bulwark_split::split::{InputSplit, ResourceSplit};

proptest! {
    #[test]
    fn round_robin_buckets_are_balanced(total in 1usize..200, hint in 1usize..50) {
        let num_splits = split_count(total, hint);
        let buckets = partition_round_robin((0..total).collect(), num_splits);

        prop_assert_eq!(buckets.len(), num_splits);
        let min = buckets.iter().map(Vec::len).min().unwrap();
        let max = buckets.iter().map(Vec::len).max().unwrap();
        prop_assert!(max - min <= 1);
        prop_assert!(min >= 1);

        let flattened: BTreeSet<usize> = buckets.iter().flatten().copied().collect();
        prop_assert_eq!(flattened.len(), total);
        prop_assert_eq!(buckets.iter().map(Vec::len).sum::<usize>(), total);
    }

    #[test]
    fn split_count_never_exceeds_resources(total in 0usize..500, hint in 0usize..1000) {
        let count = split_count(total, hint);
        prop_assert!(count <= total);
        if hint == 0 {
            prop_assert_eq!(count, total);
        }
    }

    #[test]
    fn planned_splits_cover_every_grant_once(
        grant_sizes in prop::collection::vec(0usize..12, 1..5),
        hint in 0i64..10,
    ) {
        let service = Arc::new(MemoryAccessControl::new());
        let mut config = JobConfig::new();
        let mut expected = 0;
        for (g, size) in grant_sizes.iter().enumerate() {
            let dir = format!("dir:/{g}");
            let resources = (0..*size).map(|i| {
                (
                    Resource::new("t", format!("{g}-{i}"), "lines"),
                    ConnectionDetail::service("s"),
                )
            });
            service.grant(dir.clone(), resources).unwrap();
            config
                .add_access_request(AccessRequest::new(dir, "u", Context::purpose("p")))
                .unwrap();
            expected += size;
        }
        config.set_access_control_service(service);
        config.set_max_split_hint(hint).unwrap();

        let splits: Vec<ResourceSplit> = block_on(SplitPlanner::new().plan(&config)).unwrap();

        let mut seen = BTreeSet::new();
        for split in &splits {
            prop_assert!(!InputSplit::is_empty(split));
            for resource in split.resources().keys() {
                prop_assert!(seen.insert(resource.id.clone()));
            }
        }
        prop_assert_eq!(seen.len(), expected);
    }
}

