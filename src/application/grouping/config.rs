//! Clustering thresholds.

use std::num::NonZeroUsize;

const DEFAULT_USER_CALL_COUNT: usize = 150;
const DEFAULT_SUPER_USER_FILTER: u64 = 50_000;
const DEFAULT_FOLLOWED_COUNT_FILTER: usize = 2;
const DEFAULT_INTERSECTION_FILTER: f64 = 0.4;
const DEFAULT_CORRESPONDENCE_FILTER: usize = 15;
const DEFAULT_WORKER_POOL_SIZE: NonZeroUsize = NonZeroUsize::new(20).unwrap();

/// Fixed per-run tuning of the grouping pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupingConfig {
    /// How many top-ranked candidates get their own followed list fetched.
    pub user_call_count: usize,
    /// Accounts with more followers than this are set aside as power users.
    pub super_user_filter: u64,
    /// A followed account needs more than this many observed followers to form a bucket.
    pub followed_count_filter: usize,
    /// Fraction of a partner bucket's members that must be shared before merging.
    pub intersection_filter: f64,
    /// A consolidated bucket needs more anchors than this to be reported.
    pub correspondence_filter: usize,
    /// Maximum in-flight expansion fetches.
    pub worker_pool_size: NonZeroUsize,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            user_call_count: DEFAULT_USER_CALL_COUNT,
            super_user_filter: DEFAULT_SUPER_USER_FILTER,
            followed_count_filter: DEFAULT_FOLLOWED_COUNT_FILTER,
            intersection_filter: DEFAULT_INTERSECTION_FILTER,
            correspondence_filter: DEFAULT_CORRESPONDENCE_FILTER,
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
        }
    }
}

impl From<&crate::config::GroupingSettings> for GroupingConfig {
    fn from(settings: &crate::config::GroupingSettings) -> Self {
        Self {
            user_call_count: settings.user_call_count,
            super_user_filter: settings.super_user_filter,
            followed_count_filter: settings.followed_count_filter,
            intersection_filter: settings.intersection_filter,
            correspondence_filter: settings.correspondence_filter,
            worker_pool_size: settings.worker_pool_size,
        }
    }
}

impl GroupingConfig {
    /// Progress steps of one run: seed, enrich, one per candidate, consolidate, describe.
    pub fn planned_steps(&self) -> usize {
        2 + self.user_call_count + 2
    }
}
