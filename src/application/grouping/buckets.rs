//! Follower bucketing and greedy consolidation.
//!
//! Expansion results arrive as "follower -> followed ids" edges. They are
//! inverted into one bucket per followed id, thinned by follower count, then
//! merged in a single order-dependent pass.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::entities::{Bucket, FollowEdge, UserRecord};

/// Followers observed per followed id. Insertion order does not matter.
#[derive(Debug, Default)]
pub struct FollowerIndex {
    followers_by_followed: BTreeMap<u64, BTreeSet<u64>>,
}

impl FollowerIndex {
    pub fn record(&mut self, edge: FollowEdge) {
        let FollowEdge { follower, followed } = edge;
        for id in followed {
            self.followers_by_followed
                .entry(id)
                .or_default()
                .insert(follower);
        }
    }

    /// One bucket per followed id with more than `min_followers` followers, ordered by id.
    pub fn into_buckets(self, min_followers: usize) -> Vec<Bucket> {
        self.followers_by_followed
            .into_iter()
            .filter(|(_, followers)| followers.len() > min_followers)
            .map(|(followed, followers)| Bucket::anchored(followed, followers))
            .collect()
    }
}

/// Overlap a bucket must strictly exceed to merge into a partner with `partner_members` members.
#[allow(clippy::cast_precision_loss)]
pub fn merge_threshold(partner_members: usize, intersection_filter: f64) -> f64 {
    (partner_members as f64 * intersection_filter).max(2.0)
}

/// Greedy single-pass merge.
///
/// Buckets are visited from last to first. Each one is compared against every
/// other live bucket from the front; the first partner whose member overlap
/// exceeds [`merge_threshold`] absorbs it. Buckets merged into are not
/// revisited, so transitively mergeable buckets may stay apart.
#[allow(clippy::cast_precision_loss)]
pub fn consolidate(mut buckets: Vec<Bucket>, intersection_filter: f64) -> Vec<Bucket> {
    for idx in (0..buckets.len()).rev() {
        let partner = (0..buckets.len()).filter(|&other| other != idx).find(|&other| {
            let overlap = buckets[idx].overlap(&buckets[other]);
            overlap as f64 > merge_threshold(buckets[other].members.len(), intersection_filter)
        });

        if let Some(other) = partner {
            let merged = buckets.remove(idx);
            let target = if other > idx { other - 1 } else { other };
            buckets[target].absorb(merged);
        }
    }
    buckets
}

/// Keep buckets anchored by more than `correspondence_filter` followed ids.
pub fn retain_correspondent(buckets: Vec<Bucket>, correspondence_filter: usize) -> Vec<Bucket> {
    buckets
        .into_iter()
        .filter(|bucket| bucket.similarity.len() > correspondence_filter)
        .collect()
}

/// Split accounts into `(power_users, candidates)` by follower ceiling.
pub fn partition_power_users(
    users: Vec<UserRecord>,
    super_user_filter: u64,
) -> (Vec<UserRecord>, Vec<UserRecord>) {
    users
        .into_iter()
        .partition(|user| user.followers_count > super_user_filter)
}

/// Ids of the `count` best-scoring candidates.
///
/// Candidates are stably sorted by ascending reach score and the tail is
/// taken, so among equal scores the later input wins.
pub fn select_candidates(candidates: &[UserRecord], count: usize) -> Vec<u64> {
    let mut ranked: Vec<&UserRecord> = candidates.iter().collect();
    ranked.sort_by(|a, b| a.reach_score().total_cmp(&b.reach_score()));
    let skip = ranked.len().saturating_sub(count);
    ranked[skip..].iter().map(|user| user.id).collect()
}
