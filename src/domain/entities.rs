//! Domain entities flowing between pipeline stages.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

pub use cohort_api_types::UserRecord;

/// "`follower` follows each of `followed`", as returned by one expansion fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowEdge {
    pub follower: u64,
    pub followed: Vec<u64>,
}

/// Explicit failure marker for one expansion fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub user_id: u64,
    pub reason: String,
}

/// A candidate group under construction.
///
/// `similarity` holds the anchor followed ids; `members` holds the followers
/// observed following the anchors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub similarity: BTreeSet<u64>,
    pub members: BTreeSet<u64>,
}

impl Bucket {
    pub fn anchored(followed: u64, members: BTreeSet<u64>) -> Self {
        Self {
            similarity: BTreeSet::from([followed]),
            members,
        }
    }

    pub fn overlap(&self, other: &Bucket) -> usize {
        self.members.intersection(&other.members).count()
    }

    /// Union `other` into `self`.
    pub fn absorb(&mut self, other: Bucket) {
        self.similarity.extend(other.similarity);
        self.members.extend(other.members);
    }

    /// Every id this bucket refers to, anchors first.
    pub fn referenced_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.similarity.iter().chain(self.members.iter()).copied()
    }
}

/// Final clustering output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub label: String,
    /// Anchor ids, including any whose details could not be resolved.
    pub similarity_ids: Vec<u64>,
    pub similarities: Vec<UserRecord>,
    pub members: Vec<UserRecord>,
}

impl Group {
    /// Expand a finished bucket; ids missing from `known` are left out of the details.
    pub fn from_bucket(
        bucket: &Bucket,
        known: &HashMap<u64, UserRecord>,
        label: impl FnOnce(&[UserRecord]) -> String,
    ) -> Self {
        let resolve = |ids: &BTreeSet<u64>| -> Vec<UserRecord> {
            ids.iter().filter_map(|id| known.get(id).cloned()).collect()
        };
        let members = resolve(&bucket.members);
        Self {
            label: label(&members),
            similarity_ids: bucket.similarity.iter().copied().collect(),
            similarities: resolve(&bucket.similarity),
            members,
        }
    }
}
