use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use cohort_api_types::UserRef;

use crate::application::graph::{GraphError, SocialGraph};
use crate::domain::entities::{Bucket, FetchFailure, FollowEdge, Group, UserRecord};

use super::buckets::{
    FollowerIndex, consolidate, partition_power_users, retain_correspondent, select_candidates,
};
use super::config::GroupingConfig;
use super::label;
use super::progress::{NoProgress, PipelineEvent, ProgressSink, Stage};

const METRIC_FETCH_FAILED: &str = "cohort_candidate_fetch_failed_total";

#[derive(Debug, Error)]
pub enum GroupingError {
    #[error("failed to fetch accounts followed by {target}: {source}")]
    Seed {
        target: String,
        #[source]
        source: GraphError,
    },
    #[error("failed to fetch details of followed accounts: {0}")]
    Enrich(#[source] GraphError),
}

pub type FetchOutcome = Result<FollowEdge, FetchFailure>;

/// Accounting for the concurrent expansion stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpansionStats {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Buckets built from expansion results, before consolidation.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketTally {
    pub buckets: Vec<Bucket>,
    pub stats: ExpansionStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupingReport {
    pub groups: Vec<Group>,
    /// Accounts excluded from clustering for having too many followers.
    pub power_users: Vec<UserRecord>,
    pub expansion: ExpansionStats,
}

/// Runs the fetch-and-cluster pipeline for one account at a time.
///
/// Holds no per-run state; concurrent runs on one `Grouper` are independent.
pub struct Grouper<G> {
    graph: Arc<G>,
    config: GroupingConfig,
    progress: Arc<dyn ProgressSink>,
}

impl<G: SocialGraph> Grouper<G> {
    pub fn new(graph: Arc<G>, config: GroupingConfig) -> Self {
        Self {
            graph,
            config,
            progress: Arc::new(NoProgress),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub async fn generate(&self, target: &UserRef) -> Result<GroupingReport, GroupingError> {
        let started_at = Instant::now();
        self.progress.notify(&PipelineEvent::Planned {
            total_steps: self.config.planned_steps(),
        });

        let followed = self
            .graph
            .following(target)
            .await
            .map_err(|source| GroupingError::Seed {
                target: target.to_string(),
                source,
            })?;
        self.progress.notify(&PipelineEvent::StageFinished(Stage::Seed));

        let details = self
            .graph
            .user_details(&followed)
            .await
            .map_err(GroupingError::Enrich)?;
        self.progress
            .notify(&PipelineEvent::StageFinished(Stage::Enrich));

        let (power_users, candidates) =
            partition_power_users(details, self.config.super_user_filter);
        let selected = select_candidates(&candidates, self.config.user_call_count);
        info!(
            target = "cohort::grouping",
            op = "grouping::generate",
            account = %target,
            followed = followed.len(),
            power_users = power_users.len(),
            candidates = candidates.len(),
            selected = selected.len(),
            "Expanding top candidates"
        );

        let tally = self.expand(&selected).await;
        self.progress
            .notify(&PipelineEvent::StageFinished(Stage::Expand));

        let bucket_count = tally.buckets.len();
        let clusters = retain_correspondent(
            consolidate(tally.buckets, self.config.intersection_filter),
            self.config.correspondence_filter,
        );
        self.progress
            .notify(&PipelineEvent::StageFinished(Stage::Consolidate));

        let known: HashMap<u64, UserRecord> = candidates
            .into_iter()
            .chain(power_users.iter().cloned())
            .map(|user| (user.id, user))
            .collect();
        let groups = self.describe(&clusters, known).await;
        self.progress
            .notify(&PipelineEvent::StageFinished(Stage::Describe));

        info!(
            target = "cohort::grouping",
            op = "grouping::generate",
            result = "ok",
            account = %target,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            dispatched = tally.stats.dispatched,
            failed = tally.stats.failed,
            buckets = bucket_count,
            groups = groups.len(),
            "Grouping complete"
        );
        self.progress.notify(&PipelineEvent::Finished {
            groups: groups.len(),
        });

        Ok(GroupingReport {
            groups,
            power_users,
            expansion: tally.stats,
        })
    }

    /// Fetch each candidate's followed list with bounded concurrency while a
    /// consumer folds results into buckets.
    ///
    /// Returns once every fetch has finished and the consumer has drained one
    /// message per dispatched fetch.
    pub async fn expand(&self, candidates: &[u64]) -> BucketTally {
        let dispatched = candidates.len();
        let limit = self.config.worker_pool_size.get();
        let (tx, rx) = mpsc::channel::<FetchOutcome>(limit);

        let producers = futures::stream::iter(candidates.iter().copied()).for_each_concurrent(
            limit,
            |user_id| {
                let tx = tx.clone();
                async move {
                    let outcome = self.fetch_following(user_id).await;
                    if tx.send(outcome).await.is_err() {
                        warn!(
                            target = "cohort::grouping",
                            op = "grouping::expand",
                            user_id,
                            result = "consumer_gone",
                            "Expansion consumer stopped before all results arrived"
                        );
                    }
                }
            },
        );
        let consumer = drain_follow_edges(
            rx,
            dispatched,
            self.config.followed_count_filter,
            self.progress.as_ref(),
        );

        let ((), tally) = tokio::join!(producers, consumer);
        tally
    }

    async fn fetch_following(&self, user_id: u64) -> FetchOutcome {
        match self.graph.following(&UserRef::Id(user_id)).await {
            Ok(followed) => Ok(FollowEdge {
                follower: user_id,
                followed,
            }),
            Err(err) => {
                warn!(
                    target = "cohort::grouping",
                    op = "grouping::fetch_following",
                    user_id,
                    result = "error",
                    error = %err,
                    "Candidate fetch failed; contributing no edges"
                );
                counter!(METRIC_FETCH_FAILED).increment(1);
                Err(FetchFailure {
                    user_id,
                    reason: err.to_string(),
                })
            }
        }
    }

    async fn describe(
        &self,
        clusters: &[Bucket],
        mut known: HashMap<u64, UserRecord>,
    ) -> Vec<Group> {
        let missing: Vec<u64> = clusters
            .iter()
            .flat_map(Bucket::referenced_ids)
            .filter(|id| !known.contains_key(id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if !missing.is_empty() {
            match self.graph.user_details(&missing).await {
                Ok(records) => known.extend(records.into_iter().map(|user| (user.id, user))),
                Err(err) => warn!(
                    target = "cohort::grouping",
                    op = "grouping::describe",
                    result = "error",
                    missing = missing.len(),
                    error = %err,
                    "Detail lookup failed; groups will omit unresolved accounts"
                ),
            }
        }

        clusters
            .iter()
            .map(|bucket| Group::from_bucket(bucket, &known, label::describe))
            .collect()
    }
}

/// Consume exactly `dispatched` outcomes from `rx` and build the surviving buckets.
pub async fn drain_follow_edges(
    mut rx: mpsc::Receiver<FetchOutcome>,
    dispatched: usize,
    followed_count_filter: usize,
    progress: &dyn ProgressSink,
) -> BucketTally {
    let mut index = FollowerIndex::default();
    let mut stats = ExpansionStats {
        dispatched,
        ..ExpansionStats::default()
    };

    for _ in 0..dispatched {
        let Some(outcome) = rx.recv().await else {
            warn!(
                target = "cohort::grouping",
                op = "grouping::drain",
                received = stats.succeeded + stats.failed,
                dispatched,
                "Expansion channel closed early"
            );
            break;
        };
        match outcome {
            Ok(edge) => {
                stats.succeeded += 1;
                progress.notify(&PipelineEvent::CandidateFetched {
                    user_id: edge.follower,
                    succeeded: true,
                });
                index.record(edge);
            }
            Err(failure) => {
                stats.failed += 1;
                progress.notify(&PipelineEvent::CandidateFetched {
                    user_id: failure.user_id,
                    succeeded: false,
                });
            }
        }
    }

    BucketTally {
        buckets: index.into_buckets(followed_count_filter),
        stats,
    }
}
