//! Interest-group discovery.
//!
//! Seed -> enrich -> filter power users -> rank -> concurrent expansion ->
//! bucket -> consolidate -> correspondence filter -> detail expansion.

pub mod buckets;
mod config;
pub mod label;
mod pipeline;
mod progress;

pub use config::GroupingConfig;
pub use pipeline::{
    BucketTally, ExpansionStats, FetchOutcome, GroupingError, GroupingReport, Grouper,
    drain_follow_edges,
};
pub use progress::{LogProgress, NoProgress, PipelineEvent, ProgressSink, Stage};
