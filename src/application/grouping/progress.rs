//! Progress events emitted at stage boundaries.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Seed,
    Enrich,
    Expand,
    Consolidate,
    Describe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Emitted once before any remote call.
    Planned { total_steps: usize },
    StageFinished(Stage),
    CandidateFetched { user_id: u64, succeeded: bool },
    Finished { groups: usize },
}

impl PipelineEvent {
    /// Whether this event advances the planned step count.
    pub fn is_step(&self) -> bool {
        match self {
            Self::StageFinished(stage) => *stage != Stage::Expand,
            Self::CandidateFetched { .. } => true,
            Self::Planned { .. } | Self::Finished { .. } => false,
        }
    }
}

/// Receives pipeline events. Called from concurrent tasks.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, event: &PipelineEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn notify(&self, _event: &PipelineEvent) {}
}

/// Logs percentage completion through `tracing`.
#[derive(Debug, Default)]
pub struct LogProgress {
    total: AtomicUsize,
    done: AtomicUsize,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn percent(&self) -> usize {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            return 0;
        }
        (self.done.load(Ordering::Relaxed) * 100 / total).min(100)
    }
}

impl ProgressSink for LogProgress {
    fn notify(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Planned { total_steps } => {
                self.total.store(*total_steps, Ordering::Relaxed);
                self.done.store(0, Ordering::Relaxed);
            }
            PipelineEvent::Finished { groups } => {
                self.done
                    .store(self.total.load(Ordering::Relaxed), Ordering::Relaxed);
                info!(
                    target = "cohort::progress",
                    percent = 100,
                    groups = *groups,
                    "Grouping finished"
                );
                return;
            }
            _ => {}
        }

        if event.is_step() {
            self.done.fetch_add(1, Ordering::Relaxed);
        }
        info!(
            target = "cohort::progress",
            percent = self.percent(),
            event = ?event,
            "Grouping progress"
        );
    }
}
