//! The social graph the grouping pipeline reads from.

use async_trait::async_trait;
use thiserror::Error;

use cohort_api_types::UserRef;

use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("social graph unreachable: {0}")]
    Unavailable(String),
    #[error("social graph rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("malformed social graph response: {0}")]
    Malformed(String),
    #[error("social graph client misconfigured: {0}")]
    Configuration(String),
}

/// Read access to follow relationships and account details.
#[async_trait]
pub trait SocialGraph: Send + Sync {
    /// Ids `user` follows, in the order the remote side lists them.
    async fn following(&self, user: &UserRef) -> Result<Vec<u64>, GraphError>;

    /// Details for every id, ordered chunk by chunk as requested.
    async fn user_details(&self, ids: &[u64]) -> Result<Vec<UserRecord>, GraphError>;
}
