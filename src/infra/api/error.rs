use thiserror::Error;

use crate::application::graph::GraphError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport error calling `{url}`: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("remote call to `{url}` failed with status {status}: {body}")]
    RemoteCall {
        url: String,
        status: u16,
        body: String,
    },
    #[error("failed to decode response from `{url}`: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ApiError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// HTTP status of a rejected call.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteCall { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ApiError> for GraphError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Transport { .. } => GraphError::Unavailable(error.to_string()),
            ApiError::RemoteCall { status, body, .. } => GraphError::Rejected { status, body },
            ApiError::Decode { .. } => GraphError::Malformed(error.to_string()),
            ApiError::Url(_) | ApiError::Configuration(_) => {
                GraphError::Configuration(error.to_string())
            }
        }
    }
}
