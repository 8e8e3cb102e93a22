//! Client for the remote social graph REST API.

mod client;
mod config;
mod credentials;
mod error;

pub use client::{ID_CHUNK, LIST_NAME_LIMIT, RestClient};
pub use config::{ApiConfig, DEFAULT_TIMEOUT};
pub use credentials::Credentials;
pub use error::ApiError;
