use std::time::Duration;

use url::Url;

use super::credentials::Credentials;

/// Request timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub root: Url,
    pub timeout: Duration,
    pub credentials: Option<Credentials>,
}

impl ApiConfig {
    pub fn new(root: Url) -> Self {
        Self {
            root,
            timeout: DEFAULT_TIMEOUT,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

impl From<&crate::config::ApiSettings> for ApiConfig {
    fn from(settings: &crate::config::ApiSettings) -> Self {
        let credentials = match (&settings.token, &settings.secret) {
            (Some(token), Some(secret)) => Some(Credentials::new(token, secret)),
            _ => None,
        };
        Self {
            root: settings.root.clone(),
            timeout: settings.timeout,
            credentials,
        }
    }
}
