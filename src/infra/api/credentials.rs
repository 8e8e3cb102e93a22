use std::fmt;

use reqwest::header::HeaderValue;

use super::error::ApiError;

/// Pre-issued access token pair. Obtaining one is outside this crate.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
    secret: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            secret: secret.into(),
        }
    }

    pub fn auth_header(&self) -> Result<HeaderValue, ApiError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|err| ApiError::configuration(format!("invalid access token: {err}")))?;
        value.set_sensitive(true);
        Ok(value)
    }

    /// Cache key fragments; responses are only shared between identical credentials.
    pub fn key_parts(&self) -> [&str; 2] {
        [&self.token, &self.secret]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}
