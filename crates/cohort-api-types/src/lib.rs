//! Request and response shapes for the social graph REST endpoints.

use serde::{Deserialize, Serialize};

/// Identifies the account whose graph is queried.
///
/// The endpoints accept either a numeric id or a screen name, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserRef {
    Id(u64),
    ScreenName(String),
}

impl UserRef {
    /// Query parameter naming this account.
    pub fn query_pair(&self) -> (&'static str, String) {
        match self {
            Self::Id(id) => ("user_id", id.to_string()),
            Self::ScreenName(name) => ("screen_name", name.clone()),
        }
    }
}

impl std::fmt::Display for UserRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::ScreenName(name) => write!(f, "@{name}"),
        }
    }
}

/// Response of `friends/ids`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendIds {
    pub ids: Vec<u64>,
    #[serde(default)]
    pub next_cursor: Option<i64>,
}

/// One account returned by `users/lookup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub screen_name: String,
    pub followers_count: u64,
    pub friends_count: u64,
    #[serde(default)]
    pub description: Option<String>,
}

impl UserRecord {
    /// Followers per followed account, damped so accounts following nobody stay finite.
    #[allow(clippy::cast_precision_loss)]
    pub fn reach_score(&self) -> f64 {
        self.followers_count as f64 / (self.friends_count as f64 + 1.0)
    }

    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }
}

/// Response of `lists/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRecord {
    pub id_str: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}
