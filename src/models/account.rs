//! Linked provider accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// External provider a user can link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Calendar,
    Tasks,
    Photos,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Calendar => "calendar",
            Provider::Tasks => "tasks",
            Provider::Photos => "photos",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "calendar" => Ok(Provider::Calendar),
            "tasks" => Ok(Provider::Tasks),
            "photos" => Ok(Provider::Photos),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user's connection to an external provider.
///
/// At most one record exists per (user_id, provider) pair; the store enforces
/// this by keying on the pair. The refresh token itself is kept server-side
/// only and never appears on this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedAccount {
    /// Owning user id
    pub user_id: String,
    /// Which provider this connects to
    pub provider: Provider,
    /// Current access token (opaque, possibly expired)
    pub access_token: String,
    /// Absolute access-token expiry
    pub expires_at: DateTime<Utc>,
    /// Whether a server-side refresh token exists for this account
    pub refreshable: bool,
    /// Display name shown when attributing aggregated items
    pub display_name: String,
    /// Attribution color (hex string chosen by the user)
    pub color: Option<String>,
}

impl LinkedAccount {
    /// Whether the access token is still valid at `now` with `margin_secs`
    /// of headroom before expiry.
    pub fn token_valid_at(&self, now: DateTime<Utc>, margin_secs: i64) -> bool {
        now + chrono::Duration::seconds(margin_secs) < self.expires_at
    }
}
