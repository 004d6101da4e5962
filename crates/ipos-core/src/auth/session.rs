use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// How long a token is trusted locally after it was obtained.
/// IPos sessions go stale quickly; anything older is re-authenticated
/// without asking the server.
pub const EXPIRY_WINDOW_MINUTES: i64 = 10;

/// The cached bearer token and the instant it was obtained.
///
/// Serializes to the persisted layout
/// `{"accessToken": "...", "accessTokenObtainedAt": <ms since epoch>}`.
/// Both fields are always written together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    #[serde(rename = "accessToken")]
    token: String,
    #[serde(rename = "accessTokenObtainedAt", with = "chrono::serde::ts_milliseconds")]
    obtained_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn new(token: impl Into<String>, obtained_at: DateTime<Utc>) -> Result<Self, StorageError> {
        let token = token.into();
        if token.is_empty() {
            return Err(StorageError::InvalidRecord("empty access token".to_string()));
        }
        Ok(Self { token, obtained_at })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn obtained_at(&self) -> DateTime<Utc> {
        self.obtained_at
    }

    pub fn expiry_window() -> Duration {
        Duration::minutes(EXPIRY_WINDOW_MINUTES)
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.obtained_at
    }

    /// Expired once the age reaches the window (the boundary itself is expired).
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.age(now) >= Self::expiry_window()
    }

    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Duration {
        self.obtained_at + Self::expiry_window() - now
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        self.time_until_expiry(now).num_minutes().max(0)
    }
}

/// Derived view of the session. Computed on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing cached yet
    NoToken,
    /// A token is cached but older than the expiry window
    LocallyExpired,
    /// Fresh locally, but the server answered the probe with 401
    LocallyFreshRemoteRejected,
    Valid,
}

impl SessionState {
    pub fn is_usable(self) -> bool {
        self == SessionState::Valid
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::NoToken => "no token",
            SessionState::LocallyExpired => "expired",
            SessionState::LocallyFreshRemoteRejected => "rejected by server",
            SessionState::Valid => "valid",
        };
        f.write_str(label)
    }
}
