use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::api::IPosClient;
use crate::clock::Clock;
use crate::error::SessionError;

use super::{SessionState, TokenRecord, TokenStore};

/// Decides whether the cached session can be used.
///
/// A token has to be locally fresh *and* accepted by the server. Local
/// freshness alone cannot see server-side revocation, so a fresh token is
/// always probed with the "who am I" call before it is trusted.
#[derive(Clone)]
pub struct SessionValidator {
    client: IPosClient,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
}

impl SessionValidator {
    pub fn new(client: IPosClient, store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            store,
            clock,
        }
    }

    /// The cached record, if it is younger than the expiry window. No I/O
    /// beyond reading the store.
    fn fresh_record(&self) -> Result<Option<TokenRecord>, SessionError> {
        let record = self.store.read()?;
        let now = self.clock.now();
        Ok(record.filter(|r| !r.is_expired(now)))
    }

    /// True iff a token is cached and younger than the expiry window.
    pub fn is_locally_valid(&self) -> Result<bool, SessionError> {
        Ok(self.fresh_record()?.is_some())
    }

    /// Derive the current session state, probing the server when the
    /// cached token is locally fresh.
    ///
    /// A 401 from the probe means the session is definitely invalid. Any
    /// other failure (network, timeout, 5xx, malformed body) is reported
    /// as [`SessionError::SessionCheck`] because the session status is
    /// unknown rather than bad.
    pub async fn state(&self) -> Result<SessionState, SessionError> {
        Ok(self.inspect().await?.0)
    }

    /// The current user's profile when the session is usable, `None` when
    /// it is not. Makes the same single request as [`state`](Self::state).
    pub async fn current_user(&self) -> Result<Option<Value>, SessionError> {
        Ok(self.inspect().await?.1)
    }

    /// State plus the user info payload, which is only present for `Valid`.
    async fn inspect(&self) -> Result<(SessionState, Option<Value>), SessionError> {
        let Some(record) = self.store.read()? else {
            debug!("No cached token");
            return Ok((SessionState::NoToken, None));
        };

        if record.is_expired(self.clock.now()) {
            debug!(obtained_at = %record.obtained_at(), "Cached token expired locally");
            return Ok((SessionState::LocallyExpired, None));
        }

        match self.client.fetch_user_info(record.token()).await {
            Ok(user) => {
                debug!("Cached token accepted by server");
                Ok((SessionState::Valid, Some(user)))
            }
            Err(e) if e.is_unauthorized() => {
                warn!("Cached token rejected by server");
                Ok((SessionState::LocallyFreshRemoteRejected, None))
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch user info");
                Err(SessionError::SessionCheck(e))
            }
        }
    }

    pub async fn is_session_usable(&self) -> Result<bool, SessionError> {
        Ok(self.state().await?.is_usable())
    }
}
