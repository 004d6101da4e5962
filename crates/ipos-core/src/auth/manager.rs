use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::api::IPosClient;
use crate::clock::{Clock, SystemClock};
use crate::error::SessionError;

use super::{Authenticator, Credentials, SessionState, SessionValidator, TokenStore};

/// Entry point for anything that needs an authenticated IPos session.
///
/// One manager per session scope; clones share the same store. Concurrent
/// `ensure_logged_in` calls on an invalid session may each log in; the last
/// write wins and every resulting token is valid.
#[derive(Clone)]
pub struct SessionManager {
    client: IPosClient,
    store: Arc<dyn TokenStore>,
    validator: SessionValidator,
    authenticator: Authenticator,
}

impl SessionManager {
    pub fn new(client: IPosClient, store: Arc<dyn TokenStore>) -> Self {
        Self::with_clock(client, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        client: IPosClient,
        store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let validator = SessionValidator::new(client.clone(), store.clone(), clock.clone());
        let authenticator = Authenticator::new(client.clone(), store.clone(), clock);

        Self {
            client,
            store,
            validator,
            authenticator,
        }
    }

    pub fn validator(&self) -> &SessionValidator {
        &self.validator
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Make sure a server-accepted token is cached.
    ///
    /// Logs in only when the session is known to be invalid. An
    /// indeterminate probe failure is returned as is, without logging in,
    /// so an outage is never mistaken for an expired session.
    pub async fn ensure_logged_in(&self, credentials: &Credentials) -> Result<(), SessionError> {
        if self.validator.is_session_usable().await? {
            debug!("Session is valid, reusing cached token");
            return Ok(());
        }

        debug!("Session is not valid, authenticating");
        self.authenticator.authenticate(credentials).await
    }

    /// Derived state of the session; see [`SessionValidator::state`].
    pub async fn state(&self) -> Result<SessionState, SessionError> {
        self.validator.state().await
    }

    /// The cached bearer token, regardless of its age.
    pub fn access_token(&self) -> Result<Option<String>, SessionError> {
        Ok(self.store.read()?.map(|r| r.token().to_string()))
    }

    /// Ensure the session, then return the current user's profile.
    ///
    /// A usable session answers with the profile from its own check; only
    /// after a fresh login is the profile fetched separately.
    pub async fn current_user(&self, credentials: &Credentials) -> Result<Value, SessionError> {
        if let Some(user) = self.validator.current_user().await? {
            return Ok(user);
        }

        debug!("Session is not valid, authenticating before fetching user");
        self.authenticator.authenticate(credentials).await?;

        let token = self.access_token()?.ok_or_else(|| {
            SessionError::AuthProtocol("no token cached after authentication".into())
        })?;
        self.client
            .fetch_user_info(&token)
            .await
            .map_err(SessionError::SessionCheck)
    }
}
