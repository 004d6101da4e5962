use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{ApiError, IPosClient};
use crate::clock::Clock;
use crate::error::SessionError;

use super::{Credentials, TokenRecord, TokenStore};

/// Performs the credential login and caches the resulting token.
#[derive(Clone)]
pub struct Authenticator {
    client: IPosClient,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
}

impl Authenticator {
    pub fn new(client: IPosClient, store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            store,
            clock,
        }
    }

    /// Log in with `credentials` and store the returned token.
    ///
    /// Exactly one request is made. The store is only touched once a
    /// complete, well-formed response carrying a token has been received.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<(), SessionError> {
        debug!(identity = %credentials.identity, "Authenticating");

        let response = match self.client.login(credentials).await {
            Ok(response) => response,
            Err(ApiError::MalformedBody(detail)) => {
                return Err(SessionError::AuthProtocol(format!(
                    "malformed authentication response: {}",
                    detail
                )));
            }
            Err(e) => return Err(SessionError::AuthRequest(e)),
        };

        let token = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                SessionError::AuthProtocol("missing accessToken in authentication response".into())
            })?;

        self.store.write(TokenRecord::new(token, self.clock.now())?)?;

        info!(identity = %credentials.identity, "Authenticated with IPos");
        Ok(())
    }
}
