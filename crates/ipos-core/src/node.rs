//! The IPos workflow node.
//!
//! The node has no business operations yet; executing it establishes the
//! session so later steps can call the API with the cached token.

use serde_json::Value;
use tracing::debug;

use crate::auth::{Credentials, SessionManager};
use crate::error::SessionError;

pub struct IPosNode {
    session: SessionManager,
}

impl IPosNode {
    pub const NAME: &'static str = "iPos";

    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Run the node once. Returns the output items (currently none).
    pub async fn execute(&self, credentials: &Credentials) -> Result<Vec<Value>, SessionError> {
        debug!(node = Self::NAME, "Execute IPos API");

        debug!(node = Self::NAME, "Ensure user is logged in");
        self.session.ensure_logged_in(credentials).await?;
        debug!(node = Self::NAME, "User is logged in, proceeding with execution");

        Ok(Vec::new())
    }
}
