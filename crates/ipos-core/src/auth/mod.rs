//! Session management for the IPos API.
//!
//! This module provides:
//! - `TokenRecord` / `TokenStore`: the cached bearer token and where it lives
//! - `Authenticator`: credential login that refreshes the cached token
//! - `SessionValidator`: local expiry check followed by a remote probe
//! - `SessionManager`: `ensure_logged_in`, the single entry point for nodes
//!
//! Tokens are trusted locally for 10 minutes after they were obtained and
//! are always confirmed against the server before use.

pub mod authenticator;
pub mod credentials;
pub mod manager;
pub mod session;
pub mod store;
pub mod validator;

pub use authenticator::Authenticator;
pub use credentials::{CredentialField, Credentials, CREDENTIAL_NAME};
pub use manager::SessionManager;
pub use session::{SessionState, TokenRecord, EXPIRY_WINDOW_MINUTES};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use validator::SessionValidator;
