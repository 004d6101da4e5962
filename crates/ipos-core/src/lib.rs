//! Core library for the IPos integration.
//!
//! Before a node does any work against the IPos commerce API it needs a
//! bearer token the server still accepts. This crate owns that lifecycle:
//!
//! - [`auth::TokenStore`]: the single cached token slot
//! - [`auth::Authenticator`]: exchanges credentials for a fresh token
//! - [`auth::SessionValidator`]: local expiry check plus a remote probe
//! - [`auth::SessionManager`]: `ensure_logged_in`, the entry point nodes call
//!
//! The HTTP plumbing lives in [`api`], configuration in [`config`].

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod node;

pub use api::{ApiError, IPosClient};
pub use auth::{
    Authenticator, Credentials, FileTokenStore, MemoryTokenStore, SessionManager, SessionState,
    SessionValidator, TokenRecord, TokenStore,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{SessionError, StorageError};
pub use node::IPosNode;
