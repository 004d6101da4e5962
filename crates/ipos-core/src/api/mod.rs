//! REST client for the IPos commerce API.
//!
//! Only the two calls the session lifecycle needs are implemented: the
//! credential login (`POST /auth`) and the "who am I" lookup
//! (`GET /s/customers/user`) used as the session probe.

pub mod client;
pub mod error;

pub use client::{IPosClient, LoginResponse};
pub use error::ApiError;
