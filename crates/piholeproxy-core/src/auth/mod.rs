//! Authentication module for keeping Pi-hole sessions alive.
//!
//! This module provides:
//! - `Endpoint`: normalized base URL of one Pi-hole instance
//! - `Session`: session id + anti-forgery token with a validity window
//! - `SessionManager`: opens one session per endpoint, renews them all in
//!   the background before the earliest expiry, and closes them on shutdown
//!
//! Sessions live only in memory; nothing survives a restart.

pub mod endpoint;
pub mod manager;
pub mod session;

use async_trait::async_trait;

use crate::api::ApiError;

pub use endpoint::Endpoint;
pub use manager::{EndpointStatus, SessionManager};
pub use session::Session;

/// The two session primitives the manager needs from a backend.
#[async_trait]
pub trait AuthBackend: Send + Sync + 'static {
    /// Log in and return a fully-formed session.
    async fn open(&self, endpoint: &Endpoint) -> Result<Session, ApiError>;

    /// Log out. Failures are reported but callers treat them as best-effort.
    async fn close(&self, endpoint: &Endpoint, session: &Session) -> Result<(), ApiError>;
}
