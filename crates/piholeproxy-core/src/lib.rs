//! piholeproxy-core - session broker for one or more Pi-hole instances.
//!
//! Keeps an authenticated session open on every configured Pi-hole,
//! renews them in the background before they expire, and lets request
//! handlers borrow the current session without touching login logic.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod proxy;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiError, PiholeClient};
pub use auth::{AuthBackend, Endpoint, EndpointStatus, Session, SessionManager};
pub use config::Config;
pub use proxy::{AdminProxy, ProxyError};
