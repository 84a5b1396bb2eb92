//! HTTP client module for the Pi-hole v6 REST API.
//!
//! This module provides the `PiholeClient` for opening and closing
//! sessions against a Pi-hole instance and for the authenticated calls
//! the proxy forwards (clients, groups, client edits).
//!
//! The API authenticates with a session id (`X-FTL-SID`) and an
//! anti-forgery token (`X-FTL-CSRF`) obtained from `/api/auth/`.

pub mod client;
pub mod error;

pub use client::PiholeClient;
pub use error::ApiError;
