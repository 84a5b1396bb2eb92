//! API client for communicating with the Pi-hole REST API.
//!
//! `PiholeClient` is stateless per call: it holds the shared password and
//! a pooled `reqwest::Client`, and every call takes the endpoint (and the
//! session, for authenticated calls) explicitly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::auth::{AuthBackend, Endpoint, Session};
use crate::models::{ClientEntry, ClientUpdate, Group};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Session login/logout path
const AUTH_PATH: &str = "/api/auth/";

/// Client (device) listing and editing path
const CLIENTS_PATH: &str = "/api/clients/";

/// Group listing path
const GROUPS_PATH: &str = "/api/groups/";

/// Default HTTP request timeout in seconds.
/// Bounds every open/close/forward call so one dead Pi-hole cannot hold up the others.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    session: Option<AuthSession>,
}

#[derive(Debug, Deserialize)]
struct AuthSession {
    #[serde(default)]
    sid: Option<String>,
    #[serde(default)]
    csrf: Option<String>,
    #[serde(default)]
    validity: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ClientsResponse {
    #[serde(default)]
    clients: Vec<ClientEntry>,
}

#[derive(Debug, Deserialize)]
struct GroupsResponse {
    #[serde(default)]
    groups: Vec<Group>,
}

/// API client for Pi-hole instances.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct PiholeClient {
    client: Client,
    password: Option<Arc<str>>,
    timeout_secs: u64,
}

impl PiholeClient {
    /// Create a new client. An empty password counts as no password.
    pub fn new(password: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            password: password.filter(|p| !p.is_empty()).map(Arc::from),
            timeout_secs: timeout.as_secs(),
        })
    }

    #[cfg(test)]
    fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// Log in to an endpoint and return the new session
    pub async fn open_session(&self, endpoint: &Endpoint) -> Result<Session, ApiError> {
        let password = self.password.as_deref().ok_or(ApiError::MissingPassword)?;
        let url = endpoint.url(AUTH_PATH);

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { password })
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.send_error(e))?;
        Self::parse_auth_body(status, &body)
    }

    /// Log out of an endpoint. Only `204 No Content` counts as success.
    pub async fn close_session(&self, endpoint: &Endpoint, session: &Session) -> Result<(), ApiError> {
        let url = endpoint.url(AUTH_PATH);

        let response = self
            .client
            .delete(&url)
            .headers(session.auth_headers()?)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        if response.status() == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Fetch the client list of an endpoint
    pub async fn fetch_clients(&self, endpoint: &Endpoint, session: &Session) -> Result<Vec<ClientEntry>, ApiError> {
        let response: ClientsResponse = self.get(&endpoint.url(CLIENTS_PATH), session).await?;
        Ok(response.clients)
    }

    /// Fetch the group list of an endpoint
    pub async fn fetch_groups(&self, endpoint: &Endpoint, session: &Session) -> Result<Vec<Group>, ApiError> {
        let response: GroupsResponse = self.get(&endpoint.url(GROUPS_PATH), session).await?;
        Ok(response.groups)
    }

    /// Replace a client's comment and groups. Returns the backend status as-is.
    pub async fn update_client(
        &self,
        endpoint: &Endpoint,
        session: &Session,
        client: &str,
        update: &ClientUpdate,
    ) -> Result<StatusCode, ApiError> {
        let url = Self::client_url(endpoint, client)?;

        let response = self
            .client
            .put(url.clone())
            .headers(session.auth_headers()?)
            .json(update)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        debug!(url = %url, status = %response.status(), "Client update sent");
        Ok(response.status())
    }

    /// URL of one client entry. The id is a single path segment, so subnets
    /// (`10.0.0.0/24`) and ids with `?` or `#` are percent-encoded.
    fn client_url(endpoint: &Endpoint, client: &str) -> Result<Url, ApiError> {
        let base = endpoint.url(CLIENTS_PATH);
        let mut url = Url::parse(&base).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(base.clone()))?
            .pop_if_empty()
            .push(client);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, session: &Session) -> Result<T, ApiError> {
        let response = self
            .client
            .get(url)
            .headers(session.auth_headers()?)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }

        let text = response.text().await.map_err(|e| self.send_error(e))?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", url, e)))
    }

    fn send_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.timeout_secs)
        } else {
            ApiError::Network(err)
        }
    }

    /// Turn a login response into a session. Anything but a 200 carrying a
    /// complete session object is a rejection.
    fn parse_auth_body(status: StatusCode, body: &str) -> Result<Session, ApiError> {
        if status != StatusCode::OK {
            return Err(ApiError::auth_rejected(status, body));
        }

        let parsed: AuthResponse = serde_json::from_str(body)
            .map_err(|e| ApiError::auth_rejected(status, &format!("malformed auth body: {}", e)))?;

        let session = parsed
            .session
            .ok_or_else(|| ApiError::auth_rejected(status, "response has no session object"))?;

        match (session.sid, session.csrf, session.validity) {
            (Some(sid), Some(csrf), Some(validity)) if validity > 0 => Session::new(sid, csrf, validity as u64)
                .map_err(|e| ApiError::auth_rejected(status, &e.to_string())),
            _ => Err(ApiError::auth_rejected(status, "session object is incomplete")),
        }
    }
}

#[async_trait]
impl AuthBackend for PiholeClient {
    async fn open(&self, endpoint: &Endpoint) -> Result<Session, ApiError> {
        self.open_session(endpoint).await
    }

    async fn close(&self, endpoint: &Endpoint, session: &Session) -> Result<(), ApiError> {
        self.close_session(endpoint, session).await
    }
}
