//! Request forwarding on top of the session manager.
//!
//! `AdminProxy` picks the target endpoint, borrows its current session and
//! issues the Pi-hole call. It never retries; failures go back to the
//! caller as `ProxyError`.

use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::api::{ApiError, PiholeClient};
use crate::auth::{Endpoint, Session, SessionManager};
use crate::models::{ClientEntry, ClientUpdate, EditClientRequest, EditOutcome, EditResults, Group, GroupIds};

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("No Pi-hole endpoints configured")]
    NoEndpointsConfigured,

    #[error("Pi-hole session not active for {0}")]
    NoSessionAvailable(Endpoint),

    #[error("Pi-hole {endpoint} returned status {status}")]
    Upstream { endpoint: Endpoint, status: u16 },

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ProxyError {
    fn from_api(endpoint: &Endpoint, err: ApiError) -> Self {
        match err {
            ApiError::UnexpectedStatus { status, .. } => ProxyError::Upstream {
                endpoint: endpoint.clone(),
                status,
            },
            other => ProxyError::Api(other),
        }
    }
}

pub struct AdminProxy<B = PiholeClient> {
    sessions: Arc<SessionManager<B>>,
    api: PiholeClient,
    group_ids: GroupIds,
}

impl<B> AdminProxy<B> {
    pub fn new(sessions: Arc<SessionManager<B>>, api: PiholeClient, group_ids: GroupIds) -> Self {
        Self {
            sessions,
            api,
            group_ids,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager<B>> {
        &self.sessions
    }

    pub fn group_ids(&self) -> GroupIds {
        self.group_ids
    }

    /// The endpoint named by `selection` if it is configured, else the first one.
    pub fn resolve_endpoint(&self, selection: Option<&str>) -> Result<&Endpoint, ProxyError> {
        let endpoints = self.sessions.list_endpoints();
        let first = endpoints.first().ok_or(ProxyError::NoEndpointsConfigured)?;
        Ok(selection
            .and_then(|sel| self.sessions.find_endpoint(sel))
            .unwrap_or(first))
    }

    async fn session_for(&self, selection: Option<&str>) -> Result<(Endpoint, Arc<Session>), ProxyError> {
        let endpoint = self.resolve_endpoint(selection)?;
        let session = self
            .sessions
            .current_session(endpoint)
            .await
            .ok_or_else(|| ProxyError::NoSessionAvailable(endpoint.clone()))?;
        if session.is_expired() {
            // Renewal failed since it was issued; the backend decides
            warn!(endpoint = %endpoint, expired_at = %session.expires_at(), "Using session past its validity");
        }
        Ok((endpoint.clone(), session))
    }

    /// Client list of the selected endpoint
    pub async fn clients(&self, selection: Option<&str>) -> Result<Vec<ClientEntry>, ProxyError> {
        let (endpoint, session) = self.session_for(selection).await?;
        self.api
            .fetch_clients(&endpoint, &session)
            .await
            .map_err(|e| {
                error!(endpoint = %endpoint, error = %e, "Fetching clients failed");
                ProxyError::from_api(&endpoint, e)
            })
    }

    /// Group list of the selected endpoint
    pub async fn groups(&self, selection: Option<&str>) -> Result<Vec<Group>, ProxyError> {
        let (endpoint, session) = self.session_for(selection).await?;
        self.api
            .fetch_groups(&endpoint, &session)
            .await
            .map_err(|e| {
                error!(endpoint = %endpoint, error = %e, "Fetching groups failed");
                ProxyError::from_api(&endpoint, e)
            })
    }

    /// Apply the same client edit on every endpoint. One endpoint failing
    /// never fails the others; each gets its own outcome.
    pub async fn edit_client(&self, request: &EditClientRequest) -> EditResults {
        let update = ClientUpdate::from(request);
        let endpoints = self.sessions.list_endpoints();

        let outcomes = join_all(endpoints.iter().map(|ep| self.edit_one(ep, &request.client, &update))).await;

        let results: EditResults = endpoints.iter().cloned().zip(outcomes).collect();
        info!(client = %request.client, endpoints = results.len(), "Client edit fanned out");
        results
    }

    async fn edit_one(&self, endpoint: &Endpoint, client: &str, update: &ClientUpdate) -> EditOutcome {
        let Some(session) = self.sessions.current_session(endpoint).await else {
            warn!(endpoint = %endpoint, "Skipping client edit, no active session");
            return EditOutcome::Unavailable;
        };

        match self.api.update_client(endpoint, &session, client, update).await {
            Ok(status) => EditOutcome::Status(status.as_u16()),
            Err(e) => {
                error!(endpoint = %endpoint, error = %e, "Client edit failed");
                EditOutcome::Failed(e.to_string())
            }
        }
    }
}
