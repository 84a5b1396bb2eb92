//! Session lifecycle for a fixed set of Pi-hole endpoints.
//!
//! One background task renews every endpoint on a single timer driven by
//! the tightest validity; request handlers read the current session per
//! endpoint concurrently. The state lock is only held to swap a slot, never
//! across a network call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::PiholeClient;

use super::{AuthBackend, Endpoint, Session};

// ============================================================================
// Constants
// ============================================================================

/// How long to wait before retrying when no endpoint has a session.
pub const IDLE_RECHECK: Duration = Duration::from_secs(5);

/// Default cap on a single open or close call made by the manager.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay until the next renewal pass: one second before the earliest
/// known validity runs out, never less than one second. `None` when no
/// endpoint currently has a session.
pub fn renewal_delay(validities: impl IntoIterator<Item = u64>) -> Option<Duration> {
    validities
        .into_iter()
        .min()
        .map(|min| Duration::from_secs(min.saturating_sub(1).max(1)))
}

#[derive(Debug, Default)]
struct SessionSlot {
    session: Option<Arc<Session>>,
    /// Validity of the last installed session
    validity: Option<u64>,
    /// Bumped on every install
    generation: u64,
    closed: bool,
}

impl SessionSlot {
    fn install(&mut self, session: Session) {
        self.validity = Some(session.validity());
        self.session = Some(Arc::new(session));
        self.generation += 1;
    }
}

/// Point-in-time view of one endpoint, for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointStatus {
    pub endpoint: Endpoint,
    pub authenticated: bool,
    pub generation: u64,
    pub validity: Option<u64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub expires_in_secs: Option<i64>,
}

pub struct SessionManager<B = PiholeClient> {
    backend: B,
    endpoints: Vec<Endpoint>,
    slots: RwLock<HashMap<Endpoint, SessionSlot>>,
    call_timeout: Duration,
}

impl<B: AuthBackend> SessionManager<B> {
    /// Open a session on every endpoint and return the manager.
    /// Endpoints that fail stay unauthenticated until a later renewal.
    pub async fn connect(backend: B, endpoints: Vec<Endpoint>) -> Arc<Self> {
        Self::connect_with_timeout(backend, endpoints, DEFAULT_CALL_TIMEOUT).await
    }

    pub async fn connect_with_timeout(backend: B, endpoints: Vec<Endpoint>, call_timeout: Duration) -> Arc<Self> {
        let slots = endpoints
            .iter()
            .map(|ep| (ep.clone(), SessionSlot::default()))
            .collect();

        let manager = Arc::new(Self {
            backend,
            endpoints,
            slots: RwLock::new(slots),
            call_timeout,
        });

        let opened = join_all(manager.endpoints.iter().map(|ep| manager.open(ep))).await;
        let mut authenticated = 0;
        {
            let mut slots = manager.slots.write().await;
            for (ep, session) in manager.endpoints.iter().zip(opened) {
                if let (Some(session), Some(slot)) = (session, slots.get_mut(ep)) {
                    slot.install(session);
                    authenticated += 1;
                }
            }
        }

        info!(
            endpoints = manager.endpoints.len(),
            authenticated,
            "Pi-hole sessions started"
        );
        manager
    }

    /// Spawn the renewal task. It runs until `cancel` fires.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.run(cancel).await })
    }

    async fn run(&self, cancel: CancellationToken) {
        info!("Session renewal task started");
        loop {
            let wait = match self.next_renewal_delay().await {
                Some(delay) => {
                    debug!(secs = delay.as_secs(), "Next session renewal scheduled");
                    delay
                }
                None => {
                    debug!(secs = IDLE_RECHECK.as_secs(), "No active sessions, retrying soon");
                    IDLE_RECHECK
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            // Every call inside a pass is bounded, so let it finish rather than
            // dropping a freshly opened session on the floor.
            self.renew_all().await;

            if cancel.is_cancelled() {
                break;
            }
        }
        info!("Session renewal task stopped");
    }

    async fn next_renewal_delay(&self) -> Option<Duration> {
        let slots = self.slots.read().await;
        renewal_delay(
            slots
                .values()
                .filter(|slot| slot.session.is_some())
                .filter_map(|slot| slot.validity),
        )
    }

    /// Close and reopen the session of every endpoint, concurrently.
    pub async fn renew_all(&self) {
        join_all(self.endpoints.iter().map(|ep| self.renew(ep))).await;
    }

    async fn renew(&self, endpoint: &Endpoint) {
        let current = {
            let slots = self.slots.read().await;
            match slots.get(endpoint) {
                Some(slot) if !slot.closed => slot.session.clone(),
                _ => return,
            }
        };

        if let Some(old) = current {
            self.close(endpoint, &old).await;
        }

        let Some(session) = self.open(endpoint).await else {
            warn!(endpoint = %endpoint, "Failed to refresh session, leaving old session data active");
            return;
        };

        // Shutdown may have run while we were opening
        let orphan = {
            let mut slots = self.slots.write().await;
            match slots.get_mut(endpoint) {
                Some(slot) if !slot.closed => {
                    slot.install(session);
                    info!(endpoint = %endpoint, generation = slot.generation, "Refreshed session");
                    None
                }
                _ => Some(session),
            }
        };
        if let Some(session) = orphan {
            self.close(endpoint, &session).await;
        }
    }

    async fn open(&self, endpoint: &Endpoint) -> Option<Session> {
        match timeout(self.call_timeout, self.backend.open(endpoint)).await {
            Ok(Ok(session)) => {
                debug!(endpoint = %endpoint, validity = session.validity(), "Session opened");
                Some(session)
            }
            Ok(Err(e)) => {
                error!(endpoint = %endpoint, error = %e, transport = e.is_transport(), "Could not start session");
                None
            }
            Err(_) => {
                error!(
                    endpoint = %endpoint,
                    timeout_secs = self.call_timeout.as_secs(),
                    "Timed out starting session"
                );
                None
            }
        }
    }

    async fn close(&self, endpoint: &Endpoint, session: &Session) {
        match timeout(self.call_timeout, self.backend.close(endpoint, session)).await {
            Ok(Ok(())) => debug!(endpoint = %endpoint, "Session ended"),
            Ok(Err(e)) => warn!(endpoint = %endpoint, error = %e, "Failed to gracefully end session"),
            Err(_) => warn!(
                endpoint = %endpoint,
                timeout_secs = self.call_timeout.as_secs(),
                "Timed out ending session"
            ),
        }
    }

    /// Close every open session, best-effort. Afterwards no session is
    /// handed out and renewal passes do nothing.
    pub async fn shutdown(&self) {
        info!("Ending active Pi-hole sessions");
        let open: Vec<(Endpoint, Arc<Session>)> = {
            let mut slots = self.slots.write().await;
            slots
                .iter_mut()
                .filter_map(|(ep, slot)| {
                    slot.closed = true;
                    slot.validity = None;
                    slot.session.take().map(|session| (ep.clone(), session))
                })
                .collect()
        };

        join_all(open.iter().map(|(ep, session)| self.close(ep, session))).await;
        info!(closed = open.len(), "Pi-hole sessions ended");
    }
}

impl<B> SessionManager<B> {
    /// Configured endpoints, in configuration order.
    pub fn list_endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Look up a configured endpoint by any spelling of its URL.
    pub fn find_endpoint(&self, raw: &str) -> Option<&Endpoint> {
        let wanted = Endpoint::parse(raw)?;
        self.endpoints.iter().find(|ep| **ep == wanted)
    }

    /// The session currently installed for `endpoint`, if any.
    pub async fn current_session(&self, endpoint: &Endpoint) -> Option<Arc<Session>> {
        self.slots
            .read()
            .await
            .get(endpoint)
            .and_then(|slot| slot.session.clone())
    }

    pub async fn status(&self) -> Vec<EndpointStatus> {
        let slots = self.slots.read().await;
        self.endpoints
            .iter()
            .map(|ep| {
                let slot = slots.get(ep);
                let session = slot.and_then(|s| s.session.as_ref());
                EndpointStatus {
                    endpoint: ep.clone(),
                    authenticated: session.is_some(),
                    generation: slot.map(|s| s.generation).unwrap_or(0),
                    validity: slot.and_then(|s| s.validity),
                    expires_at: session.map(|s| s.expires_at()),
                    expires_in_secs: session.map(|s| s.seconds_until_expiry()),
                }
            })
            .collect()
    }

    /// Cap on each open or close call made by this manager
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }
}

// ============================================================================
// Tests
// ============================================================================
