//! Test doubles: an in-memory `AuthBackend` and an axum mock of the
//! Pi-hole API bound to a local port.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::api::ApiError;
use crate::auth::session::{CSRF_HEADER, SID_HEADER};
use crate::auth::{AuthBackend, Endpoint, Session};

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Default)]
pub struct FakeBackend {
    default_validity: u64,
    validity: Mutex<HashMap<Endpoint, u64>>,
    failing: Mutex<HashSet<Endpoint>>,
    hanging: Mutex<HashSet<Endpoint>>,
    delays: Mutex<HashMap<Endpoint, Duration>>,
    next_id: AtomicUsize,
    opens: Mutex<HashMap<Endpoint, usize>>,
    closed: Mutex<HashMap<Endpoint, Vec<String>>>,
}

impl FakeBackend {
    pub fn new(validity: u64) -> Self {
        Self {
            default_validity: validity,
            ..Self::default()
        }
    }

    pub fn set_validity(&self, endpoint: &Endpoint, validity: u64) {
        self.validity.lock().unwrap().insert(endpoint.clone(), validity);
    }

    /// Reject every following login on `endpoint`
    pub fn fail(&self, endpoint: &Endpoint) {
        self.failing.lock().unwrap().insert(endpoint.clone());
    }

    pub fn recover(&self, endpoint: &Endpoint) {
        self.failing.lock().unwrap().remove(endpoint);
        self.hanging.lock().unwrap().remove(endpoint);
    }

    /// Never answer following logins on `endpoint`
    pub fn hang(&self, endpoint: &Endpoint) {
        self.hanging.lock().unwrap().insert(endpoint.clone());
    }

    /// Answer following logins on `endpoint` only after `delay`
    pub fn set_delay(&self, endpoint: &Endpoint, delay: Duration) {
        self.delays.lock().unwrap().insert(endpoint.clone(), delay);
    }

    pub fn open_count(&self, endpoint: &Endpoint) -> usize {
        self.opens.lock().unwrap().get(endpoint).copied().unwrap_or(0)
    }

    pub fn closed_sids(&self, endpoint: &Endpoint) -> Vec<String> {
        self.closed.lock().unwrap().get(endpoint).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl AuthBackend for FakeBackend {
    async fn open(&self, endpoint: &Endpoint) -> Result<Session, ApiError> {
        *self.opens.lock().unwrap().entry(endpoint.clone()).or_default() += 1;

        let hanging = self.hanging.lock().unwrap().contains(endpoint);
        if hanging {
            std::future::pending::<()>().await;
        }
        let delay = self.delays.lock().unwrap().get(endpoint).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self.failing.lock().unwrap().contains(endpoint);
        if failing {
            return Err(ApiError::AuthRejected {
                status: 401,
                reason: "password incorrect".to_string(),
            });
        }

        let validity = self
            .validity
            .lock()
            .unwrap()
            .get(endpoint)
            .copied()
            .unwrap_or(self.default_validity);
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Session::new(format!("sid-{n}"), format!("csrf-{n}"), validity)
    }

    async fn close(&self, endpoint: &Endpoint, session: &Session) -> Result<(), ApiError> {
        self.closed
            .lock()
            .unwrap()
            .entry(endpoint.clone())
            .or_default()
            .push(session.sid().to_string());
        Ok(())
    }
}

// ============================================================================
// Mock Pi-hole HTTP server
// ============================================================================

#[derive(Default)]
struct MockState {
    password: String,
    validity: u64,
    next_id: AtomicUsize,
    /// sid -> csrf
    active: Mutex<HashMap<String, String>>,
    closed: Mutex<Vec<String>>,
    updates: Mutex<Vec<(String, Value)>>,
}

impl MockState {
    fn authorized(&self, headers: &HeaderMap) -> Option<String> {
        let sid = headers.get(SID_HEADER)?.to_str().ok()?;
        let csrf = headers.get(CSRF_HEADER)?.to_str().ok()?;
        let active = self.active.lock().unwrap();
        (active.get(sid).map(String::as_str) == Some(csrf)).then(|| sid.to_string())
    }
}

pub struct MockPihole {
    pub endpoint: Endpoint,
    state: Arc<MockState>,
    server: tokio::task::JoinHandle<()>,
}

impl MockPihole {
    pub async fn start(password: &str, validity: u64) -> Self {
        let state = Arc::new(MockState {
            password: password.to_string(),
            validity,
            ..MockState::default()
        });

        let app = Router::new()
            .route("/api/auth/", post(login).delete(logout))
            .route("/api/clients/", get(clients))
            .route("/api/clients/:client", put(edit_client))
            .route("/api/groups/", get(groups))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            endpoint: Endpoint::parse(&format!("http://{addr}")).unwrap(),
            state,
            server,
        }
    }

    /// An endpoint nothing listens on
    pub async fn unused_endpoint() -> Endpoint {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        Endpoint::parse(&format!("http://{addr}")).unwrap()
    }

    pub fn active_sessions(&self) -> usize {
        self.state.active.lock().unwrap().len()
    }

    pub fn closed_sids(&self) -> Vec<String> {
        self.state.closed.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(String, Value)> {
        self.state.updates.lock().unwrap().clone()
    }
}

impl Drop for MockPihole {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"key": "unauthorized", "message": "Unauthorized"}})),
    )
        .into_response()
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    if body.get("password").and_then(Value::as_str) != Some(state.password.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"session": {
                "valid": false, "totp": false, "sid": null, "csrf": null,
                "validity": -1, "message": "password incorrect"
            }})),
        )
            .into_response();
    }

    let n = state.next_id.fetch_add(1, Ordering::SeqCst);
    let (sid, csrf) = (format!("mock-sid-{n}"), format!("mock-csrf-{n}"));
    state.active.lock().unwrap().insert(sid.clone(), csrf.clone());
    Json(json!({
        "session": {
            "valid": true, "totp": false, "sid": sid, "csrf": csrf,
            "validity": state.validity, "message": "password correct"
        },
        "took": 0.002
    }))
    .into_response()
}

async fn logout(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    match state.authorized(&headers) {
        Some(sid) => {
            state.active.lock().unwrap().remove(&sid);
            state.closed.lock().unwrap().push(sid);
            StatusCode::NO_CONTENT.into_response()
        }
        None => unauthorized(),
    }
}

async fn clients(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if state.authorized(&headers).is_none() {
        return unauthorized();
    }
    Json(json!({"clients": [
        {"id": 1, "name": "laptop", "comment": null, "client": "10.0.0.5", "groups": [0]},
        {"id": 2, "name": null, "comment": "tv", "client": "10.0.0.6", "groups": [0, 1]}
    ]}))
    .into_response()
}

async fn groups(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if state.authorized(&headers).is_none() {
        return unauthorized();
    }
    Json(json!({"groups": [
        {"id": 0, "name": "Default", "comment": "The default group", "enabled": true},
        {"id": 1, "name": "NoAds", "comment": null, "enabled": true}
    ]}))
    .into_response()
}

async fn edit_client(
    State(state): State<Arc<MockState>>,
    Path(client): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if state.authorized(&headers).is_none() {
        return unauthorized();
    }
    state.updates.lock().unwrap().push((client, body));
    Json(json!({"clients": [], "processed": {"success": [], "errors": []}})).into_response()
}
