use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue};

use crate::api::ApiError;

/// Header carrying the session id on authenticated Pi-hole calls
pub const SID_HEADER: &str = "X-FTL-SID";

/// Header carrying the anti-forgery token on authenticated Pi-hole calls
pub const CSRF_HEADER: &str = "X-FTL-CSRF";

/// An authenticated Pi-hole session.
///
/// Only constructible fully-formed: both credentials non-empty and a
/// positive validity. Absence of a session is modeled as `Option<Session>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    sid: String,
    csrf: String,
    validity: u64,
    issued_at: DateTime<Utc>,
}

impl Session {
    pub fn new(sid: impl Into<String>, csrf: impl Into<String>, validity: u64) -> Result<Self, ApiError> {
        let sid = sid.into();
        let csrf = csrf.into();
        if sid.is_empty() || csrf.is_empty() {
            return Err(ApiError::InvalidResponse("session is missing sid or csrf".to_string()));
        }
        if validity == 0 {
            return Err(ApiError::InvalidResponse("session validity must be positive".to_string()));
        }
        Ok(Self {
            sid,
            csrf,
            validity,
            issued_at: Utc::now(),
        })
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn csrf(&self) -> &str {
        &self.csrf
    }

    /// Seconds from issuance until the backend invalidates the session
    pub fn validity(&self) -> u64 {
        self.validity
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + Duration::seconds(self.validity as i64)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at()
    }

    /// Seconds remaining until expiry (for display)
    pub fn seconds_until_expiry(&self) -> i64 {
        (self.expires_at() - Utc::now()).num_seconds().max(0)
    }

    /// Credential headers for an authenticated call
    pub fn auth_headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        let sid = HeaderValue::from_str(&self.sid)
            .map_err(|_| ApiError::InvalidResponse("sid is not a valid header value".to_string()))?;
        let csrf = HeaderValue::from_str(&self.csrf)
            .map_err(|_| ApiError::InvalidResponse("csrf is not a valid header value".to_string()))?;
        headers.insert(SID_HEADER, sid);
        headers.insert(CSRF_HEADER, csrf);
        Ok(headers)
    }
}
