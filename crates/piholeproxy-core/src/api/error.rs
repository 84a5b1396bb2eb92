use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No Pi-hole password configured")]
    MissingPassword,

    #[error("Authentication rejected (status {status}): {reason}")]
    AuthRejected { status: u16, reason: String },

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut cut = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
    }

    /// Classify a failed login response.
    pub fn auth_rejected(status: reqwest::StatusCode, body: &str) -> Self {
        ApiError::AuthRejected {
            status: status.as_u16(),
            reason: Self::truncate_body(body),
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        ApiError::UnexpectedStatus {
            status: status.as_u16(),
            body: Self::truncate_body(body),
        }
    }

    /// True for failures that never reached the backend's HTTP layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Timeout(_))
    }
}
