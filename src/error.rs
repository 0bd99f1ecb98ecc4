// src/error.rs
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::types::StatusRes;

pub const MSG_INVALID_COORDS: &str = "INVALID COORDINATES.";
pub const MSG_MALFORMED: &str = "MALFORMED TRANSMISSION.";
pub const MSG_BROADCAST_FAILED: &str = "BROADCAST FAILED.";
pub const MSG_SIGNAL_REJECTED: &str = "ERROR: ENCRYPTED SIGNAL REJECTED.";
pub const MSG_SIGNAL_LOST: &str = "SYSTEM ERROR: SIGNAL LOST.";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("ledger io: {0}")]
    Io(#[from] std::io::Error),
    #[error("ledger encode: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidInput {
    #[error("body must be a JSON object")]
    NotAnObject,
    #[error("body is not valid JSON")]
    Malformed,
    #[error("missing field `{0}`")]
    Missing(&'static str),
    #[error("field `{0}` must be a number")]
    NotNumeric(&'static str),
    #[error("field `{0}` must be a string")]
    NotText(&'static str),
    #[error("field `{0}` out of range")]
    OutOfRange(&'static str),
}

impl InvalidInput {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Missing(k) | Self::NotNumeric(k) | Self::OutOfRange(k)
                if matches!(*k, "lat" | "lng") =>
            {
                MSG_INVALID_COORDS
            }
            _ => MSG_MALFORMED,
        }
    }
}

/// Upstream generation failures. The two kinds stay apart all the way to the client.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Upstream answered, but not with a success status.
    #[error("upstream rejected request with HTTP {status}")]
    Rejected { status: u16 },
    /// Unreachable, timed out, or the payload had no usable text.
    #[error("upstream lost: {0}")]
    Lost(String),
}

impl ScanError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => MSG_SIGNAL_REJECTED,
            Self::Lost(_) => MSG_SIGNAL_LOST,
        }
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            Self::Lost(format!("timed out: {e}"))
        } else {
            Self::Lost(e.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no active session")]
    NoSession,
}

/// Everything a handler can fail with, mapped to a stable client payload.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Input(#[from] InvalidInput),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Input(e) => {
                warn!("rejected input: {e}");
                (StatusCode::BAD_REQUEST, e.user_message())
            }
            Self::Store(e) => {
                error!("ledger write failed: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, MSG_BROADCAST_FAILED)
            }
            Self::Scan(e @ ScanError::Rejected { .. }) => {
                warn!("{e}");
                (StatusCode::BAD_GATEWAY, e.user_message())
            }
            Self::Scan(e @ ScanError::Lost(_)) => {
                error!("{e}");
                (StatusCode::SERVICE_UNAVAILABLE, e.user_message())
            }
            Self::Auth(AuthError::NoSession) => {
                return (StatusCode::SEE_OTHER, [(header::LOCATION, "/login")]).into_response();
            }
        };
        (status, Json(StatusRes::error(message))).into_response()
    }
}
