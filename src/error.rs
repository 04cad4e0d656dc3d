//! Error types and user-facing failure classification
//!
//! Collaborator failures arrive as [`ApiError`]. The orchestrator folds them
//! into a small [`FailureKind`] taxonomy, and each kind carries exactly one
//! message that the UI shows verbatim.

use thiserror::Error;

use crate::location::LocationError;

/// Errors raised by the weather, geocoding, and icon collaborators
#[derive(Debug, Error)]
pub enum ApiError {
    /// Server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Geocoding returned no match for the requested city
    #[error("City not found")]
    CityNotFound,

    /// The request did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// The host could not be reached
    #[error("Unable to resolve host: {0}")]
    Unreachable(String),

    /// HTTP request failed for another reason
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Missing expected field in response
    #[error("Missing expected field in response: {0}")]
    MissingField(String),

    /// Response body was empty or not a usable asset
    #[error("Empty response body")]
    EmptyBody,
}

impl ApiError {
    /// Builds an error from a transport failure, separating timeouts and
    /// connection failures from the rest.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_connect() {
            let host = err
                .url()
                .and_then(|url| url.host_str())
                .unwrap_or("server")
                .to_string();
            ApiError::Unreachable(host)
        } else {
            ApiError::Request(err)
        }
    }
}

/// User-facing failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    PermissionDenied,
    TargetNotFound,
    Unauthorized,
    RateLimited,
    ServerError,
    NetworkUnavailable,
    Cancelled,
    Unknown,
}

impl FailureKind {
    /// Classifies a collaborator error.
    pub fn classify(err: &ApiError) -> Self {
        match err {
            ApiError::CityNotFound => FailureKind::TargetNotFound,
            ApiError::Http { status, .. } => match status {
                401 => FailureKind::Unauthorized,
                404 => FailureKind::TargetNotFound,
                429 => FailureKind::RateLimited,
                500..=599 => FailureKind::ServerError,
                _ => FailureKind::Unknown,
            },
            ApiError::Timeout | ApiError::Unreachable(_) => FailureKind::NetworkUnavailable,
            ApiError::Request(e) if e.is_timeout() || e.is_connect() => {
                FailureKind::NetworkUnavailable
            }
            _ => FailureKind::Unknown,
        }
    }

    /// The single message shown to the user for this kind.
    pub fn message(&self) -> &'static str {
        match self {
            FailureKind::PermissionDenied => {
                "Location permission is required to use your current location."
            }
            FailureKind::TargetNotFound => {
                "City not found. Please check the spelling and try again."
            }
            FailureKind::Unauthorized => "API key error. Please check your configuration.",
            FailureKind::RateLimited => "Too many requests. Please wait a moment and try again.",
            FailureKind::ServerError => "Server error. Please try again later.",
            FailureKind::NetworkUnavailable => {
                "Network error. Please check your internet connection."
            }
            FailureKind::Cancelled => "Request cancelled.",
            FailureKind::Unknown => "An unexpected error occurred.",
        }
    }
}

impl From<&LocationError> for FailureKind {
    fn from(err: &LocationError) -> Self {
        match err {
            LocationError::PermissionDenied => FailureKind::PermissionDenied,
            LocationError::Cancelled => FailureKind::Cancelled,
            LocationError::Unavailable => FailureKind::Unknown,
        }
    }
}

/// Message for a failed location acquisition.
pub fn location_failure_message(err: &LocationError) -> String {
    match FailureKind::from(err) {
        FailureKind::PermissionDenied => FailureKind::PermissionDenied.message().to_string(),
        _ => format!("Unable to get location: {}", err),
    }
}
