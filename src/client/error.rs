//! Error taxonomy for the Story API and the one routine that classifies
//! failed exchanges. Every request issued by `ApiClient` goes through
//! [`classify`]; nothing else maps transport or status failures.
use serde::Deserialize;
use std::error::Error as StdError;
use std::io;
use thiserror::Error;

pub const NO_CONNECTIVITY_MESSAGE: &str = "No internet connection. Please check your network.";
pub const TIMEOUT_MESSAGE: &str = "Connection timeout. Please try again.";
pub const AUTH_REQUIRED_MESSAGE: &str = "Authentication token not found. Please login again.";
pub const UNKNOWN_MESSAGE: &str = "An unexpected error occurred";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// DNS failure or unreachable host.
    #[error("{}", NO_CONNECTIVITY_MESSAGE)]
    NoConnectivity,

    /// Connect or read deadline exceeded.
    #[error("{}", TIMEOUT_MESSAGE)]
    Timeout,

    /// The server answered with an error status or an `error: true` payload.
    #[error("{message}")]
    ServerError { code: u16, message: String },

    /// No usable token; detected before any request is made.
    #[error("{}", AUTH_REQUIRED_MESSAGE)]
    AuthRequired,

    /// Client-side input check failed; never reaches the network.
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    #[error("{message}")]
    Unknown { message: String },
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field,
            message: message.into(),
        }
    }

    /// A 2xx response whose payload carries `error: true`.
    pub fn flagged(message: Option<String>, fallback: &str) -> Self {
        ApiError::ServerError {
            code: 200,
            message: message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string()),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::ServerError { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_payload_too_large(&self) -> bool {
        self.status_code() == Some(413)
    }
}

/// What went wrong with an exchange, before classification.
#[derive(Debug)]
pub enum Failure<'a> {
    /// The request never produced a usable response.
    Transport(&'a reqwest::Error),
    /// A response arrived with a non-success status.
    Status { code: u16, body: &'a str },
    /// A success response whose body is not the expected JSON.
    Decode(&'a serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Map a failed exchange onto the error taxonomy.
pub fn classify(failure: Failure<'_>) -> ApiError {
    match failure {
        Failure::Status { code, body } => {
            let parsed = serde_json::from_str::<ErrorBody>(body)
                .ok()
                .and_then(|b| b.message)
                .filter(|m| !m.trim().is_empty());
            ApiError::ServerError {
                code,
                message: parsed.unwrap_or_else(|| default_status_message(code)),
            }
        }
        Failure::Transport(err) => classify_transport(err),
        Failure::Decode(err) => ApiError::Unknown {
            message: format!("Unexpected response from server: {}", err),
        },
    }
}

fn classify_transport(err: &reqwest::Error) -> ApiError {
    // A connect timeout is both `is_connect` and `is_timeout`; timeout wins.
    if err.is_timeout() {
        return ApiError::Timeout;
    }
    if err.is_connect() {
        return ApiError::NoConnectivity;
    }
    if let Some(status) = err.status() {
        return ApiError::ServerError {
            code: status.as_u16(),
            message: default_status_message(status.as_u16()),
        };
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::TimedOut => return ApiError::Timeout,
                io::ErrorKind::ConnectionRefused
                | io::ErrorKind::HostUnreachable
                | io::ErrorKind::NetworkUnreachable
                | io::ErrorKind::NotConnected => return ApiError::NoConnectivity,
                _ => {}
            }
        }
        source = cause.source();
    }

    let message = err.to_string();
    ApiError::Unknown {
        message: if message.trim().is_empty() {
            UNKNOWN_MESSAGE.to_string()
        } else {
            message
        },
    }
}

/// Fallback text when the server gave no usable message.
pub fn default_status_message(code: u16) -> String {
    match code {
        400 => "Bad request. Please check your input.".to_string(),
        401 => "Unauthorized. Please login again.".to_string(),
        403 => "Access forbidden.".to_string(),
        404 => "Service not found.".to_string(),
        408 => "Request timeout. Please try again.".to_string(),
        413 => "Image is too large. Please choose a smaller photo.".to_string(),
        422 => "Invalid data provided.".to_string(),
        500 => "Server error. Please try again later.".to_string(),
        502 | 503 => "Service temporarily unavailable.".to_string(),
        _ => format!("HTTP {} error occurred.", code),
    }
}
