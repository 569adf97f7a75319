use std::fmt;

use reqwest::StatusCode;
use serde_json::{Map, Value};

/// Message surfaced when the transport itself fails.
pub const CONNECTIVITY_MESSAGE: &str = "Network error: please check your connection.";

/// Categories of API errors for consistent error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// The transport could not complete the exchange (DNS, connect, TLS, offline)
    Connectivity,
    /// The server answered 401 and no refreshed credential could fix it
    AuthExpired,
    /// Any other non-2xx status
    Request,
    /// The request body could not be serialized
    Encode,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::Connectivity => write!(f, "connectivity"),
            ApiErrorKind::AuthExpired => write!(f, "auth_expired"),
            ApiErrorKind::Request => write!(f, "request"),
            ApiErrorKind::Encode => write!(f, "encode"),
        }
    }
}

/// One entry of the `errors[]` array in an error body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Option<String>,
    pub message: Option<String>,
}

/// Structured error returned by the request executor.
///
/// `data` always holds the parsed error body (an empty object when the body
/// was missing or not JSON), so callers can map field-level errors.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// HTTP status, absent for transport and encoding failures
    pub status: Option<u16>,
    /// Raw parsed error body
    pub data: Value,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            data: Value::Object(Map::new()),
        }
    }

    pub fn connectivity() -> Self {
        Self::new(ApiErrorKind::Connectivity, CONNECTIVITY_MESSAGE)
    }

    pub fn encode(err: &serde_json::Error) -> Self {
        Self::new(
            ApiErrorKind::Encode,
            format!("Failed to encode request body: {err}"),
        )
    }

    /// Builds an error from a non-success response.
    ///
    /// Malformed or empty bodies degrade to `{}`; the message prefers the
    /// server's `message`, then `error`, then a generic status line.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let data = parse_body_lenient(body);
        let code = status.as_u16();

        let message = non_empty_str(&data, "message")
            .or_else(|| non_empty_str(&data, "error"))
            .map_or_else(|| format!("Request failed ({code})"), str::to_string);

        let kind = if status == StatusCode::UNAUTHORIZED {
            ApiErrorKind::AuthExpired
        } else {
            ApiErrorKind::Request
        };

        Self {
            kind,
            message,
            status: Some(code),
            data,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ApiErrorKind::AuthExpired
    }

    pub fn is_connectivity(&self) -> bool {
        self.kind == ApiErrorKind::Connectivity
    }

    /// Field-level validation errors from `data.errors[]`.
    ///
    /// Accepts both `message` and the legacy `msg` key.
    pub fn field_errors(&self) -> Vec<FieldError> {
        let Some(entries) = self.data.get("errors").and_then(Value::as_array) else {
            return Vec::new();
        };

        entries
            .iter()
            .map(|entry| FieldError {
                field: non_empty_str(entry, "field").map(str::to_string),
                message: non_empty_str(entry, "message")
                    .or_else(|| non_empty_str(entry, "msg"))
                    .map(str::to_string),
            })
            .collect()
    }

    /// Notification text: field messages joined with " • ", or the primary message.
    pub fn summary(&self) -> String {
        let messages: Vec<String> = self
            .field_errors()
            .into_iter()
            .filter_map(|e| e.message)
            .collect();

        if messages.is_empty() {
            self.message.clone()
        } else {
            messages.join(" • ")
        }
    }
}

/// Parses a response body as JSON, substituting `{}` for anything unparsable.
pub(crate) fn parse_body_lenient(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|_| Value::Object(Map::new()))
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
