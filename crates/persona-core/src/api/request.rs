use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;

use super::errors::ApiError;

/// Request body as handed to the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Structured value, serialized to JSON before sending
    Json(Value),
    /// Pre-encoded payload, sent unchanged
    Text(String),
}

impl RequestBody {
    /// Builds a JSON body from any serializable value.
    ///
    /// # Errors
    /// Returns an encode error if `value` cannot be represented as JSON.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| ApiError::encode(&e))
    }

    pub(crate) fn encode(&self) -> Result<String, ApiError> {
        match self {
            RequestBody::Json(value) => {
                serde_json::to_string(value).map_err(|e| ApiError::encode(&e))
            }
            RequestBody::Text(text) => Ok(text.clone()),
        }
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_string())
    }
}

/// Method, body and extra headers for one logical call.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<RequestBody>,
    /// Caller headers; these override the default content type.
    pub headers: HeaderMap,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            headers: HeaderMap::new(),
        }
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Which send of a logical call this is. A call never goes past `Retried`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attempt {
    Original,
    Retried,
}

impl Attempt {
    pub(crate) fn index(self) -> u8 {
        match self {
            Attempt::Original => 0,
            Attempt::Retried => 1,
        }
    }
}
