//! Authenticated client for the OpenPersona API.
//!
//! # Credential model
//!
//! - The access credential is a short-lived bearer token held in memory only.
//! - The refresh session is an httpOnly cookie owned by the server. The client
//!   never reads it; it only triggers the refresh exchange that depends on it.
//!
//! # Refresh and retry
//!
//! A 401 on an original request triggers one refresh exchange. Concurrent
//! callers share a single in-flight exchange. If a new credential comes back,
//! the request is resent once with retry disabled; otherwise the original 401
//! is surfaced. A logical call therefore makes at most two sends.

mod client;
mod credentials;
mod errors;
mod request;

pub use client::{ApiClient, ClientOptions};
pub use credentials::{CredentialStore, mask_token};
pub use errors::{ApiError, ApiErrorKind, CONNECTIVITY_MESSAGE, FieldError};
pub use request::{RequestBody, RequestOptions};
pub use reqwest::Method;
