//! CLI command handlers.

pub mod auth;
pub mod config;
pub mod portfolios;
pub mod themes;

use persona_core::api::ApiError;

/// Turns an API error into a display-ready error, listing field problems.
pub fn describe(err: ApiError) -> anyhow::Error {
    let fields: Vec<String> = err
        .field_errors()
        .into_iter()
        .filter_map(|f| match (f.field, f.message) {
            (Some(field), Some(message)) => Some(format!("{field}: {message}")),
            (None, Some(message)) => Some(message),
            _ => None,
        })
        .collect();

    if fields.is_empty() {
        anyhow::Error::new(err)
    } else {
        anyhow::anyhow!("{}\n  {}", err.message, fields.join("\n  "))
    }
}
