//! Typed helpers for the portfolio and theme endpoints.
//!
//! Responses arrive wrapped as `{data: {...}}`. The server is inconsistent
//! about whether the payload sits under a named key (`data.portfolio`) or
//! directly under `data`, so [`unwrap_data`] accepts both.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod portfolios;
pub mod themes;

/// Portfolio category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Personal,
    Business,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Personal => "personal",
            Category::Business => "business",
        }
    }

    pub fn all() -> &'static [Category] {
        &[Category::Personal, Category::Business]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "personal" => Ok(Category::Personal),
            "business" => Ok(Category::Business),
            other => Err(format!(
                "unknown category '{other}' (expected personal or business)"
            )),
        }
    }
}

/// Returns `json.data.<key>`, falling back to `json.data`.
pub fn unwrap_data<'a>(json: &'a Value, key: &str) -> Option<&'a Value> {
    let data = json.get("data").filter(|d| !d.is_null())?;
    match data.get(key) {
        Some(inner) if !inner.is_null() => Some(inner),
        _ => Some(data),
    }
}

/// First non-empty string among `keys`, with numbers rendered as text.
pub(crate) fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Path of the public page for a published portfolio.
pub fn public_path(slug: &str) -> String {
    format!("/p/{slug}")
}
