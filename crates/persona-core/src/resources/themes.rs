//! Theme catalog per category.

use serde::Serialize;
use serde_json::Value;

use super::{Category, first_string};
use crate::api::{ApiClient, ApiError};

pub fn category_path(category: Category) -> String {
    format!("/api/themes/{category}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

impl Theme {
    /// Accepts `id`, `_id` or `theme_id` as the identifier. Entries without one are skipped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = first_string(value, &["id", "_id", "theme_id"])?;
        Some(Self {
            name: first_string(value, &["name"]).unwrap_or_else(|| id.clone()),
            description: first_string(value, &["description"]),
            id,
        })
    }

    fn builtin(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: Some(description.to_string()),
        }
    }
}

/// Themes offered for a category.
///
/// # Errors
/// See [`ApiClient::execute`]. Callers typically fall back to [`fallback`].
pub async fn by_category(client: &ApiClient, category: Category) -> Result<Vec<Theme>, ApiError> {
    let json = client.get(&category_path(category)).await?;
    let themes = json
        .get("data")
        .and_then(|data| data.get("themes"))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Theme::from_value).collect())
        .unwrap_or_default();
    Ok(themes)
}

/// Built-in themes used when the catalog endpoint is unavailable.
pub fn fallback(category: Category) -> Vec<Theme> {
    match category {
        Category::Personal => vec![
            Theme::builtin("personal-minimal", "Minimal", "Clean & simple"),
            Theme::builtin("personal-bold", "Bold", "Dark & powerful"),
            Theme::builtin("personal-creative", "Creative", "Colorful & unique"),
        ],
        Category::Business => vec![
            Theme::builtin("business-corporate", "Corporate", "Professional & trustworthy"),
            Theme::builtin("business-modern", "Modern", "Sleek & contemporary"),
            Theme::builtin("business-elegant", "Elegant", "Refined & sophisticated"),
        ],
    }
}

/// Catalog themes, or the built-in list if the request fails.
pub async fn by_category_or_fallback(client: &ApiClient, category: Category) -> Vec<Theme> {
    match by_category(client, category).await {
        Ok(themes) => themes,
        Err(e) => {
            tracing::debug!(error = %e, %category, "theme catalog unavailable, using built-ins");
            fallback(category)
        }
    }
}
