//! Portfolio CRUD and public lookup.

use serde_json::{Map, Value};

use super::{Category, first_string, unwrap_data};
use crate::api::{ApiClient, ApiError, Method, RequestOptions};

pub const CREATE_PATH: &str = "/api/portfolio/create";
pub const MINE_PATH: &str = "/api/portfolio/my";

/// `/api/portfolio/{id_or_slug}`; the server serves both lookups on this path.
pub fn item_path(id_or_slug: &str) -> String {
    format!("/api/portfolio/{id_or_slug}")
}

/// Dashboard view of a portfolio. The full document stays in `raw`.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub id: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub slug: Option<String>,
    pub category: Option<Category>,
    pub created_at: Option<String>,
    pub raw: Value,
}

impl Portfolio {
    pub fn from_value(value: &Value) -> Self {
        Self {
            id: first_string(value, &["id", "_id"]),
            title: first_string(value, &["title"]),
            subtitle: first_string(value, &["subtitle"]),
            slug: first_string(value, &["slug"]),
            category: first_string(value, &["category"]).and_then(|c| c.parse().ok()),
            created_at: first_string(value, &["created_at", "createdAt"]),
            raw: value.clone(),
        }
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }
}

/// Creates a portfolio from form data plus the chosen category and theme.
///
/// # Errors
/// See [`ApiClient::execute`]; validation failures carry `errors[]` in `data`.
pub async fn create(
    client: &ApiClient,
    category: Category,
    theme_id: &str,
    mut form: Map<String, Value>,
) -> Result<Value, ApiError> {
    form.insert("category".to_string(), Value::from(category.as_str()));
    form.insert("theme_id".to_string(), Value::from(theme_id));
    client.post(CREATE_PATH, Some(Value::Object(form))).await
}

/// Portfolios owned by the signed-in user.
///
/// # Errors
/// See [`ApiClient::execute`].
pub async fn mine(client: &ApiClient) -> Result<Vec<Portfolio>, ApiError> {
    let json = client.get(MINE_PATH).await?;
    let list = unwrap_data(&json, "portfolios")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(Portfolio::from_value).collect())
        .unwrap_or_default();
    Ok(list)
}

/// Full portfolio document for editing.
///
/// # Errors
/// See [`ApiClient::execute`].
pub async fn by_id(client: &ApiClient, id: &str) -> Result<Option<Value>, ApiError> {
    let json = client.get(&item_path(id)).await?;
    Ok(unwrap_data(&json, "portfolio").cloned())
}

/// Replaces a portfolio's content.
///
/// # Errors
/// See [`ApiClient::execute`].
pub async fn update(client: &ApiClient, id: &str, form: Value) -> Result<Value, ApiError> {
    client.put(&item_path(id), form).await
}

/// # Errors
/// See [`ApiClient::execute`].
pub async fn delete(client: &ApiClient, id: &str) -> Result<Value, ApiError> {
    client.delete(&item_path(id)).await
}

/// Public read of a published portfolio. Never triggers a refresh.
///
/// # Errors
/// See [`ApiClient::execute`].
pub async fn by_slug(client: &ApiClient, slug: &str) -> Result<Option<Value>, ApiError> {
    let json = client
        .execute(&item_path(slug), RequestOptions::new(Method::GET), false)
        .await?;
    Ok(unwrap_data(&json, "portfolio").cloned())
}
