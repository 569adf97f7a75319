use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::credentials::{CredentialStore, mask_token};
use super::errors::{ApiError, parse_body_lenient};
use super::request::{Attempt, RequestBody, RequestOptions};
use crate::config::{AuthEndpoints, Config};

type PendingRefresh = Shared<BoxFuture<'static, Option<String>>>;

/// Settings needed to build an [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL without trailing slash; paths are appended verbatim.
    pub base_url: String,
    pub refresh_path: String,
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

impl ClientOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            refresh_path: AuthEndpoints::default().refresh,
            timeout: None,
            user_agent: None,
        }
    }

    /// Builds options from the loaded config (env override applied).
    ///
    /// # Errors
    /// Returns an error if the effective base URL is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            base_url: config.effective_base_url()?,
            refresh_path: config.endpoints.refresh.clone(),
            timeout: config.request_timeout(),
            user_agent: config.user_agent.clone(),
        })
    }
}

/// Client for the OpenPersona API.
///
/// Cloning is cheap: clones share the credential, the cookie jar and the
/// pending refresh, so one instance per application session is enough.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    base_url: String,
    base: Url,
    refresh_path: String,
    jar: Arc<Jar>,
    /// `name=value` pairs loaded by `restore_session_cookies`
    restored: Mutex<Vec<(String, String)>>,
    credentials: CredentialStore,
    pending_refresh: Mutex<Option<PendingRefresh>>,
}

#[derive(Deserialize)]
struct RefreshEnvelope {
    data: Option<RefreshData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshData {
    access_token: Option<String>,
}

impl ApiClient {
    /// Creates a client with a fresh cookie jar and no credential.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let base = Url::parse(&options.base_url)
            .with_context(|| format!("Invalid API base URL: {}", options.base_url))?;
        let jar = Arc::new(Jar::default());

        let mut builder = reqwest::Client::builder().cookie_provider(Arc::clone(&jar));
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &options.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: options.base_url,
                base,
                refresh_path: options.refresh_path,
                jar,
                restored: Mutex::new(Vec::new()),
                credentials: CredentialStore::default(),
                pending_refresh: Mutex::new(None),
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn set_credential(&self, token: Option<String>) {
        self.inner.credentials.set(token);
    }

    pub fn credential(&self) -> Option<String> {
        self.inner.credentials.get()
    }

    pub fn clear_credential(&self) {
        self.inner.credentials.clear();
    }

    /// Registers an observer called with each token minted by [`ApiClient::refresh`].
    pub fn on_credential_refreshed(&self, observer: impl Fn(&str) + Send + Sync + 'static) {
        self.inner.credentials.subscribe(observer);
    }

    /// Cookie header the server has set for the refresh endpoint, if any.
    ///
    /// One pair per cookie name. When a restored cookie has been rotated by
    /// the server (possibly on a narrower path), the rotated value wins.
    pub fn session_cookies(&self) -> Option<String> {
        let pairs = self.inner.current_cookies();
        (!pairs.is_empty()).then(|| {
            pairs
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ")
        })
    }

    /// Loads `name=value` pairs (as returned by [`ApiClient::session_cookies`]) into the jar.
    ///
    /// Repeated names keep their first value.
    pub fn restore_session_cookies(&self, header: &str) {
        let pairs = dedup_pairs(parse_cookie_header(header));
        for (name, value) in &pairs {
            self.inner.pin_cookie(name, value);
        }
        *self
            .inner
            .restored
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = pairs;
    }

    /// Exchanges the refresh session for a new access credential.
    ///
    /// At most one exchange runs at a time: concurrent callers await the
    /// in-flight one and receive its result. Returns `None` on any failure,
    /// after clearing the credential.
    pub async fn refresh(&self) -> Option<String> {
        let pending = {
            let mut slot = self
                .inner
                .pending_refresh
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            if let Some(existing) = slot.as_ref() {
                debug!("joining in-flight refresh");
                existing.clone()
            } else {
                let inner = Arc::clone(&self.inner);
                let exchange = async move {
                    let token = inner.exchange_refresh().await;
                    *inner
                        .pending_refresh
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = None;
                    token
                }
                .boxed()
                .shared();
                *slot = Some(exchange.clone());
                exchange
            }
        };

        pending.await
    }

    /// Sends a request and returns the parsed JSON body.
    ///
    /// A 401 with `allow_retry` triggers one refresh and, if that yields a
    /// credential, exactly one resend with retry disabled.
    ///
    /// # Errors
    /// Returns an [`ApiError`] for transport failures and non-2xx responses.
    pub async fn execute(
        &self,
        path: &str,
        options: RequestOptions,
        allow_retry: bool,
    ) -> Result<Value, ApiError> {
        let url = self.inner.url(path);
        let body = options.body.as_ref().map(RequestBody::encode).transpose()?;

        let mut attempt = Attempt::Original;
        loop {
            debug!(
                method = %options.method,
                path,
                attempt = attempt.index(),
                "sending request"
            );
            let response = self
                .inner
                .send(&url, &options.method, &options.headers, body.clone())
                .await?;

            if response.status() == StatusCode::UNAUTHORIZED
                && allow_retry
                && attempt == Attempt::Original
            {
                if self.refresh().await.is_some() {
                    attempt = Attempt::Retried;
                    continue;
                }
                debug!(path, "refresh failed, surfacing 401");
            }

            return read_response(response).await;
        }
    }

    /// GET with the default retry policy.
    ///
    /// # Errors
    /// See [`ApiClient::execute`].
    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.execute(path, RequestOptions::new(Method::GET), true)
            .await
    }

    /// POST with an optional JSON body.
    ///
    /// # Errors
    /// See [`ApiClient::execute`].
    pub async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        let mut options = RequestOptions::new(Method::POST);
        options.body = body.map(RequestBody::Json);
        self.execute(path, options, true).await
    }

    /// PUT with a JSON body.
    ///
    /// # Errors
    /// See [`ApiClient::execute`].
    pub async fn put(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.execute(path, RequestOptions::new(Method::PUT).body(body), true)
            .await
    }

    /// DELETE with the default retry policy.
    ///
    /// # Errors
    /// See [`ApiClient::execute`].
    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.execute(path, RequestOptions::new(Method::DELETE), true)
            .await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("credentials", &self.inner.credentials)
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn pin_cookie(&self, name: &str, value: &str) {
        self.jar
            .add_cookie_str(&format!("{name}={value}; Path=/"), &self.base);
    }

    /// Cookies the jar would send to the refresh endpoint, one per name.
    fn current_cookies(&self) -> Vec<(String, String)> {
        let Ok(url) = Url::parse(&self.url(&self.refresh_path)) else {
            return Vec::new();
        };
        let Some(header) = self.jar.cookies(&url) else {
            return Vec::new();
        };
        let Ok(header) = header.to_str() else {
            return Vec::new();
        };

        let restored = self
            .restored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut pairs: Vec<(String, String)> = Vec::new();
        for (name, value) in parse_cookie_header(header) {
            let stale = restored.iter().any(|(n, v)| *n == name && *v == value);
            match pairs.iter().position(|(n, _)| *n == name) {
                Some(i) => {
                    let existing_stale =
                        restored.iter().any(|(n, v)| *n == name && *v == pairs[i].1);
                    if existing_stale && !stale {
                        pairs[i].1 = value;
                    }
                }
                None => pairs.push((name, value)),
            }
        }
        pairs
    }

    async fn send(
        &self,
        url: &str,
        method: &Method,
        extra_headers: &HeaderMap,
        body: Option<String>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in extra_headers {
            headers.insert(name.clone(), value.clone());
        }

        if let Some(token) = self.credentials.get() {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("access credential is not a valid header value, sending without it"),
            }
        }

        let mut request = self.http.request(method.clone(), url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }

        request.send().await.map_err(|e| {
            warn!(error = %e, url, "transport failure");
            ApiError::connectivity()
        })
    }

    async fn exchange_refresh(&self) -> Option<String> {
        info!("refreshing access credential");
        let url = self.url(&self.refresh_path);

        let response = match self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "refresh request failed");
                self.credentials.clear();
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "refresh rejected");
            self.credentials.clear();
            return None;
        }

        let token = match response.bytes().await {
            Ok(body) => serde_json::from_slice::<RefreshEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.data)
                .and_then(|data| data.access_token)
                .filter(|token| !token.is_empty()),
            Err(e) => {
                warn!(error = %e, "failed to read refresh response");
                None
            }
        };

        let Some(token) = token else {
            warn!("refresh response carried no access token");
            self.credentials.clear();
            return None;
        };

        // A rotated cookie may sit on a narrower path than the restored one;
        // overwrite the root copy so every endpoint sees the new value.
        for (name, value) in self.current_cookies() {
            self.pin_cookie(&name, &value);
        }

        self.credentials.set(Some(token.clone()));
        self.credentials.notify_refreshed(&token);
        info!(token = %mask_token(&token), "access credential refreshed");
        Some(token)
    }
}

fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

fn dedup_pairs(pairs: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut seen: Vec<(String, String)> = Vec::new();
    for (name, value) in pairs {
        if !seen.iter().any(|(n, _)| *n == name) {
            seen.push((name, value));
        }
    }
    seen
}

/// Parses the body of a final response. Unparsable bodies become `{}`.
async fn read_response(response: reqwest::Response) -> Result<Value, ApiError> {
    let status = response.status();
    let body = response.bytes().await.unwrap_or_default();

    if !status.is_success() {
        let err = ApiError::from_response(status, &body);
        debug!(status = status.as_u16(), message = %err.message, "request failed");
        return Err(err);
    }

    Ok(parse_body_lenient(&body))
}
