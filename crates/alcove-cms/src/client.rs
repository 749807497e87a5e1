//! Directus REST client.
//!
//! Thin layer over `reqwest` that knows the handful of Directus endpoints
//! alcove needs, unwraps the `{"data": ...}` envelope, and keeps the access
//! token returned by `/auth/login` until it expires.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::config::{CmsConfig, ConfigError};
use crate::query::ItemQuery;

/// User-Agent string for CMS requests.
const USER_AGENT: &str = concat!("alcove/", env!("CARGO_PKG_VERSION"));

/// Tokens are refreshed this long before the CMS says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(5);

/// Errors returned by the Directus client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid CMS configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Server returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Not authenticated - call login first")]
    NotAuthenticated,

    #[error("CMS did not become healthy after {attempts} attempts")]
    NotReady { attempts: u32 },
}

impl ClientError {
    /// Whether the CMS rejected the credentials or the token.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::NotAuthenticated)
    }
}

/// Response of the health endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    /// Whether the CMS reports itself healthy.
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    access_token: String,
    /// Lifetime in milliseconds
    #[serde(default)]
    expires: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    collection: String,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Option<Instant>,
    /// Which login issued this token
    generation: u64,
}

impl AccessToken {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

#[derive(Clone)]
struct Credentials {
    email: String,
    password: String,
}

/// Client for one Directus instance.
pub struct DirectusClient {
    http: Client,
    base: Url,
    token: RwLock<Option<AccessToken>>,
    credentials: RwLock<Option<Credentials>>,
    /// Held while an expired token is renewed
    renewal: Mutex<()>,
    logins: AtomicU64,
}

impl DirectusClient {
    /// Create a client from connection settings. Does not contact the CMS.
    pub fn new(config: &CmsConfig) -> Result<Self, ClientError> {
        let base = config.base_url()?;
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            base,
            token: RwLock::new(None),
            credentials: RwLock::new(None),
            renewal: Mutex::new(()),
            logins: AtomicU64::new(0),
        })
    }

    /// Base URL of the CMS.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Query the health endpoint.
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let url = self.base.join("server/health")?;
        let resp = self.http.get(url).send().await?;

        // Directus answers 503 with a JSON body when degraded; the body is what counts.
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::Decode(format!("health response: {}", e)))
    }

    /// Poll the health endpoint until it reports `ok`.
    pub async fn wait_until_healthy(
        &self,
        attempts: u32,
        interval: Duration,
    ) -> Result<(), ClientError> {
        for attempt in 1..=attempts {
            match self.health().await {
                Ok(health) if health.is_ok() => {
                    tracing::info!("CMS is ready");
                    return Ok(());
                }
                Ok(health) => {
                    tracing::info!(
                        "Waiting for CMS... ({}/{}), status {}",
                        attempt,
                        attempts,
                        health.status
                    );
                }
                Err(e) => {
                    tracing::info!("Waiting for CMS... ({}/{}): {}", attempt, attempts, e);
                }
            }

            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }

        Err(ClientError::NotReady { attempts })
    }

    /// Log in and cache the access token.
    ///
    /// The credentials are kept so an expired token can be renewed.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ClientError> {
        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.authenticate(&credentials).await?;
        *self.credentials.write().await = Some(credentials);
        Ok(())
    }

    /// Whether a token is currently held.
    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<(), ClientError> {
        let url = self.base.join("auth/login")?;
        let body = serde_json::json!({
            "email": credentials.email,
            "password": credentials.password,
        });

        let resp = self.http.post(url).json(&body).send().await?;
        let data: LoginData = Self::handle(resp).await?.data.ok_or_else(|| {
            ClientError::Decode("login response has no data".to_string())
        })?;

        let expires_at = data.expires.map(|ms| {
            let lifetime = Duration::from_millis(ms).saturating_sub(EXPIRY_MARGIN);
            Instant::now() + lifetime
        });

        *self.token.write().await = Some(AccessToken {
            value: data.access_token,
            expires_at,
            generation: self.logins.fetch_add(1, Ordering::SeqCst) + 1,
        });

        tracing::debug!("Authenticated against {}", self.base);
        Ok(())
    }

    /// Current bearer token, renewing it when it has expired.
    ///
    /// Concurrent callers that find the same expired token share one renewal.
    async fn bearer(&self) -> Result<String, ClientError> {
        let stale = match self.token.read().await.as_ref() {
            Some(token) if !token.is_expired() => return Ok(token.value.clone()),
            Some(token) => Some(token.generation),
            None => None,
        };

        let _renewal = self.renewal.lock().await;

        // Renewed by another request while this one waited
        if let Some(token) = self.token.read().await.as_ref() {
            if Some(token.generation) != stale {
                return Ok(token.value.clone());
            }
        }

        let credentials = self
            .credentials
            .read()
            .await
            .clone()
            .ok_or(ClientError::NotAuthenticated)?;

        tracing::debug!("Access token expired, logging in again");
        self.authenticate(&credentials).await?;

        self.token
            .read()
            .await
            .as_ref()
            .map(|t| t.value.clone())
            .ok_or(ClientError::NotAuthenticated)
    }

    async fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self.base.join(path)?;
        let token = self.bearer().await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    /// List items of a collection.
    pub async fn read_items<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &ItemQuery,
    ) -> Result<Vec<T>, ClientError> {
        let resp = self
            .authorized(Method::GET, &format!("items/{}", collection))
            .await?
            .query(&query.to_params())
            .send()
            .await?;

        let envelope: Envelope<Vec<T>> = Self::handle(resp).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// Count the items of a collection.
    pub async fn count_items(&self, collection: &str) -> Result<u64, ClientError> {
        let query = ItemQuery::new().limit(1).meta("total_count");
        let resp = self
            .authorized(Method::GET, &format!("items/{}", collection))
            .await?
            .query(&query.to_params())
            .send()
            .await?;

        let envelope: Envelope<Vec<Value>> = Self::handle(resp).await?;
        envelope
            .meta
            .and_then(|m| m.total_count)
            .ok_or_else(|| ClientError::Decode("response has no total_count".to_string()))
    }

    /// Create an item and return the stored record.
    pub async fn create_item(&self, collection: &str, item: &Value) -> Result<Value, ClientError> {
        let resp = self
            .authorized(Method::POST, &format!("items/{}", collection))
            .await?
            .json(item)
            .send()
            .await?;

        let envelope: Envelope<Value> = Self::handle(resp).await?;
        envelope
            .data
            .ok_or_else(|| ClientError::Decode("create response has no data".to_string()))
    }

    /// Names of the collections that exist in the CMS.
    pub async fn list_collections(&self) -> Result<Vec<String>, ClientError> {
        let resp = self.authorized(Method::GET, "collections").await?.send().await?;

        let envelope: Envelope<Vec<CollectionInfo>> = Self::handle(resp).await?;
        Ok(envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.collection)
            .collect())
    }

    /// Create a collection from a full definition (meta, schema, fields).
    pub async fn create_collection(&self, definition: &Value) -> Result<(), ClientError> {
        let resp = self
            .authorized(Method::POST, "collections")
            .await?
            .json(definition)
            .send()
            .await?;

        Self::check(resp).await.map(|_| ())
    }

    /// Raw body of a successful response, or the matching error.
    async fn check(resp: Response) -> Result<Vec<u8>, ClientError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if status.is_success() {
            return Ok(bytes.to_vec());
        }

        let body = String::from_utf8_lossy(&bytes).into_owned();
        Err(match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized(body),
            StatusCode::FORBIDDEN => ClientError::Forbidden(body),
            _ => ClientError::Status {
                status: status.as_u16(),
                body,
            },
        })
    }

    async fn handle<T: DeserializeOwned>(resp: Response) -> Result<Envelope<T>, ClientError> {
        let body = Self::check(resp).await?;
        serde_json::from_slice(&body)
            .map_err(|e| ClientError::Decode(format!("failed to parse body: {}", e)))
    }
}
