//! CMS connection settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

/// Default Directus URL for local development.
pub const DEFAULT_URL: &str = "http://localhost:8055";

/// Default admin email for local development.
pub const DEFAULT_EMAIL: &str = "admin@example.com";

/// Default admin password for local development.
pub const DEFAULT_PASSWORD: &str = "change-me-please";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the Directus instance.
#[derive(Clone, PartialEq)]
pub struct CmsConfig {
    /// Base URL of the Directus instance
    pub url: String,

    /// Login email
    pub email: String,

    /// Login password
    pub password: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Only fetch items whose status is `published`
    pub published_only: bool,
}

impl std::fmt::Debug for CmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmsConfig")
            .field("url", &self.url)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("published_only", &self.published_only)
            .finish()
    }
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            email: DEFAULT_EMAIL.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            timeout: DEFAULT_TIMEOUT,
            published_only: true,
        }
    }
}

/// Errors in CMS configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid CMS URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to load {path}: {message}")]
    EnvFile { path: PathBuf, message: String },
}

impl CmsConfig {
    /// Settings from the `DIRECTUS_*` process environment, with local defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Settings from an arbitrary variable lookup, with local defaults.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            url: non_empty("DIRECTUS_URL").unwrap_or(defaults.url),
            email: non_empty("DIRECTUS_EMAIL").unwrap_or(defaults.email),
            password: non_empty("DIRECTUS_PASSWORD").unwrap_or(defaults.password),
            ..defaults
        }
    }

    /// Apply explicit overrides on top of these settings.
    ///
    /// Blank values count as unset.
    pub fn with_overrides(
        mut self,
        url: Option<String>,
        email: Option<String>,
        password: Option<String>,
    ) -> Self {
        let set = |v: Option<String>| v.filter(|v| !v.trim().is_empty());
        let (url, email, password) = (set(url), set(email), set(password));

        if let Some(url) = url {
            self.url = url;
        }
        if let Some(email) = email {
            self.email = email;
        }
        if let Some(password) = password {
            self.password = password;
        }
        self
    }

    /// Parse and normalize the base URL.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let trimmed = self.url.trim().trim_end_matches('/');
        Url::parse(&format!("{}/", trimmed)).map_err(|source| ConfigError::InvalidUrl {
            url: self.url.clone(),
            source,
        })
    }
}

/// Load `.env` from the project root, or `.env.local` when `.env` is absent.
///
/// Variables already set in the process environment win. Returns the file
/// that was loaded, if any.
pub fn load_env_file(root: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let candidates = [root.join(".env"), root.join(".env.local")];

    let Some(path) = candidates.into_iter().find(|p| p.exists()) else {
        tracing::debug!("No .env file found in {}, using defaults", root.display());
        return Ok(None);
    };

    dotenvy::from_path(&path).map_err(|e| ConfigError::EnvFile {
        path: path.clone(),
        message: e.to_string(),
    })?;

    tracing::info!("Loaded environment variables from {}", path.display());
    Ok(Some(path))
}
