//! Site configuration (`site.toml`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use alcove_cms::CmsConfig;
use serde::Deserialize;

/// Errors loading `site.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level configuration file structure.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SiteConfig {
    #[serde(default)]
    pub site: SiteSettings,
    #[serde(default)]
    pub dirs: DirSettings,
    #[serde(default)]
    pub templates: TemplateSettings,
    #[serde(default)]
    pub passthrough: Vec<String>,
    #[serde(default = "default_collection_pages")]
    pub collection_pages: Vec<CollectionPages>,
    #[serde(default)]
    pub cms: CmsSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site: SiteSettings::default(),
            dirs: DirSettings::default(),
            templates: TemplateSettings::default(),
            passthrough: Vec::new(),
            collection_pages: default_collection_pages(),
            cms: CmsSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SiteSettings {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            title: default_title(),
            base_url: default_base_url(),
        }
    }
}

/// Directory layout, relative to the project root except where noted.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DirSettings {
    #[serde(default = "default_input")]
    pub input: PathBuf,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Relative to `input`
    #[serde(default = "default_includes")]
    pub includes: PathBuf,
    /// Relative to `input`
    #[serde(default = "default_includes")]
    pub layouts: PathBuf,
    /// Relative to `input`
    #[serde(default = "default_data")]
    pub data: PathBuf,
}

impl Default for DirSettings {
    fn default() -> Self {
        Self {
            input: default_input(),
            output: default_output(),
            includes: default_includes(),
            layouts: default_includes(),
            data: default_data(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TemplateSettings {
    /// File extensions processed as templates
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    /// File names never processed
    #[serde(default = "default_ignores")]
    pub ignores: Vec<String>,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            formats: default_formats(),
            ignores: default_ignores(),
        }
    }
}

/// One page per record of a collection.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CollectionPages {
    /// Global data key holding the records (e.g. `stream_pages`)
    pub collection: String,
    /// Layout rendered for each record
    pub layout: String,
    /// Output URL, `{slug}` is replaced by the record slug
    pub permalink: String,
    /// Name under which the record is exposed to the layout
    #[serde(default = "default_alias")]
    pub alias: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CmsSettings {
    pub url: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_true")]
    pub published_only: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Contact the CMS once per build
    #[serde(default = "default_true")]
    pub cache: bool,
    /// Never contact the CMS
    #[serde(default)]
    pub offline: bool,
    /// Directory with sample JSON overriding the bundled fixtures
    pub sample_dir: Option<PathBuf>,
}

impl Default for CmsSettings {
    fn default() -> Self {
        Self {
            url: None,
            email: None,
            password: None,
            published_only: true,
            timeout_secs: default_timeout_secs(),
            cache: true,
            offline: false,
            sample_dir: None,
        }
    }
}

impl CmsSettings {
    /// Connection settings: environment first, then this file, then defaults.
    pub fn to_cms_config(&self, env: impl Fn(&str) -> Option<String>) -> CmsConfig {
        let from_file = |key: &str| match key {
            "DIRECTUS_URL" => self.url.clone(),
            "DIRECTUS_EMAIL" => self.email.clone(),
            "DIRECTUS_PASSWORD" => self.password.clone(),
            _ => None,
        };

        let mut config = CmsConfig::from_vars(|key| {
            env(key)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| from_file(key))
        });
        config.timeout = Duration::from_secs(self.timeout_secs);
        config.published_only = self.published_only;
        config
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerSettings {
    /// Paths watched by `dev`
    #[serde(default = "default_watch")]
    pub watch: Vec<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            watch: default_watch(),
        }
    }
}

fn default_title() -> String {
    "AlternaDevStudio".to_string()
}
fn default_base_url() -> String {
    "/".to_string()
}
fn default_input() -> PathBuf {
    PathBuf::from("src")
}
fn default_output() -> PathBuf {
    PathBuf::from("_site")
}
fn default_includes() -> PathBuf {
    PathBuf::from("_includes")
}
fn default_data() -> PathBuf {
    PathBuf::from("_data")
}
fn default_formats() -> Vec<String> {
    ["html", "jinja", "njk", "md"].map(String::from).to_vec()
}
fn default_ignores() -> Vec<String> {
    vec!["README.md".to_string()]
}
fn default_alias() -> String {
    "item".to_string()
}
fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_watch() -> Vec<PathBuf> {
    vec![default_input()]
}
fn default_collection_pages() -> Vec<CollectionPages> {
    vec![CollectionPages {
        collection: "stream_pages".to_string(),
        layout: "stream_recap.html".to_string(),
        permalink: "/streams/{slug}/".to_string(),
        alias: "recap".to_string(),
    }]
}

impl SiteConfig {
    /// Load configuration from `path`.
    ///
    /// A missing file yields the defaults; a file that exists but does not
    /// parse is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No {} found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Resolve every directory against a project root.
    pub fn paths(&self, root: &Path) -> SitePaths {
        let input = root.join(&self.dirs.input);
        SitePaths {
            output: root.join(&self.dirs.output),
            includes: input.join(&self.dirs.includes),
            layouts: input.join(&self.dirs.layouts),
            data: input.join(&self.dirs.data),
            input,
        }
    }
}

/// Absolute (root-joined) site directories.
#[derive(Debug, Clone, PartialEq)]
pub struct SitePaths {
    pub input: PathBuf,
    pub output: PathBuf,
    pub includes: PathBuf,
    pub layouts: PathBuf,
    pub data: PathBuf,
}
