//! Global template data.
//!
//! Every template sees the same set of globals: JSON files from the data
//! directory, the CMS content (as one batch and per collection), and the
//! site settings.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use alcove_cms::{BlogPost, ContentResolver, ContentStatus, Project, StreamRecap};
use serde::Serialize;
use serde_json::Value;

use crate::config::SiteSettings;

/// Errors loading global data.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Failed to read data file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse data file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Globals exposed to every template, keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalData {
    values: BTreeMap<String, Value>,
    status: Option<ContentStatus>,
}

impl GlobalData {
    /// Load data files and resolve CMS content.
    pub async fn load(
        data_dir: &Path,
        resolver: &ContentResolver,
        site: &SiteSettings,
    ) -> Result<Self, DataError> {
        let mut data = Self::from_dir(data_dir)?;

        let content = resolver.resolve_all().await;
        data.status = Some(content.status);
        tracing::info!(status = %content.status, "Resolved CMS content");
        data.insert("directus", &content)?;

        let blog_posts = resolver.resolve::<BlogPost>().await.into_records();
        let projects = resolver.resolve::<Project>().await.into_records();
        let stream_recaps = resolver.resolve::<StreamRecap>().await.into_records();

        let stream_pages: Vec<&StreamRecap> =
            stream_recaps.iter().filter(|r| !r.slug.is_empty()).collect();
        data.insert("stream_pages", &stream_pages)?;

        data.insert("blog_posts", &blog_posts)?;
        data.insert("projects", &projects)?;
        data.insert("stream_recaps", &stream_recaps)?;
        data.insert("site", site_value(site))?;

        Ok(data)
    }

    /// Every `*.json` file directly under `dir`, keyed by file stem.
    ///
    /// A missing directory yields no data.
    pub fn from_dir(dir: &Path) -> Result<Self, DataError> {
        let mut data = Self::default();
        if !dir.is_dir() {
            return Ok(data);
        }

        let entries = fs::read_dir(dir).map_err(|source| DataError::Read {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        paths.sort();

        for path in paths {
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = fs::read_to_string(&path).map_err(|source| DataError::Read {
                path: path.clone(),
                source,
            })?;
            let value = serde_json::from_str(&content).map_err(|source| DataError::Parse {
                path: path.clone(),
                source,
            })?;

            tracing::debug!("Loaded data file {}", path.display());
            data.values.insert(key.to_string(), value);
        }

        Ok(data)
    }

    /// Set a global, replacing any data file with the same key.
    pub fn insert<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), DataError> {
        let value = serde_json::to_value(value).map_err(|source| DataError::Serialize {
            key: key.to_string(),
            source,
        })?;
        if self.values.insert(key.to_string(), value).is_some() {
            tracing::warn!("Data file {} is shadowed by a computed global", key);
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Status of the CMS content, once resolved.
    pub fn status(&self) -> Option<ContentStatus> {
        self.status
    }

    /// Globals as template values.
    pub fn to_context(&self) -> BTreeMap<String, minijinja::Value> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), minijinja::Value::from_serialize(v)))
            .collect()
    }
}

fn site_value(site: &SiteSettings) -> Value {
    serde_json::json!({
        "title": site.title,
        "base_url": site.base_url,
    })
}
