//! Collection definitions and provisioning.
//!
//! Definitions are full Directus collection payloads (`collection`, `meta`,
//! `schema`, `fields`). The three site collections are bundled; a project can
//! supply its own directory of definitions instead.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use futures::future::join_all;
use serde_json::Value;
use walkdir::WalkDir;

use crate::client::{ClientError, DirectusClient};

const BUNDLED: &[(&str, &str)] = &[
    ("blog_posts.json", include_str!("../schemas/blog_posts.json")),
    ("projects.json", include_str!("../schemas/projects.json")),
    ("stream_recap.json", include_str!("../schemas/stream_recap.json")),
];

/// Errors loading or applying collection definitions.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Schema directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid collection definition in {origin}: {message}")]
    Invalid { origin: String, message: String },

    #[error("Failed to list CMS collections: {0}")]
    List(#[source] ClientError),
}

/// One collection definition.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDefinition {
    name: String,
    definition: Value,
}

impl CollectionDefinition {
    /// Parse a definition. `origin` names the file for error messages.
    pub fn from_json(origin: &str, json: &str) -> Result<Self, SchemaError> {
        let definition: Value = serde_json::from_str(json).map_err(|e| SchemaError::Invalid {
            origin: origin.to_string(),
            message: e.to_string(),
        })?;

        let name = definition
            .get("collection")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| SchemaError::Invalid {
                origin: origin.to_string(),
                message: "missing \"collection\" name".to_string(),
            })?
            .to_string();

        Ok(Self { name, definition })
    }

    /// Collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The payload sent to the CMS.
    pub fn definition(&self) -> &Value {
        &self.definition
    }

    /// Names of the declared fields.
    pub fn field_names(&self) -> Vec<&str> {
        self.definition
            .get("fields")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|f| f.get("field").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A set of collection definitions, keyed by collection name.
#[derive(Debug, Default, Clone)]
pub struct SchemaSet {
    definitions: BTreeMap<String, CollectionDefinition>,
}

impl SchemaSet {
    /// The definitions compiled into this crate.
    pub fn bundled() -> Result<Self, SchemaError> {
        let mut set = Self::default();
        for (origin, json) in BUNDLED {
            set.insert(CollectionDefinition::from_json(origin, json)?);
        }
        Ok(set)
    }

    /// Load every `*.json` definition under a directory.
    pub fn scan(dir: &Path) -> Result<Self, SchemaError> {
        if !dir.exists() {
            return Err(SchemaError::DirectoryNotFound(dir.display().to_string()));
        }

        let mut set = Self::default();
        for entry in WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let json = fs::read_to_string(path).map_err(|source| SchemaError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            set.insert(CollectionDefinition::from_json(
                &path.display().to_string(),
                &json,
            )?);
        }

        tracing::debug!("Loaded {} collection definitions from {}", set.len(), dir.display());
        Ok(set)
    }

    /// Add a definition, replacing any with the same name.
    pub fn insert(&mut self, definition: CollectionDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    /// Look up a definition by collection name.
    pub fn get(&self, name: &str) -> Option<&CollectionDefinition> {
        self.definitions.get(name)
    }

    /// Collection names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &CollectionDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// What happened to one collection during provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    AlreadyExists,
    Failed(String),
}

/// Per-collection provisioning results, in name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisionReport {
    pub outcomes: Vec<(String, ProvisionOutcome)>,
}

impl ProvisionReport {
    /// True when every collection exists after provisioning.
    pub fn is_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|(_, o)| !matches!(o, ProvisionOutcome::Failed(_)))
    }

    /// Collections that were created by this run.
    pub fn created(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == ProvisionOutcome::Created)
            .map(|(name, _)| name.as_str())
    }
}

/// Create every collection in `schemas` that the CMS does not have yet.
///
/// The client must be logged in. A failed creation is recorded in the report
/// and does not stop the remaining collections.
pub async fn provision(
    client: &DirectusClient,
    schemas: &SchemaSet,
) -> Result<ProvisionReport, SchemaError> {
    let existing = client.list_collections().await.map_err(SchemaError::List)?;

    let results = join_all(schemas.iter().map(|def| async {
        if existing.iter().any(|name| name == def.name()) {
            tracing::info!("{} collection already exists", def.name());
            return (def.name().to_string(), ProvisionOutcome::AlreadyExists);
        }

        tracing::info!("Creating {} collection...", def.name());
        let outcome = match client.create_collection(def.definition()).await {
            Ok(()) => {
                tracing::info!("{} collection created", def.name());
                ProvisionOutcome::Created
            }
            Err(e) => {
                tracing::error!("Error creating {} collection: {}", def.name(), e);
                ProvisionOutcome::Failed(e.to_string())
            }
        };
        (def.name().to_string(), outcome)
    }))
    .await;

    Ok(ProvisionReport { outcomes: results })
}
