//! CMS content for alcove sites.
//!
//! Fetches blog posts, projects and stream recaps from a Directus instance
//! and falls back to bundled sample records whenever the CMS cannot serve
//! them. Also provisions the collections a site needs and seeds sample
//! content.

pub mod check;
pub mod client;
pub mod config;
pub mod fixtures;
pub mod query;
pub mod records;
pub mod resolver;
pub mod schema;
pub mod seed;
pub mod source;

pub use check::{check_connection, CollectionState, ConnectionReport, REQUIRED_COLLECTIONS};
pub use client::{ClientError, DirectusClient, HealthStatus};
pub use config::{load_env_file, CmsConfig, ConfigError};
pub use fixtures::FixtureSource;
pub use query::ItemQuery;
pub use records::{BlogPost, Collection, ItemId, Project, Resource, StreamRecap};
pub use resolver::{ContentResolver, ContentStatus, FallbackReason, Resolved, SiteContent};
pub use schema::{
    provision, CollectionDefinition, ProvisionOutcome, ProvisionReport, SchemaError, SchemaSet,
};
pub use seed::{seed_sample_content, SeedReport};
pub use source::{ContentSource, DirectusSource, Fetch, SourceError};
