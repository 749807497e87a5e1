//! Content sources.
//!
//! A [`ContentSource`] yields the records of every collection. The live
//! [`DirectusSource`] talks to the CMS; [`crate::FixtureSource`] serves the
//! bundled samples. The resolver composes the two.

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::OnceCell;

use crate::client::{ClientError, DirectusClient};
use crate::config::CmsConfig;
use crate::query::ItemQuery;
use crate::records::{BlogPost, Collection, Project, StreamRecap};

/// Errors a content source can report.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    #[error("CMS is unavailable: {0}")]
    Unavailable(String),

    #[error("CMS authentication failed: {0}")]
    Authentication(String),

    #[error("Failed to fetch {collection}: {message}")]
    Fetch {
        collection: &'static str,
        message: String,
    },

    #[error("Collection {collection} returned no items")]
    Empty { collection: &'static str },
}

/// A provider of collection records.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Source identifier for logs (e.g. "directus", "fixtures")
    fn name(&self) -> &'static str;

    /// Check that the source can serve requests at all.
    ///
    /// Sources without a connection step are always ready.
    async fn ensure_connected(&self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Blog posts, most recent first.
    async fn blog_posts(&self) -> Result<Vec<BlogPost>, SourceError>;

    /// Projects in display order.
    async fn projects(&self) -> Result<Vec<Project>, SourceError>;

    /// Stream recaps, most recent first.
    async fn stream_recaps(&self) -> Result<Vec<StreamRecap>, SourceError>;
}

/// A collection that can be fetched from any [`ContentSource`].
pub trait Fetch: Collection {
    /// Fetch this collection's records from a source.
    fn fetch_from(source: &dyn ContentSource) -> BoxFuture<'_, Result<Vec<Self>, SourceError>>;
}

impl Fetch for BlogPost {
    fn fetch_from(source: &dyn ContentSource) -> BoxFuture<'_, Result<Vec<Self>, SourceError>> {
        source.blog_posts()
    }
}

impl Fetch for Project {
    fn fetch_from(source: &dyn ContentSource) -> BoxFuture<'_, Result<Vec<Self>, SourceError>> {
        source.projects()
    }
}

impl Fetch for StreamRecap {
    fn fetch_from(source: &dyn ContentSource) -> BoxFuture<'_, Result<Vec<Self>, SourceError>> {
        source.stream_recaps()
    }
}

/// Live content from a Directus instance.
///
/// The health check and login run once per source; later calls reuse the
/// outcome and the cached token.
pub struct DirectusSource {
    client: DirectusClient,
    config: CmsConfig,
    connected: OnceCell<Result<(), SourceError>>,
}

impl DirectusSource {
    /// Create a source. Does not contact the CMS.
    pub fn new(config: CmsConfig) -> Result<Self, ClientError> {
        let client = DirectusClient::new(&config)?;
        Ok(Self {
            client,
            config,
            connected: OnceCell::new(),
        })
    }

    /// The underlying client.
    pub fn client(&self) -> &DirectusClient {
        &self.client
    }

    async fn connect(&self) -> Result<(), SourceError> {
        match self.client.health().await {
            Ok(health) if health.is_ok() => {}
            Ok(health) => {
                tracing::warn!("CMS health check reported status {}", health.status);
                return Err(SourceError::Unavailable(format!(
                    "health status {}",
                    health.status
                )));
            }
            Err(e) => {
                tracing::warn!("CMS health check failed: {}", e);
                return Err(SourceError::Unavailable(e.to_string()));
            }
        }

        if let Err(e) = self
            .client
            .login(&self.config.email, &self.config.password)
            .await
        {
            tracing::warn!("Failed to log in to CMS: {}", e);
            return Err(SourceError::Authentication(e.to_string()));
        }

        Ok(())
    }

    async fn fetch<C: Collection>(&self) -> Result<Vec<C>, SourceError> {
        self.ensure_connected().await?;

        let mut query = ItemQuery::for_collection::<C>();
        if self.config.published_only {
            query = query.published();
        }

        tracing::debug!(collection = C::NAME, params = ?query.to_params(), "Fetching collection");

        let items: Vec<C> = self
            .client
            .read_items(C::NAME, &query)
            .await
            .map_err(|e| {
                tracing::warn!("Failed to fetch {} from CMS: {}", C::NAME, e);
                SourceError::Fetch {
                    collection: C::NAME,
                    message: e.to_string(),
                }
            })?;

        if items.is_empty() {
            tracing::warn!("CMS returned no {} items", C::NAME);
            return Err(SourceError::Empty {
                collection: C::NAME,
            });
        }

        tracing::info!(collection = C::NAME, count = items.len(), "Fetched from CMS");
        Ok(items)
    }
}

#[async_trait]
impl ContentSource for DirectusSource {
    fn name(&self) -> &'static str {
        "directus"
    }

    async fn ensure_connected(&self) -> Result<(), SourceError> {
        self.connected.get_or_init(|| self.connect()).await.clone()
    }

    async fn blog_posts(&self) -> Result<Vec<BlogPost>, SourceError> {
        self.fetch().await
    }

    async fn projects(&self) -> Result<Vec<Project>, SourceError> {
        self.fetch().await
    }

    async fn stream_recaps(&self) -> Result<Vec<StreamRecap>, SourceError> {
        self.fetch().await
    }
}
