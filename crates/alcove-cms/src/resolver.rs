//! Content resolution with fallback to sample records.
//!
//! The resolver asks the live source first and substitutes fixture records
//! when the CMS is unavailable, rejects the credentials, or cannot serve a
//! collection. Every result is tagged with how it was obtained.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::fixtures::FixtureSource;
use crate::records::{BlogPost, Project, StreamRecap};
use crate::source::{ContentSource, Fetch, SourceError};

/// How the site content was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    /// Live records from the CMS
    Connected,
    /// The CMS did not answer its health check
    Unavailable,
    /// The CMS rejected the login
    AuthenticationFailed,
    /// A collection could not be read or was empty
    PermissionDenied,
}

impl ContentStatus {
    /// Snake-case tag, as exposed to templates.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Unavailable => "unavailable",
            Self::AuthenticationFailed => "authentication_failed",
            Self::PermissionDenied => "permission_denied",
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why fixture records were substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    Unavailable,
    AuthenticationFailed,
    PermissionDenied,
}

impl FallbackReason {
    /// Classify a source error.
    pub fn from_error(err: &SourceError) -> Self {
        match err {
            SourceError::Unavailable(_) => Self::Unavailable,
            SourceError::Authentication(_) => Self::AuthenticationFailed,
            SourceError::Fetch { .. } | SourceError::Empty { .. } => Self::PermissionDenied,
        }
    }
}

impl From<FallbackReason> for ContentStatus {
    fn from(reason: FallbackReason) -> Self {
        match reason {
            FallbackReason::Unavailable => Self::Unavailable,
            FallbackReason::AuthenticationFailed => Self::AuthenticationFailed,
            FallbackReason::PermissionDenied => Self::PermissionDenied,
        }
    }
}

/// Records tagged with their origin.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<T> {
    /// Records served by the live source
    Live(Vec<T>),
    /// Fixture records, and why they were used
    Fallback(Vec<T>, FallbackReason),
}

impl<T> Resolved<T> {
    /// The records, whatever their origin.
    pub fn records(&self) -> &[T] {
        match self {
            Self::Live(records) | Self::Fallback(records, _) => records,
        }
    }

    /// Take the records, whatever their origin.
    pub fn into_records(self) -> Vec<T> {
        match self {
            Self::Live(records) | Self::Fallback(records, _) => records,
        }
    }

    /// Status tag for these records.
    pub fn status(&self) -> ContentStatus {
        match self {
            Self::Live(_) => ContentStatus::Connected,
            Self::Fallback(_, reason) => (*reason).into(),
        }
    }

    /// Whether fixture records were substituted.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(..))
    }
}

/// Every collection plus the status tag, as one consistent snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteContent {
    pub blog_posts: Vec<BlogPost>,
    pub projects: Vec<Project>,
    pub stream_recaps: Vec<StreamRecap>,
    #[serde(rename = "directus_status")]
    pub status: ContentStatus,
}

/// Ordered fallback chain: live source first, fixtures second.
pub struct ContentResolver {
    live: Option<Box<dyn ContentSource>>,
    fallback: FixtureSource,
    cache_enabled: bool,
    cache: OnceCell<SiteContent>,
}

impl ContentResolver {
    /// Resolve from a live source, falling back to fixtures.
    pub fn new(live: impl ContentSource + 'static, fallback: FixtureSource) -> Self {
        Self {
            live: Some(Box::new(live)),
            fallback,
            cache_enabled: false,
            cache: OnceCell::new(),
        }
    }

    /// Never contact a live source; every result is a fallback tagged `unavailable`.
    pub fn offline(fallback: FixtureSource) -> Self {
        Self {
            live: None,
            fallback,
            cache_enabled: false,
            cache: OnceCell::new(),
        }
    }

    /// Keep the first batch result for the lifetime of this resolver.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Resolve every collection as one batch.
    ///
    /// If any collection cannot be served live, all of them come from the
    /// fixtures so the site never mixes live and sample records.
    pub async fn resolve_all(&self) -> SiteContent {
        if self.cache_enabled {
            return self.cache.get_or_init(|| self.resolve_batch()).await.clone();
        }
        self.resolve_batch().await
    }

    /// Resolve a single collection independently of the others.
    pub async fn resolve<C: Fetch>(&self) -> Resolved<C> {
        let Some(live) = self.live.as_deref() else {
            return self.fallback_for(FallbackReason::Unavailable).await;
        };

        if let Err(e) = live.ensure_connected().await {
            let reason = FallbackReason::from_error(&e);
            tracing::warn!(
                "{}; using sample data for {}",
                describe(reason),
                C::DATA_KEY
            );
            return self.fallback_for(reason).await;
        }

        tracing::debug!("Fetching {} from {}", C::DATA_KEY, live.name());
        match C::fetch_from(live).await {
            Ok(records) => Resolved::Live(records),
            Err(e) => {
                tracing::warn!("Could not load {} from CMS: {}; using sample data", C::DATA_KEY, e);
                self.fallback_for(FallbackReason::from_error(&e)).await
            }
        }
    }

    async fn fallback_for<C: Fetch>(&self, reason: FallbackReason) -> Resolved<C> {
        let records = C::fetch_from(&self.fallback).await.unwrap_or_default();
        Resolved::Fallback(records, reason)
    }

    async fn resolve_batch(&self) -> SiteContent {
        let Some(live) = self.live.as_deref() else {
            tracing::info!("CMS disabled, using sample data");
            return self.fallback_content(FallbackReason::Unavailable).await;
        };

        if let Err(e) = live.ensure_connected().await {
            let reason = FallbackReason::from_error(&e);
            tracing::info!("{}. Using sample data.", describe(reason));
            return self.fallback_content(reason).await;
        }

        tracing::info!("Fetching content from {}...", live.name());
        let (blog_posts, projects, stream_recaps) =
            tokio::join!(live.blog_posts(), live.projects(), live.stream_recaps());

        match (blog_posts, projects, stream_recaps) {
            (Ok(blog_posts), Ok(projects), Ok(stream_recaps)) => {
                tracing::info!(
                    blog_posts = blog_posts.len(),
                    projects = projects.len(),
                    stream_recaps = stream_recaps.len(),
                    "Loaded live content"
                );
                SiteContent {
                    blog_posts,
                    projects,
                    stream_recaps,
                    status: ContentStatus::Connected,
                }
            }
            (blog_posts, projects, stream_recaps) => {
                for err in [blog_posts.err(), projects.err(), stream_recaps.err()]
                    .into_iter()
                    .flatten()
                {
                    tracing::warn!("{}", err);
                }
                tracing::info!(
                    "Using sample data due to permission issues or missing data from the CMS."
                );
                self.fallback_content(FallbackReason::PermissionDenied).await
            }
        }
    }

    async fn fallback_content(&self, reason: FallbackReason) -> SiteContent {
        SiteContent {
            blog_posts: self.fallback_for::<BlogPost>(reason).await.into_records(),
            projects: self.fallback_for::<Project>(reason).await.into_records(),
            stream_recaps: self.fallback_for::<StreamRecap>(reason).await.into_records(),
            status: reason.into(),
        }
    }
}

fn describe(reason: FallbackReason) -> &'static str {
    match reason {
        FallbackReason::Unavailable => "CMS is not available",
        FallbackReason::AuthenticationFailed => "Failed to log in to the CMS",
        FallbackReason::PermissionDenied => "CMS refused the request",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ItemId;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use crate::config::CmsConfig;
    use crate::source::DirectusSource;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn post(id: i64, slug: &str) -> BlogPost {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "title": slug.to_uppercase(),
            "slug": slug,
            "date_published": format!("2025-0{}-01", id),
        }))
        .unwrap()
    }

    /// Live source with scripted answers.
    #[derive(Clone)]
    struct Scripted {
        connection: Result<(), SourceError>,
        blog_posts: Result<Vec<BlogPost>, SourceError>,
        projects: Result<Vec<Project>, SourceError>,
        stream_recaps: Result<Vec<StreamRecap>, SourceError>,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn connected() -> Self {
            let fixtures = FixtureSource::bundled();
            let posts = vec![post(3, "third"), post(2, "second")];
            Self {
                connection: Ok(()),
                blog_posts: Ok(posts),
                projects: Ok(fixtures.projects.clone()),
                stream_recaps: Ok(fixtures.stream_recaps.clone()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl ContentSource for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn ensure_connected(&self) -> Result<(), SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.connection.clone()
        }

        async fn blog_posts(&self) -> Result<Vec<BlogPost>, SourceError> {
            self.blog_posts.clone()
        }

        async fn projects(&self) -> Result<Vec<Project>, SourceError> {
            self.projects.clone()
        }

        async fn stream_recaps(&self) -> Result<Vec<StreamRecap>, SourceError> {
            self.stream_recaps.clone()
        }
    }

    fn fixtures() -> FixtureSource {
        FixtureSource::bundled()
    }

    #[tokio::test]
    async fn connected_returns_live_records_in_source_order() {
        let resolver = ContentResolver::new(Scripted::connected(), fixtures());

        let content = resolver.resolve_all().await;

        assert_eq!(content.status, ContentStatus::Connected);
        let slugs: Vec<_> = content.blog_posts.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["third", "second"]);
    }

    #[tokio::test]
    async fn unavailable_uses_fixtures() {
        let mut live = Scripted::connected();
        live.connection = Err(SourceError::Unavailable("connection refused".into()));
        let resolver = ContentResolver::new(live, fixtures());

        let content = resolver.resolve_all().await;

        assert_eq!(content.status, ContentStatus::Unavailable);
        assert_eq!(content.blog_posts, fixtures().blog_posts);
        assert_eq!(content.projects, fixtures().projects);
        assert_eq!(content.stream_recaps, fixtures().stream_recaps);
    }

    #[tokio::test]
    async fn failed_login_uses_fixtures() {
        let mut live = Scripted::connected();
        live.connection = Err(SourceError::Authentication("invalid credentials".into()));
        let resolver = ContentResolver::new(live, fixtures());

        let content = resolver.resolve_all().await;

        assert_eq!(content.status, ContentStatus::AuthenticationFailed);
        assert_eq!(content.projects, fixtures().projects);
    }

    #[tokio::test]
    async fn one_failed_collection_falls_back_for_all() {
        let mut live = Scripted::connected();
        live.projects = Err(SourceError::Fetch {
            collection: "projects",
            message: "status 403".into(),
        });
        let resolver = ContentResolver::new(live, fixtures());

        let content = resolver.resolve_all().await;

        assert_eq!(content.status, ContentStatus::PermissionDenied);
        // Blog posts were served live but are replaced too
        assert_eq!(content.blog_posts, fixtures().blog_posts);
        assert_eq!(content.stream_recaps, fixtures().stream_recaps);
    }

    #[tokio::test]
    async fn empty_collection_falls_back_for_all() {
        let mut live = Scripted::connected();
        live.stream_recaps = Err(SourceError::Empty {
            collection: "stream_recap",
        });
        let resolver = ContentResolver::new(live, fixtures());

        assert_eq!(
            resolver.resolve_all().await.status,
            ContentStatus::PermissionDenied
        );
    }

    #[tokio::test]
    async fn offline_never_connects() {
        let resolver = ContentResolver::offline(fixtures());

        let content = resolver.resolve_all().await;
        let single = resolver.resolve::<Project>().await;

        assert_eq!(content.status, ContentStatus::Unavailable);
        assert_eq!(single, Resolved::Fallback(fixtures().projects, FallbackReason::Unavailable));
    }

    #[tokio::test]
    async fn repeated_resolution_is_identical() {
        let mut live = Scripted::connected();
        live.projects = Err(SourceError::Empty {
            collection: "projects",
        });
        let resolver = ContentResolver::new(live, fixtures());

        let first = resolver.resolve_all().await;
        let second = resolver.resolve_all().await;

        assert_eq!(first, second);

        let connected = ContentResolver::new(Scripted::connected(), fixtures());
        assert_eq!(connected.resolve_all().await, connected.resolve_all().await);
    }

    #[tokio::test]
    async fn cache_keeps_first_result() {
        let live = Scripted::connected();
        let calls = Arc::clone(&live.calls);
        let resolver = ContentResolver::new(live, fixtures()).with_cache(true);

        let first = resolver.resolve_all().await;
        let second = resolver.resolve_all().await;

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn without_cache_every_call_hits_the_source() {
        let live = Scripted::connected();
        let calls = Arc::clone(&live.calls);
        let resolver = ContentResolver::new(live, fixtures());

        resolver.resolve_all().await;
        resolver.resolve_all().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn single_collection_falls_back_independently() {
        let mut live = Scripted::connected();
        live.projects = Err(SourceError::Fetch {
            collection: "projects",
            message: "boom".into(),
        });
        let resolver = ContentResolver::new(live, fixtures());

        let posts = resolver.resolve::<BlogPost>().await;
        let projects = resolver.resolve::<Project>().await;

        assert_eq!(posts.status(), ContentStatus::Connected);
        assert_eq!(posts.records()[0].id, ItemId::Int(3));
        assert_eq!(projects.status(), ContentStatus::PermissionDenied);
        assert!(projects.is_fallback());
        assert_eq!(projects.into_records(), fixtures().projects);
    }

    #[tokio::test]
    async fn single_collection_tags_auth_failure() {
        let mut live = Scripted::connected();
        live.connection = Err(SourceError::Authentication("bad".into()));
        let resolver = ContentResolver::new(live, fixtures());

        let recaps = resolver.resolve::<StreamRecap>().await;

        assert_eq!(recaps.status(), ContentStatus::AuthenticationFailed);
        assert_eq!(recaps.records(), fixtures().stream_recaps.as_slice());
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(ContentStatus::AuthenticationFailed).unwrap(),
            "authentication_failed"
        );
        assert_eq!(ContentStatus::PermissionDenied.to_string(), "permission_denied");
    }

    #[test]
    fn site_content_exposes_directus_status() {
        let content = SiteContent {
            blog_posts: vec![],
            projects: vec![],
            stream_recaps: vec![],
            status: ContentStatus::Connected,
        };

        let value = serde_json::to_value(&content).unwrap();

        assert_eq!(value["directus_status"], "connected");
        assert!(value["blog_posts"].as_array().unwrap().is_empty());
    }

    const PUBLISHED: &str = r#"{"status":{"_eq":"published"}}"#;

    /// Resolver over a healthy Directus that accepts the default login.
    async fn directus_resolver(server: &MockServer) -> ContentResolver {
        Mock::given(method("GET"))
            .and(path("/server/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "access_token": "tok", "expires": 900000 }
            })))
            .mount(server)
            .await;

        let config = CmsConfig::default().with_overrides(Some(server.uri()), None, None);
        ContentResolver::new(DirectusSource::new(config).unwrap(), FixtureSource::bundled())
    }

    /// Serve published items for `collection` only when asked with `sort`.
    async fn mount_items(
        server: &MockServer,
        collection: &str,
        sort: &str,
        response: ResponseTemplate,
    ) {
        Mock::given(method("GET"))
            .and(path(format!("/items/{}", collection)))
            .and(query_param("sort", sort))
            .and(query_param("filter", PUBLISHED))
            .respond_with(response)
            .mount(server)
            .await;
    }

    fn items(data: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
    }

    async fn mount_posts_and_projects(server: &MockServer) {
        mount_items(
            server,
            "blog_posts",
            "-date_published",
            items(json!([
                { "id": 2, "title": "Newer", "slug": "newer", "date_published": "2025-05-01T00:00:00Z" },
                { "id": 1, "title": "Older", "slug": "older", "date_published": "2025-01-01T00:00:00Z" }
            ])),
        )
        .await;
        mount_items(
            server,
            "projects",
            "sort_order,-date_completed",
            items(json!([{ "id": 5, "title": "Site", "slug": "site" }])),
        )
        .await;
    }

    #[tokio::test]
    async fn live_batch_over_http() {
        let server = MockServer::start().await;
        let resolver = directus_resolver(&server).await;
        mount_posts_and_projects(&server).await;
        mount_items(
            &server,
            "stream_recap",
            "-stream_date",
            items(json!([{ "id": 9, "title": "Stream", "slug": "stream", "stream_date": "2025-04-10" }])),
        )
        .await;

        let content = resolver.resolve_all().await;

        assert_eq!(content.status, ContentStatus::Connected);
        let slugs: Vec<_> = content.blog_posts.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["newer", "older"]);
        assert_eq!(content.projects[0].slug, "site");
        assert_eq!(content.stream_recaps[0].id, ItemId::Int(9));
    }

    #[tokio::test]
    async fn forbidden_collection_over_http_falls_back_for_all() {
        let server = MockServer::start().await;
        let resolver = directus_resolver(&server).await;
        mount_posts_and_projects(&server).await;
        mount_items(
            &server,
            "stream_recap",
            "-stream_date",
            ResponseTemplate::new(403).set_body_json(json!({
                "errors": [{ "message": "You don't have permission to access this." }]
            })),
        )
        .await;

        let content = resolver.resolve_all().await;

        assert_eq!(content.status, ContentStatus::PermissionDenied);
        assert_eq!(content.blog_posts, fixtures().blog_posts);
        assert_eq!(content.projects, fixtures().projects);
        assert_eq!(content.stream_recaps, fixtures().stream_recaps);
    }

    #[tokio::test]
    async fn empty_collection_over_http_falls_back_for_all() {
        let server = MockServer::start().await;
        let resolver = directus_resolver(&server).await;
        mount_posts_and_projects(&server).await;
        mount_items(&server, "stream_recap", "-stream_date", items(json!([]))).await;

        let content = resolver.resolve_all().await;

        assert_eq!(content.status, ContentStatus::PermissionDenied);
        assert_eq!(content.blog_posts, fixtures().blog_posts);
        assert_eq!(content.stream_recaps, fixtures().stream_recaps);
    }
}
