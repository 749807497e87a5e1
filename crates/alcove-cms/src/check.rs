//! Connection diagnostics.

use crate::client::{ClientError, DirectusClient, HealthStatus};
use crate::config::CmsConfig;

/// Collections the site reads.
pub const REQUIRED_COLLECTIONS: &[&str] = &["blog_posts", "projects", "stream_recap"];

/// State of one required collection.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionState {
    /// Present, with this many items
    Found { items: u64 },
    /// Present, but counting its items failed
    Unreadable(String),
    /// Not defined in the CMS
    Missing,
}

/// Result of [`check_connection`].
#[derive(Debug)]
pub struct ConnectionReport {
    pub url: String,
    pub email: String,
    pub health: Result<HealthStatus, ClientError>,
    pub login: Option<Result<(), ClientError>>,
    pub collections: Vec<(String, CollectionState)>,
}

impl ConnectionReport {
    /// True when the CMS is healthy and accepted the credentials.
    pub fn is_connected(&self) -> bool {
        matches!(&self.health, Ok(h) if h.is_ok()) && matches!(self.login, Some(Ok(())))
    }

    /// Required collections that do not exist.
    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.collections
            .iter()
            .filter(|(_, s)| *s == CollectionState::Missing)
            .map(|(name, _)| name.as_str())
    }
}

/// Check health, login and the required collections.
///
/// Steps after a failed one are skipped; the report records how far it got.
pub async fn check_connection(
    client: &DirectusClient,
    config: &CmsConfig,
) -> ConnectionReport {
    let mut report = ConnectionReport {
        url: config.url.clone(),
        email: config.email.clone(),
        health: client.health().await,
        login: None,
        collections: Vec::new(),
    };

    if !matches!(&report.health, Ok(h) if h.is_ok()) {
        return report;
    }

    let login = client.login(&config.email, &config.password).await;
    let logged_in = login.is_ok();
    report.login = Some(login);
    if !logged_in {
        return report;
    }

    let existing = match client.list_collections().await {
        Ok(existing) => existing,
        Err(e) => {
            tracing::warn!("Could not list collections: {}", e);
            report.collections = REQUIRED_COLLECTIONS
                .iter()
                .map(|name| (name.to_string(), CollectionState::Unreadable(e.to_string())))
                .collect();
            return report;
        }
    };

    for name in REQUIRED_COLLECTIONS {
        let state = if !existing.iter().any(|c| c == name) {
            CollectionState::Missing
        } else {
            match client.count_items(name).await {
                Ok(items) => CollectionState::Found { items },
                Err(e) => CollectionState::Unreadable(e.to_string()),
            }
        };
        report.collections.push((name.to_string(), state));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with_health(status: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/server/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": status })))
            .mount(&server)
            .await;
        server
    }

    async fn mount_login(server: &MockServer, status: u16) {
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "data": { "access_token": "tok", "expires": 900000 }
            })))
            .mount(server)
            .await;
    }

    fn setup(server: &MockServer) -> (DirectusClient, CmsConfig) {
        let config = CmsConfig::default().with_overrides(Some(server.uri()), None, None);
        (DirectusClient::new(&config).unwrap(), config)
    }

    #[tokio::test]
    async fn reports_counts_and_missing_collections() {
        let server = server_with_health("ok").await;
        mount_login(&server, 200).await;
        Mock::given(method("GET"))
            .and(path("/collections"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "collection": "blog_posts" }, { "collection": "projects" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/items/blog_posts"))
            .and(query_param("meta", "total_count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{}], "meta": { "total_count": 4 }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/items/projects"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let (client, config) = setup(&server);
        let report = check_connection(&client, &config).await;

        assert!(report.is_connected());
        assert_eq!(report.collections[0].1, CollectionState::Found { items: 4 });
        assert!(matches!(report.collections[1].1, CollectionState::Unreadable(_)));
        assert_eq!(report.missing().collect::<Vec<_>>(), vec!["stream_recap"]);
    }

    #[tokio::test]
    async fn stops_after_failed_login() {
        let server = server_with_health("ok").await;
        mount_login(&server, 401).await;

        let (client, config) = setup(&server);
        let report = check_connection(&client, &config).await;

        assert!(!report.is_connected());
        assert!(matches!(report.login, Some(Err(ClientError::Unauthorized(_)))));
        assert!(report.collections.is_empty());
    }

    #[tokio::test]
    async fn unhealthy_cms_skips_login() {
        let server = server_with_health("error").await;

        let (client, config) = setup(&server);
        let report = check_connection(&client, &config).await;

        assert!(!report.is_connected());
        assert!(report.login.is_none());
    }
}
