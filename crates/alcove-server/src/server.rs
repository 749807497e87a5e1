//! Development server implementation.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::ServeDir;

use crate::reload::{
    inject_reload_script, reload_client_script, ReloadHub, ReloadMessage, RELOAD_SCRIPT_PATH,
    RELOAD_SOCKET_PATH,
};
use crate::watcher::{FileWatcher, WatchEvent};

/// Quiet period that ends a burst of file events.
const DEBOUNCE: Duration = Duration::from_millis(150);

/// Largest HTML page the live reload script is injected into.
const MAX_INJECT_BYTES: usize = 16 * 1024 * 1024;

/// Error type returned by a site rebuild.
pub type RebuildError = Box<dyn std::error::Error + Send + Sync>;

/// Something that can rebuild the site into the served directory.
#[async_trait]
pub trait Rebuild: Send + Sync {
    async fn rebuild(&self) -> Result<(), RebuildError>;
}

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Directory the site is built into and served from
    pub output_dir: PathBuf,

    /// Paths whose changes trigger a rebuild
    pub watch_paths: Vec<PathBuf>,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("_site"),
            watch_paths: vec![PathBuf::from("src")],
            port: 8080,
            host: "127.0.0.1".to_string(),
            open: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),
}

/// Shared server state.
struct ServerState {
    hub: ReloadHub,
}

/// Development server: serves the output directory, rebuilds on change and
/// tells connected browsers to reload.
pub struct DevServer {
    config: DevServerConfig,
    builder: Arc<dyn Rebuild>,
}

impl DevServer {
    pub fn new(config: DevServerConfig, builder: Arc<dyn Rebuild>) -> Self {
        Self { config, builder }
    }

    /// Build once, then serve until the process ends.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|_| {
                ServerError::InvalidAddress(format!("{}:{}", self.config.host, self.config.port))
            })?;

        let hub = ReloadHub::new();
        let lock = Arc::new(Mutex::new(()));

        // A failed first build still serves whatever output exists
        run_rebuild(&*self.builder, &hub, &lock).await;

        let (watcher, rx) = FileWatcher::new(
            &self.config.watch_paths,
            std::slice::from_ref(&self.config.output_dir),
        )
        .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let builder = Arc::clone(&self.builder);
        let watch_hub = hub.clone();
        tokio::spawn(async move {
            rebuild_loop(rx, builder, watch_hub, lock).await;
            // Keep watcher alive
            drop(watcher);
        });

        let app = router(&self.config.output_dir, Arc::new(ServerState { hub }));

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        tracing::info!("Starting dev server at http://{}", addr);

        if self.config.open {
            let url = format!("http://{}", addr);
            if let Err(e) = open::that(&url) {
                tracing::warn!("Could not open browser: {}", e);
            }
        }

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

fn router(output_dir: &std::path::Path, state: Arc<ServerState>) -> Router {
    Router::new()
        .route(RELOAD_SOCKET_PATH, get(ws_handler))
        .route(RELOAD_SCRIPT_PATH, get(reload_script_handler))
        .fallback_service(ServeDir::new(output_dir))
        .layer(middleware::map_response(inject_into_html))
        .with_state(state)
}

/// Rebuild once per burst of file events.
async fn rebuild_loop(
    mut rx: mpsc::Receiver<WatchEvent>,
    builder: Arc<dyn Rebuild>,
    hub: ReloadHub,
    lock: Arc<Mutex<()>>,
) {
    while let Some(event) = rx.recv().await {
        tracing::info!("Changed: {}", event.path().display());

        loop {
            match tokio::time::timeout(DEBOUNCE, rx.recv()).await {
                Ok(Some(event)) => tracing::debug!("Changed: {}", event.path().display()),
                Ok(None) => return,
                Err(_) => break,
            }
        }

        run_rebuild(&*builder, &hub, &lock).await;
    }
}

async fn run_rebuild(builder: &dyn Rebuild, hub: &ReloadHub, lock: &Mutex<()>) {
    let _guard = lock.lock().await;

    match builder.rebuild().await {
        Ok(()) => hub.send(ReloadMessage::Reload),
        Err(e) => {
            tracing::error!("Build failed: {}", e);
            hub.send(ReloadMessage::BuildFailed {
                message: e.to_string(),
            });
        }
    }
}

/// Add the live reload script to every HTML response.
async fn inject_into_html(response: Response) -> Response {
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if !is_html || response.status() != StatusCode::OK {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_INJECT_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Could not read response body: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_reload_script(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

/// Handler for the live reload WebSocket endpoint.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Forward reload messages to one browser.
async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hub.subscribe();

    if !send_message(&mut socket, &ReloadMessage::Connected).await {
        return;
    }

    while let Some(msg) = next_message(&mut rx).await {
        if !send_message(&mut socket, &msg).await {
            break;
        }
    }
}

/// Next message for a browser, skipping over any it lagged behind on.
/// `None` once the hub is gone.
async fn next_message(rx: &mut broadcast::Receiver<ReloadMessage>) -> Option<ReloadMessage> {
    loop {
        match rx.recv().await {
            Ok(msg) => return Some(msg),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Live reload client skipped {} messages", skipped);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Returns false once the browser has gone away.
async fn send_message(socket: &mut WebSocket, msg: &ReloadMessage) -> bool {
    let Ok(json) = serde_json::to_string(msg) else {
        return false;
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

/// Handler for the live reload client script.
async fn reload_script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        reload_client_script(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Rebuild for Counting {
        async fn rebuild(&self) -> Result<(), RebuildError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err("layout not found".into());
            }
            Ok(())
        }
    }

    #[test]
    fn default_config() {
        let config = DevServerConfig::default();

        assert_eq!(config.port, 8080);
        assert_eq!(config.output_dir, PathBuf::from("_site"));
    }

    #[tokio::test]
    async fn closed_channel_stops_without_rebuild() {
        let (tx, rx) = mpsc::channel(10);
        let builder = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let hub = ReloadHub::new();
        let mut reloads = hub.subscribe();

        for name in ["a.html", "b.html", "c.html"] {
            tx.send(WatchEvent::Modified(PathBuf::from(name))).await.unwrap();
        }
        drop(tx);

        rebuild_loop(rx, builder.clone(), hub, Arc::new(Mutex::new(()))).await;

        // The channel closed during the quiet period, so no rebuild ran
        assert_eq!(builder.calls.load(Ordering::SeqCst), 0);
        assert!(reloads.try_recv().is_err());
    }

    #[tokio::test]
    async fn rebuild_after_quiet_period() {
        let (tx, rx) = mpsc::channel(10);
        let builder = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let hub = ReloadHub::new();
        let mut reloads = hub.subscribe();

        tx.send(WatchEvent::Modified(PathBuf::from("a.html"))).await.unwrap();
        tx.send(WatchEvent::Created(PathBuf::from("b.html"))).await.unwrap();
        let handle = tokio::spawn(rebuild_loop(
            rx,
            builder.clone() as Arc<dyn Rebuild>,
            hub,
            Arc::new(Mutex::new(())),
        ));

        tokio::time::sleep(DEBOUNCE * 4).await;
        drop(tx);
        handle.await.unwrap();

        assert_eq!(builder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(reloads.try_recv().unwrap(), ReloadMessage::Reload);
    }

    #[tokio::test]
    async fn failed_rebuild_is_reported() {
        let builder = Counting {
            calls: AtomicUsize::new(0),
            fail: true,
        };
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();

        run_rebuild(&builder, &hub, &Mutex::new(())).await;

        assert_eq!(
            rx.try_recv().unwrap(),
            ReloadMessage::BuildFailed {
                message: "layout not found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn lagging_client_keeps_receiving() {
        let (tx, mut rx) = broadcast::channel(2);
        for _ in 0..3 {
            tx.send(ReloadMessage::Reload).unwrap();
        }
        tx.send(ReloadMessage::BuildFailed {
            message: "boom".to_string(),
        })
        .unwrap();

        // Two oldest messages were overwritten; the receiver resumes after them
        assert_eq!(next_message(&mut rx).await, Some(ReloadMessage::Reload));
        assert_eq!(
            next_message(&mut rx).await,
            Some(ReloadMessage::BuildFailed {
                message: "boom".to_string()
            })
        );

        drop(tx);
        assert_eq!(next_message(&mut rx).await, None);
    }

    #[tokio::test]
    async fn serves_html_with_reload_script() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("index.html"), "<html><body>hi</body></html>").unwrap();
        fs::write(temp.path().join("site.css"), "body {}").unwrap();

        let app = router(
            temp.path(),
            Arc::new(ServerState {
                hub: ReloadHub::new(),
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let html = reqwest::get(format!("http://{}/", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        let css = reqwest::get(format!("http://{}/site.css", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        assert!(html.contains(RELOAD_SCRIPT_PATH));
        assert!(html.contains("hi"));
        assert_eq!(css, "body {}");
    }
}
