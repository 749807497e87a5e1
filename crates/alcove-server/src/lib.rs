//! Development server for alcove sites.
//!
//! Serves the built site, rebuilds it when watched files change and reloads
//! connected browsers over a WebSocket.

pub mod reload;
pub mod server;
pub mod watcher;

pub use reload::{ReloadHub, ReloadMessage};
pub use server::{DevServer, DevServerConfig, Rebuild, RebuildError, ServerError};
pub use watcher::{FileWatcher, WatchEvent};
