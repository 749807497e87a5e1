//! Development server command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use alcove_server::{DevServer, DevServerConfig, Rebuild, RebuildError};
use alcove_static::SiteConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;

use super::build::build_site;
use super::project_root;

/// Rebuilds the whole site from a fresh read of the config file.
struct SiteRebuild {
    config_path: PathBuf,
    offline: bool,
}

#[async_trait]
impl Rebuild for SiteRebuild {
    async fn rebuild(&self) -> Result<(), RebuildError> {
        let result = build_site(&self.config_path, None, self.offline).await?;
        tracing::info!(
            "Rebuilt {} pages in {}ms ({})",
            result.pages,
            result.duration_ms,
            result.status
        );
        Ok(())
    }
}

/// Run the dev server.
pub async fn run(config_path: &Path, port: u16, open: bool, offline: bool) -> Result<()> {
    tracing::info!("Starting development server on port {}", port);

    let root = project_root(config_path);
    let site = SiteConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let config = DevServerConfig {
        output_dir: site.paths(&root).output,
        watch_paths: watch_paths(&site, &root, config_path),
        port,
        open,
        ..Default::default()
    };

    let builder = Arc::new(SiteRebuild {
        config_path: config_path.to_path_buf(),
        offline,
    });

    DevServer::new(config, builder).start().await?;

    Ok(())
}

/// Configured watch paths plus the config file itself.
fn watch_paths(site: &SiteConfig, root: &Path, config_path: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = site.server.watch.iter().map(|p| root.join(p)).collect();
    paths.push(config_path.to_path_buf());
    paths
}
