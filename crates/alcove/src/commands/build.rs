//! Static site build command.

use std::path::{Path, PathBuf};

use alcove_cms::ContentStatus;
use alcove_static::{content_resolver, BuildResult, SiteConfig, StaticBuilder};
use anyhow::{Context, Result};

use super::project_root;

/// Run the build command.
pub async fn run(config_path: &Path, output: Option<PathBuf>, offline: bool) -> Result<()> {
    tracing::info!("Building static site...");

    let result = build_site(config_path, output, offline).await?;

    if result.status != ContentStatus::Connected {
        tracing::warn!("Built with sample content ({})", result.status);
    }
    tracing::info!(
        "Build complete: {} pages, {} passthrough files in {}ms",
        result.pages,
        result.passthrough,
        result.duration_ms
    );
    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}

/// Load the config and run one full build.
pub async fn build_site(
    config_path: &Path,
    output: Option<PathBuf>,
    offline: bool,
) -> Result<BuildResult> {
    let root = project_root(config_path);
    let config = SiteConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let resolver = content_resolver(&config.cms, &root, offline)?;
    let mut builder = StaticBuilder::new(config, &root, resolver);
    if let Some(dir) = output {
        builder = builder.with_output_dir(dir);
    }

    let result = builder.build().await?;
    Ok(result)
}
