//! Directus management commands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use alcove_cms::{
    check_connection, provision, seed_sample_content, CmsConfig, CollectionState,
    ConnectionReport, DirectusClient, ProvisionOutcome, SchemaSet,
};
use alcove_static::SiteConfig;
use anyhow::{Context, Result};

/// Health polls made by `setup --wait`.
const WAIT_ATTEMPTS: u32 = 30;

/// Pause between health polls.
const WAIT_INTERVAL: Duration = Duration::from_secs(1);

/// Connection values given on the command line (or via `DIRECTUS_*`).
#[derive(Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Settings from site.toml with command line values on top.
fn connection(config_path: &Path, overrides: Overrides) -> Result<CmsConfig> {
    let site = SiteConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    Ok(site
        .cms
        .to_cms_config(|key| std::env::var(key).ok())
        .with_overrides(overrides.url, overrides.email, overrides.password))
}

/// Connect and log in, failing fast when the CMS is down.
async fn logged_in_client(config: &CmsConfig, wait: bool) -> Result<DirectusClient> {
    let client = DirectusClient::new(config)?;

    if wait {
        client.wait_until_healthy(WAIT_ATTEMPTS, WAIT_INTERVAL).await?;
    } else {
        let health = client
            .health()
            .await
            .with_context(|| format!("Cannot reach Directus at {}", config.url))?;
        if !health.is_ok() {
            anyhow::bail!("Directus at {} reports status {}", config.url, health.status);
        }
    }

    client
        .login(&config.email, &config.password)
        .await
        .with_context(|| format!("Login as {} failed", config.email))?;
    tracing::info!("Logged in as {}", config.email);

    Ok(client)
}

/// Create the collections the site reads.
pub async fn setup(
    config_path: &Path,
    overrides: Overrides,
    wait: bool,
    schemas: Option<PathBuf>,
) -> Result<()> {
    let config = connection(config_path, overrides)?;
    tracing::info!("Setting up Directus at {}", config.url);

    let client = logged_in_client(&config, wait).await?;

    let schemas = match schemas {
        Some(dir) => SchemaSet::scan(&dir)?,
        None => SchemaSet::bundled()?,
    };
    let report = provision(&client, &schemas).await?;

    for (name, outcome) in &report.outcomes {
        match outcome {
            ProvisionOutcome::Created => tracing::info!("✅ {} created", name),
            ProvisionOutcome::AlreadyExists => tracing::info!("✅ {} already exists", name),
            ProvisionOutcome::Failed(e) => tracing::error!("❌ {}: {}", name, e),
        }
    }

    if !report.is_success() {
        anyhow::bail!("Some collections could not be created");
    }

    tracing::info!("Directus setup complete!");
    tracing::info!("Run 'alcove cms seed' to add sample content.");

    Ok(())
}

/// Diagnose the connection. Fails when the CMS is down or rejects the login.
pub async fn check(config_path: &Path, overrides: Overrides) -> Result<()> {
    let config = connection(config_path, overrides)?;
    let client = DirectusClient::new(&config)?;

    let report = check_connection(&client, &config).await;
    for line in report_lines(&report) {
        tracing::info!("{}", line);
    }

    if !report.is_connected() {
        anyhow::bail!("Directus connection check failed");
    }

    Ok(())
}

/// Create one sample item per collection.
pub async fn seed(config_path: &Path, overrides: Overrides) -> Result<()> {
    let config = connection(config_path, overrides)?;
    let client = logged_in_client(&config, false).await?;

    let report = seed_sample_content(&client)
        .await
        .context("Failed to create sample content")?;

    tracing::info!("Created blog post {}", report.blog_post);
    tracing::info!("Created project {}", report.project);
    tracing::info!("Created stream recap {}", report.stream_recap);
    tracing::info!("Sample content created!");

    Ok(())
}

/// Human-readable lines for a connection report, with remediation hints.
fn report_lines(report: &ConnectionReport) -> Vec<String> {
    let mut lines = vec![
        format!("URL: {}", report.url),
        format!("Email: {}", report.email),
    ];

    match &report.health {
        Ok(health) if health.is_ok() => lines.push("✅ Directus is healthy".to_string()),
        Ok(health) => {
            lines.push(format!("❌ Directus reports status {}", health.status));
            return lines;
        }
        Err(e) => {
            lines.push(format!("❌ Cannot reach Directus: {}", e));
            lines.push("   Is Directus running? Start it and check DIRECTUS_URL.".to_string());
            return lines;
        }
    }

    match &report.login {
        Some(Ok(())) => lines.push("✅ Authentication successful".to_string()),
        Some(Err(e)) => {
            lines.push(format!("❌ Authentication failed: {}", e));
            lines.push("   Check DIRECTUS_EMAIL and DIRECTUS_PASSWORD.".to_string());
            return lines;
        }
        None => return lines,
    }

    for (name, state) in &report.collections {
        lines.push(match state {
            CollectionState::Found { items } => format!("✅ {}: {} items", name, items),
            CollectionState::Unreadable(e) => format!("❌ {}: {}", name, e),
            CollectionState::Missing => format!("❌ {}: collection not found", name),
        });
    }

    if report.missing().next().is_some() {
        lines.push("   Run 'alcove cms setup' to create missing collections.".to_string());
    }

    lines
}
