//! Alcove CLI - static site generator with Directus-backed content.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "alcove")]
#[command(about = "Static site generator with Directus-backed content")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to site.toml config file
    #[arg(short, long, default_value = "site.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a new site in the current directory
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Build the site, then rebuild and reload on every change
    Dev {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,

        /// Use sample content instead of the CMS
        #[arg(long)]
        offline: bool,
    },

    /// Build the static site
    Build {
        /// Output directory (defaults to config or "_site")
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Use sample content instead of the CMS
        #[arg(long)]
        offline: bool,
    },

    /// Preview the built site
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// Directory to serve
        #[arg(short, long, default_value = "_site")]
        dir: PathBuf,
    },

    /// Manage the Directus instance
    Cms {
        #[command(subcommand)]
        command: CmsCommand,

        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

#[derive(Subcommand)]
enum CmsCommand {
    /// Create the collections the site reads
    Setup {
        /// Wait for the CMS to become healthy first
        #[arg(long)]
        wait: bool,

        /// Directory of collection definitions (defaults to the bundled ones)
        #[arg(long)]
        schemas: Option<PathBuf>,
    },

    /// Diagnose connectivity, credentials and collections
    Check,

    /// Create one sample item in each collection
    Seed,
}

/// Connection overrides. Each falls back to the environment, then site.toml.
#[derive(Args)]
struct ConnectionArgs {
    /// Directus base URL
    #[arg(long, env = "DIRECTUS_URL", global = true)]
    url: Option<String>,

    /// Admin email
    #[arg(long, env = "DIRECTUS_EMAIL", global = true)]
    email: Option<String>,

    /// Admin password
    #[arg(long, env = "DIRECTUS_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing, so the env file can feed the DIRECTUS_* arguments
    let env_file = alcove_cms::load_env_file(Path::new("."));

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match env_file {
        Ok(Some(path)) => tracing::info!("Loaded environment from {}", path.display()),
        Ok(None) => tracing::debug!("No .env file found, using defaults"),
        Err(e) => tracing::warn!("{}", e),
    }

    // Execute command
    match cli.command {
        Commands::Init { yes } => {
            commands::init::run(yes).await?;
        }
        Commands::Dev {
            port,
            no_open,
            offline,
        } => {
            commands::dev::run(&cli.config, port, !no_open, offline).await?;
        }
        Commands::Build { output, offline } => {
            commands::build::run(&cli.config, output, offline).await?;
        }
        Commands::Serve { port, dir } => {
            commands::serve::run(port, dir).await?;
        }
        Commands::Cms {
            command,
            connection,
        } => {
            let overrides = commands::cms::Overrides {
                url: connection.url,
                email: connection.email,
                password: connection.password,
            };
            match command {
                CmsCommand::Setup { wait, schemas } => {
                    commands::cms::setup(&cli.config, overrides, wait, schemas).await?;
                }
                CmsCommand::Check => {
                    commands::cms::check(&cli.config, overrides).await?;
                }
                CmsCommand::Seed => {
                    commands::cms::seed(&cli.config, overrides).await?;
                }
            }
        }
    }

    Ok(())
}
