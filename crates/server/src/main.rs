//! Berth registry server binary.

use anyhow::{Context, Result};
use berth_core::AppConfig;
use berth_server::{AppState, create_router};
use berth_storage::{BlobStore, ManifestStore};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Berth - an OCI Distribution v2 container registry
#[derive(Parser, Debug)]
#[command(name = "berthd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "BERTH_CONFIG", default_value = "config/berth.toml")]
    config: String,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Root directory for blob storage
    #[arg(long)]
    blob_root: Option<PathBuf>,

    /// Root directory for manifest storage
    #[arg(long)]
    manifest_root: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("berth v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration: defaults <- optional TOML file <- env <- CLI flags
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
    let config_path = std::path::Path::new(&args.config);
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("no config file found at {}", args.config);
    }
    let mut config: AppConfig = figment
        .merge(Env::prefixed("BERTH_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(blob_root) = args.blob_root {
        config.storage.blob_root = blob_root;
    }
    if let Some(manifest_root) = args.manifest_root {
        config.storage.manifest_root = manifest_root;
    }

    // Initialize stores (roots are created if missing)
    let blobs = Arc::new(
        BlobStore::new(&config.storage.blob_root)
            .await
            .context("failed to initialize blob store")?,
    );
    tracing::info!(root = %config.storage.blob_root.display(), "blob store initialized");

    let manifests = Arc::new(
        ManifestStore::new(&config.storage.manifest_root)
            .await
            .context("failed to initialize manifest store")?,
    );
    tracing::info!(
        root = %config.storage.manifest_root.display(),
        "manifest store initialized"
    );

    let bind = config.server.bind_addr();
    let state = AppState::new(config, blobs, manifests);
    let app = create_router(state);

    let addr: SocketAddr = bind.parse().context("invalid bind address")?;
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
