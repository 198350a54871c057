//! # votalloween-server
//!
//! Binary entry point. Everything is configured through environment
//! variables; see [`ServerConfig`].

use tracing::info;
use tracing_subscriber::EnvFilter;

use votalloween_server::image_store::ImageStore;
use votalloween_server::{serve, AppState, ServerConfig};
use votalloween_store::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,votalloween_server=debug")),
        )
        .init();

    info!("Starting Votalloween server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize storage
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)?;
    let contest = db.ensure_config()?;
    info!(
        path = %config.database_path.display(),
        phase = %contest.phase,
        "Database ready"
    );

    let images = ImageStore::new(config.uploads_path.clone(), config.max_upload_size).await?;

    let http_addr = config.http_addr;
    let state = AppState::new(db, images, config);

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
