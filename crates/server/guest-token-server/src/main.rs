use anyhow::{Context, Result};
use clap::Parser;
use guest_token_server::{AppState, Config, build_router, init_tracing};
use std::path::PathBuf;
use std::sync::Arc;
use superset_guest_token::GuestTokenClient;
use tracing::info;

/// Serve Superset guest tokens for an embedded dashboard
#[derive(Parser, Debug)]
#[command(name = "guest-token-server")]
#[command(about = "Serve Superset guest tokens for an embedded dashboard")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    init_tracing(&config)?;
    config.log_sources();

    let client = GuestTokenClient::new(config.superset.clone())
        .context("Failed to create Superset client")?;
    info!(
        superset = %config.superset.base_url,
        dashboard_id = %config.superset.dashboard_id,
        "Superset guest token client initialized"
    );

    let state = AppState::new(Arc::new(client), config.embed_settings());
    let app = build_router(state, &config.server);

    let bind_addr = config.resolve_socket_addr().await?;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!("Server listening at http://{}", bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
