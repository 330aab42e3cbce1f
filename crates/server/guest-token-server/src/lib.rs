//! Guest token server
//!
//! Serves the dashboard embedding page and a `GET /guest-token` endpoint
//! that mints a Superset guest token for the configured dashboard on every
//! call.

pub mod config;
pub mod routes;

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

pub use crate::config::Config;
pub use crate::routes::{AppState, EmbedSettings, build_router};

/// Install the global tracing subscriber for the configured format.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_filter())?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match config.logging.format.to_lowercase().as_str() {
        "json" => builder.json().try_init(),
        "compact" => builder.compact().try_init(),
        _ => builder.pretty().try_init(),
    }
    .map_err(|e| anyhow!("Failed to initialize tracing: {}", e))
}
