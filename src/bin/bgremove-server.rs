//! Background removal service binary
//!
//! Resolves configuration from the environment, initializes tracing and runs
//! the HTTP server until shutdown.

use bgremove_server::{config::ServiceConfig, server};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServiceConfig::from_env();
    server::run(config).await
}
