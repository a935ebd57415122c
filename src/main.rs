//! Multi-room Line Chat Server - Entry Point
//!
//! Loads configuration, binds the TCP listener and runs the server until
//! Ctrl-C.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use room_chat::{Server, ServerConfig};

/// Environment variable naming an optional JSON config file
const CONFIG_ENV: &str = "ROOM_CHAT_CONFIG";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=room_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("room_chat=info")),
        )
        .init();

    let config_path = env::var_os(CONFIG_ENV).map(PathBuf::from);
    let mut config = ServerConfig::load(config_path.as_deref())?;

    // Bind address from command line overrides the config
    if let Some(addr) = env::args().nth(1) {
        config.bind_addr = addr;
    }

    let listener = TcpListener::bind(&config.bind_addr).await?;
    let server = Arc::new(Server::new(config));

    let accept_loop = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.run(listener).await }
    });

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received");
    server.shutdown();

    if let Err(e) = accept_loop.await? {
        error!("Accept loop failed: {}", e);
    }
    Ok(())
}
