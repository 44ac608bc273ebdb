//! Asha Field Sync Server
//!
//! Reference implementation of the endpoint devices upload records to.
//!
//! # Configuration
//!
//! Environment variables:
//! - `ASHAFIELD_PORT`: Port to listen on (default: 8080)
//! - `ASHAFIELD_DATA_DIR`: Directory to store records (default: ~/.local/share/ashafield-server)
//! - `ASHAFIELD_CONFIG`: Path to config file (default: ~/.config/ashafield-server/config.yaml)
//!
//! # Config File Format
//!
//! ```yaml
//! api_keys:
//!   - key: "your-secret-key-here"
//!     name: "rampur-block"
//! ```
//!
//! Without any API keys the endpoints are open.

use std::net::SocketAddr;

use ashafield::server::{app, ApiKeyStore, AppState, ServerConfig, ServerStorage};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ashafield_server=info,ashafield=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = ServerConfig::from_env();

    // Ensure data directory exists
    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        tracing::error!("Failed to create data directory: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("Config file: {}", config.config_path.display());

    let state = AppState::new(
        ApiKeyStore::load(&config.config_path),
        ServerStorage::new(&config.data_dir),
    );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app(state)).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
