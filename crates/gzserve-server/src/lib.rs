//! HTTP static file server with precompressed variant negotiation.
//!
//! For a request for `p`, clients that accept gzip are sent `p.gz` with
//! `Content-Encoding: gzip` whenever that file exists and is not older than
//! `p`. Everything else behaves like a plain static file server: directory
//! index pages, HTML directory listings, canonical trailing-slash redirects,
//! conditional requests and byte ranges.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::path::PathBuf;
//! use gzserve_server::{MountConfig, ServerConfig, run_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig {
//!         host: "127.0.0.1".to_owned(),
//!         port: 8080,
//!         root: PathBuf::from("public"),
//!         mounts: MountConfig::defaults(),
//!         index_page: true,
//!     };
//!
//!     run_server(config).await.unwrap();
//! }
//! ```
//!
//! # Embedding
//!
//! [`file_server`] returns a router serving a store at `/`, ready to be nested
//! into a larger axum application:
//!
//! ```ignore
//! let storage: Arc<dyn Storage> = Arc::new(FsStorage::new("public"));
//! let app = Router::new().nest_service("/assets", gzserve_server::file_server(storage, true));
//! ```
//!
//! # Architecture
//!
//! ```text
//! Request ──► handler ──► RequestContext (path, query, Accept-Encoding)
//!                │
//!                ├─► redirect (index.html, trailing slash)
//!                ├─► negotiate ──► Storage::open(p), Storage::open(p.gz)
//!                └─► respond ──► sniff ──► content (ranges, conditionals, stream)
//!                            └─► listing
//! ```

mod app;
mod content;
mod error;
mod handler;
mod listing;
mod negotiate;
mod redirect;
mod request;
mod respond;
mod sniff;
mod state;
mod stream;

use std::path::PathBuf;
use std::sync::Arc;

pub use gzserve_config::MountConfig;
use gzserve_storage::Storage;
use gzserve_storage_fs::FsStorage;

use crate::state::Mount;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Directory served by every mount.
    pub root: PathBuf,
    /// URL prefixes to serve the root under.
    pub mounts: Vec<MountConfig>,
    /// Serve an HTML page linking to each mount at `/`.
    pub index_page: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
            root: PathBuf::from("."),
            mounts: MountConfig::defaults(),
            index_page: true,
        }
    }
}

/// Create a router serving `storage` at `/`.
///
/// # Arguments
///
/// * `storage` - Store to serve files from
/// * `gzip` - Substitute fresh `.gz` variants for clients that accept gzip
pub fn file_server(storage: Arc<dyn Storage>, gzip: bool) -> axum::Router {
    app::mount_router(Mount {
        prefix: String::new(),
        storage,
        gzip,
    })
}

/// Run the server.
///
/// # Arguments
///
/// * `config` - Server configuration
///
/// # Errors
///
/// Returns an error if the mounts are invalid or the server fails to start.
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    MountConfig::validate_all(&config.mounts)?;

    let fs = FsStorage::new(config.root.clone());
    let root = fs.root().display().to_string();
    let storage: Arc<dyn Storage> = Arc::new(fs);
    let app = app::create_router(&config, &storage);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        root = %root,
        mounts = config.mounts.len(),
        "Starting server"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}

/// Create server configuration from the loaded configuration file.
#[must_use]
pub fn server_config_from_config(config: &gzserve_config::Config) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        root: config.site_resolved.root.clone(),
        mounts: config.mounts.clone(),
        index_page: config.site_resolved.index_page,
    }
}
