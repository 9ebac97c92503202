//! `gzserve serve` command implementation.

use std::path::PathBuf;

use clap::Args;
use gzserve_config::{CliSettings, Config};
use gzserve_server::{run_server, server_config_from_config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover gzserve.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to serve (overrides config).
    #[arg(short, long, env = "GZSERVE_ROOT")]
    root: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Do not serve the landing page at `/`.
    #[arg(long)]
    no_index_page: bool,

    /// Enable verbose output (request and negotiation logs).
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            root: self.root,
            index_page: self.no_index_page.then_some(false),
        };

        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let root = &config.site_resolved.root;
        if !root.is_dir() {
            return Err(CliError::Validation(format!(
                "Root directory does not exist: {}",
                root.display()
            )));
        }

        output.highlight(&format!(
            "Starting server at http://{}:{}",
            config.server.host, config.server.port
        ));
        output.info(&format!("Serving from: {}", root.display()));
        for mount in &config.mounts {
            output.mount(&mount.prefix, mount.gzip);
        }
        if !config.mounts.iter().any(|m| m.gzip) {
            output.warning("No mount serves gzip variants");
        }

        let server_config = server_config_from_config(&config);
        run_server(server_config)
            .await
            .map_err(|e| CliError::Server(e.to_string()))?;

        Ok(())
    }
}
