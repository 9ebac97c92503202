//! CLI error types.

use gzserve_config::ConfigError;

/// Anything that stops `gzserve` before or while serving.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Runtime construction failed.
    #[error("Cannot start runtime: {0}")]
    Io(#[from] std::io::Error),

    /// Binding or serving failed.
    #[error("Server stopped: {0}")]
    Server(String),

    /// The command line names something unusable (e.g., a missing root).
    #[error("{0}")]
    Validation(String),
}
