//! CLI error types.

use folio_config::ConfigError;
use folio_site::LiveError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Live(#[from] LiveError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Page \"{0}\" not found")]
    NotFound(String),

    #[error("{0} page(s) failed to render")]
    RenderFailed(usize),
}
