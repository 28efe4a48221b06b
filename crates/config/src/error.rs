use std::path::PathBuf;

use thiserror::Error;

use ecarts_recon::ReconError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// Parsed, but describes a comparison that cannot run.
    #[error("invalid comparison config: {0}")]
    Invalid(#[from] ReconError),
}
