use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    /// An edge refers to a node that was never created.
    #[error("{kind} node missing for {key}")]
    MissingNode { kind: &'static str, key: String },

    #[error("Failed to write graph to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
