//! Error types for build orchestration.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::builder::BuildState;

/// Errors surfaced by builders, runners and artifact packaging.
///
/// Nothing in this crate recovers from any of these locally; every failure
/// is returned unchanged to the immediate caller.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A toolchain command could not be spawned or exited unsuccessfully.
    #[error("{title}: `{command}` failed: {reason}")]
    Execution {
        title: String,
        command: String,
        reason: String,
    },

    /// A declared artifact does not exist at packaging time.
    #[error("artifact source missing: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    /// A declared artifact exists but could not be read or written out.
    #[error("artifact {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The archive file itself could not be created or written.
    #[error("cannot write archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A concrete builder does not provide a required operation.
    #[error("builder '{builder}' does not implement {operation}")]
    Unimplemented {
        builder: String,
        operation: &'static str,
    },

    /// A lifecycle operation was called out of order.
    #[error("cannot {operation} while builder is {state}")]
    State {
        operation: &'static str,
        state: BuildState,
    },

    /// Required host tools are not on PATH.
    #[error("missing required host tools:\n{0}")]
    MissingTools(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl BuildError {
    /// Wrap an IO failure on a specific artifact path.
    pub(crate) fn artifact(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            BuildError::ArtifactMissing { path }
        } else {
            BuildError::Artifact { path, source }
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
