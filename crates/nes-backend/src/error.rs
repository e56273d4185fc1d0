use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Failures surfaced by backend control operations.
///
/// No operation is retried on failure; the session is left in its prior
/// state and the error is reported once by the caller.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("path is not representable as a flat byte path: {0}")]
    InvalidPath(PathBuf),

    #[error("missing packaged resource: {0}")]
    MissingResource(PathBuf),

    #[error("backend did not become ready within {0:?}")]
    NotReady(Duration),

    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    #[error("script evaluation did not complete within {0:?}")]
    EvaluationTimeout(Duration),

    #[error("script returned {got} where {expected} was required")]
    ContractViolation {
        expected: &'static str,
        got: String,
    },

    #[error("virtual file not found: {0}")]
    VirtualFileMissing(String),

    #[error("runtime host thread is gone")]
    RuntimeGone,
}
