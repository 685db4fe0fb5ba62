use std::io;

use thiserror::Error;

/// Errors returned by fingerprint operations.
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("fingerprint: invalid option {name:?}={value}: {reason}")]
    Configuration {
        name: String,
        value: i32,
        reason: String,
    },

    #[error("fingerprint: failed to start stream: {0}")]
    Start(String),

    #[error("fingerprint: failed to feed audio: {0}")]
    Feed(String),

    #[error("fingerprint: failed to finish stream: {0}")]
    Finish(String),

    #[error("fingerprint: failed to extract fingerprint: {0}")]
    Extraction(String),

    #[error("fingerprint: source read failed: {0}")]
    SourceRead(#[from] io::Error),
}

/// Result alias for fingerprint operations.
pub type Result<T> = std::result::Result<T, FingerprintError>;
