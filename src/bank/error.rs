//! Error types for bank sessions

use std::path::PathBuf;

/// Reasons a bank could not be opened for decoding.
///
/// All of these are recoverable: the caller treats the bank as silent.
/// An empty bank is not an error and is reported as `Ok(None)` by the open
/// routines.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("a read from media returned an error: {0}")]
    ReadFault(String),

    #[error("bitstream does not contain any recognized audio data")]
    NotRecognizedFormat,

    #[error("bitstream version mismatch")]
    VersionMismatch,

    #[error("invalid bitstream header: {0}")]
    MalformedHeader(String),

    #[error("internal logic fault: {0}")]
    InternalFault(String),
}

/// A codec failure discovered after the session was successfully opened
#[derive(Debug, thiserror::Error)]
pub enum DecodeFault {
    #[error("corrupt bitstream: {0}")]
    Corrupt(String),

    #[error("read from bank failed: {0}")]
    Io(#[from] std::io::Error),
}
