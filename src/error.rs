//! Error types for replikv.

use std::io;
use thiserror::Error;

/// Result type alias for replikv operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for replikv.
#[derive(Error, Debug)]
pub enum Error {
    /// Wire protocol decode errors
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Store access errors
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),
}

/// Decode errors for the command stream.
///
/// Incomplete input is not an error: the parser reports it as `Ok(None)` and
/// the caller keeps accumulating bytes. These variants are the verdicts that
/// can never become a valid command, and force the caller to discard its
/// buffer and start framing fresh.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// First three bytes match no known command
    #[error("unrecognised command")]
    UnrecognisedCommand,

    /// The digit-count byte of an argument is not a decimal digit
    #[error("invalid digit-count byte: {0:?}")]
    InvalidDigitCount(u8),

    /// The length field of an argument is not a non-negative decimal integer
    #[error("invalid argument length field")]
    InvalidLength,

    /// The max-length field of a get command is malformed
    #[error("invalid maximum length field")]
    InvalidMaxLength,
}

/// Store access errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store actor has stopped and no longer services requests
    #[error("store is closed")]
    Closed,
}
