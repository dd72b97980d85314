//! Unified crate-level error types.
//!
//! One error enum covers both source variants and the factory. Transport
//! failures are string-based on purpose: wrapping the HTTP client's error
//! type would leak it into the public API, and readers only need the message
//! plus the fact that the download is terminally gone.

use std::io;

/// Result type used by this crate.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors surfaced by byte sources and the factory.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The network transport terminated abnormally before the request was
    /// satisfied. Terminal for the whole source.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The download was cancelled, either explicitly or by dropping the
    /// source. Terminal.
    #[error("download cancelled")]
    Cancelled,

    /// A seek or read addressed an offset beyond the known total length.
    #[error("offset {offset} is out of range")]
    OutOfRange {
        /// The offending offset.
        offset: u64,
    },

    /// A ciphertext chunk could not be decrypted. Terminal: later chunks of
    /// the same stream cannot be interpreted as valid audio.
    #[error("chunk decryption failed: {0}")]
    Decryption(String),

    /// The stream identifier did not produce a usable key. Distinguished from
    /// generic decryption failure for diagnosability.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// I/O error from adapter plumbing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SourceError {
    /// Whether this error marks the source as terminally unusable.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SourceError::OutOfRange { .. })
    }
}

/// `Read`/`Seek` adapters must hand errors to the decoder as `io::Error`
/// without losing the variant; the original error stays reachable via
/// `io::Error::get_ref`.
impl From<SourceError> for io::Error {
    fn from(err: SourceError) -> Self {
        let kind = match &err {
            SourceError::Cancelled => io::ErrorKind::Interrupted,
            SourceError::OutOfRange { .. } => io::ErrorKind::InvalidInput,
            SourceError::Transport(_) => io::ErrorKind::ConnectionAborted,
            SourceError::Io(e) => e.kind(),
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
