//! Seekable byte sources for progressive and stripe-encrypted audio
//! downloads.
//!
//! This crate hands an audio player random-access byte sources whose bytes
//! are still arriving over the network. Two variants exist:
//!
//! - [`ProgressiveSource`]: a plain progressive download; bytes pass through
//!   unmodified.
//! - [`StripedSource`]: a stream whose payload is partially encrypted by the
//!   remote service (every third 2048-byte chunk, Blowfish-CBC) and is
//!   decrypted transparently, chunk by chunk, as it is read.
//!
//! Both present the same pull model to the decoding engine: `length()`,
//! `read_at(offset, buf)` blocking only until the requested range has been
//! downloaded (and decrypted), and cheap synchronous seeking via
//! [`SourceReader`]. The [`SourceFactory`] binds either variant to
//! Symphonia's `MediaSourceStream` input type.
//!
//! The download runs on a background tokio task; reads are ordinary blocking
//! calls from the decoder's worker thread. Cancellation is explicit
//! ([`SourceHandle::cancel`]) or implicit on drop, and always wakes blocked
//! readers within a bounded time.

mod buffer;
mod download;
mod error;
mod factory;
mod settings;

pub mod cipher;
pub mod keys;
pub mod source;

pub use crate::error::{SourceError, SourceResult};
pub use crate::factory::{DecoderHandle, SourceFactory};
pub use crate::settings::SourceSettings;
pub use crate::source::progressive::ProgressiveSource;
pub use crate::source::striped::{StripedParams, StripedSource};
pub use crate::source::{ByteSource, SourceHandle, SourceReader};
