//! The byte-source abstraction consumed by the decoding engine.
//!
//! Sources are offset-addressed and cursor-free: [`ByteSource::read_at`] is
//! the only suspension point, blocking the calling thread just long enough
//! for the background download to cover the requested range. The read cursor
//! the decoder expects lives in [`SourceReader`], which adapts a source to
//! `Read`/`Seek` and to Symphonia's `MediaSource` contract.

pub mod progressive;
pub mod striped;

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use symphonia::core::io::MediaSource;
use tokio_util::sync::CancellationToken;

use crate::buffer::StreamBuffer;
use crate::error::{SourceError, SourceResult};

/// Random-access, blocking byte source backed by an in-flight download.
pub trait ByteSource: Send + Sync + 'static {
    /// Total stream length, when known from transport metadata or after the
    /// download completed. Never blocks.
    fn length(&self) -> Option<u64>;

    /// Read `buf.len()` bytes at `offset`, blocking until the range is
    /// available. Returns fewer bytes than requested only at end of stream.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> SourceResult<usize>;

    /// Cancel the backing download. Idempotent; blocked readers are woken
    /// with [`SourceError::Cancelled`] within a bounded time.
    fn cancel_download(&self);

    /// A cheap handle for cancellation and progress observation that
    /// outlives moving the source into a decoder.
    fn handle(&self) -> SourceHandle;
}

impl<S: ByteSource> ByteSource for Arc<S> {
    fn length(&self) -> Option<u64> {
        (**self).length()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> SourceResult<usize> {
        (**self).read_at(offset, buf)
    }

    fn cancel_download(&self) {
        (**self).cancel_download();
    }

    fn handle(&self) -> SourceHandle {
        (**self).handle()
    }
}

/// Clonable handle to a source's download session.
///
/// Stays usable after the source itself has been moved into the decoding
/// engine, which is exactly when a player needs to cancel a track.
#[derive(Clone)]
pub struct SourceHandle {
    pub(crate) buffer: Arc<StreamBuffer>,
    pub(crate) cancel: CancellationToken,
}

impl SourceHandle {
    /// Cancel the download and wake blocked readers.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.buffer.cancel();
    }

    /// Bytes downloaded and visible so far (the high-water mark).
    pub fn downloaded(&self) -> u64 {
        self.buffer.high_water_mark()
    }

    /// Total stream length, when known.
    pub fn length(&self) -> Option<u64> {
        self.buffer.total_len()
    }

    /// Download progress in `0.0..=1.0`, when the total length is known.
    pub fn progress(&self) -> Option<f64> {
        let total = self.buffer.total_len()?;
        if total == 0 {
            return Some(1.0);
        }
        Some((self.downloaded() as f64 / total as f64).min(1.0))
    }

    /// Whether the session reached a terminal state.
    pub fn is_done(&self) -> bool {
        self.buffer.is_terminal()
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceHandle")
            .field("downloaded", &self.downloaded())
            .field("length", &self.length())
            .finish()
    }
}

/// `Read`/`Seek` view over a [`ByteSource`], holding the decoder's cursor.
///
/// Seeking is pure bookkeeping and never blocks; blocking happens on the
/// next read. Seek followed by read returns exactly the bytes a direct
/// `read_at` at that offset would.
pub struct SourceReader<S> {
    source: S,
    pos: u64,
}

impl<S: ByteSource> SourceReader<S> {
    pub fn new(source: S) -> Self {
        Self { source, pos: 0 }
    }

    /// Position the cursor at `offset`.
    ///
    /// Succeeds for any `offset <= length` while the length is known;
    /// offsets past a known end fail with [`SourceError::OutOfRange`]. With
    /// the length still unknown the seek is accepted and the next read
    /// resolves it.
    pub fn seek_to(&mut self, offset: u64) -> SourceResult<()> {
        if let Some(total) = self.source.length() {
            if offset > total {
                return Err(SourceError::OutOfRange { offset });
            }
        }
        self.pos = offset;
        Ok(())
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn get_ref(&self) -> &S {
        &self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: ByteSource> Read for SourceReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.source.read_at(self.pos, buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<S: ByteSource> Seek for SourceReader<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.pos) + i128::from(delta),
            SeekFrom::End(delta) => {
                let total = self.source.length().ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "cannot seek from end: stream length unknown",
                    )
                })?;
                i128::from(total) + i128::from(delta)
            }
        };
        let target = u64::try_from(target).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to negative position")
        })?;
        self.seek_to(target)?;
        Ok(self.pos)
    }
}

impl<S: ByteSource> MediaSource for SourceReader<S> {
    fn is_seekable(&self) -> bool {
        self.source.length().is_some()
    }

    fn byte_len(&self) -> Option<u64> {
        self.source.length()
    }
}
