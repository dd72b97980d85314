//! Plain progressive-download byte source.
//!
//! Bytes pass through unmodified: the download task appends them to the
//! shared buffer as they arrive and readers consume the already-downloaded
//! prefix, blocking only for bytes still in flight.

use std::sync::Arc;

use url::Url;

use crate::buffer::StreamBuffer;
use crate::download::{DownloadSession, PassthroughSink};
use crate::error::SourceResult;
use crate::settings::SourceSettings;
use crate::source::{ByteSource, SourceHandle};

/// Progressive HTTP byte source.
///
/// The download starts at construction and runs until completion, failure or
/// cancellation. Dropping the source cancels the session.
pub struct ProgressiveSource {
    buffer: Arc<StreamBuffer>,
    session: DownloadSession,
}

impl ProgressiveSource {
    /// Open the remote stream and start downloading.
    ///
    /// Fails with [`crate::SourceError::Transport`] when the request cannot
    /// be opened; body-level failures surface later through `read_at`.
    pub async fn open(settings: &SourceSettings, url: Url) -> SourceResult<Self> {
        let (session, buffer) =
            DownloadSession::start(settings, url, None, PassthroughSink::new).await?;
        Ok(Self { buffer, session })
    }
}

impl ByteSource for ProgressiveSource {
    fn length(&self) -> Option<u64> {
        self.buffer.total_len()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> SourceResult<usize> {
        self.buffer.read_at(offset, buf)
    }

    fn cancel_download(&self) {
        self.session.cancel();
    }

    fn handle(&self) -> SourceHandle {
        SourceHandle {
            buffer: Arc::clone(&self.buffer),
            cancel: self.session.cancel_token(),
        }
    }
}

impl std::fmt::Debug for ProgressiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressiveSource")
            .field("downloaded", &self.buffer.high_water_mark())
            .field("length", &self.buffer.total_len())
            .finish()
    }
}
