//! Background download session.
//!
//! One session per source instance: the HTTP request is opened eagerly so
//! construction fails fast on transport errors and the content length is
//! known before the first read, then a tokio task pumps body chunks through a
//! [`DownloadSink`] into the shared [`StreamBuffer`].
//!
//! Notes:
//! - The pump task is the buffer's sole writer.
//! - No backpressure is applied to the network; the buffer grows to the
//!   total stream length.
//! - Cancellation is a `CancellationToken`; the select loop observes it
//!   between body chunks, and the owning source additionally parks the
//!   buffer directly so blocked readers wake without waiting on the task.

use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::buffer::{FailReason, StreamBuffer};
use crate::error::{SourceError, SourceResult};
use crate::settings::SourceSettings;

/// Routes transport bytes toward the visible buffer.
///
/// The plain progressive source passes bytes straight through; the striped
/// source stages them and releases whole decrypted chunks. Either way the
/// sink owns the only write path into the buffer.
pub(crate) trait DownloadSink: Send + 'static {
    /// Handle one transport chunk as it arrives.
    fn receive(&mut self, bytes: Bytes) -> Result<(), FailReason>;

    /// Flush anything still staged at normal end of stream.
    fn finish(&mut self) -> Result<(), FailReason>;
}

/// Sink that makes bytes visible exactly as they land.
pub(crate) struct PassthroughSink {
    buffer: Arc<StreamBuffer>,
}

impl PassthroughSink {
    pub(crate) fn new(buffer: Arc<StreamBuffer>) -> Self {
        Self { buffer }
    }
}

impl DownloadSink for PassthroughSink {
    fn receive(&mut self, bytes: Bytes) -> Result<(), FailReason> {
        self.buffer.append(&bytes);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), FailReason> {
        Ok(())
    }
}

/// Handle to the running pump task. Owned by the source; dropping it cancels
/// the session.
pub(crate) struct DownloadSession {
    cancel: CancellationToken,
    buffer: Arc<StreamBuffer>,
}

impl DownloadSession {
    /// Open the transport and spawn the pump task.
    ///
    /// `expected_len` is used when the response carries no `Content-Length`.
    /// The buffer handed to `make_sink` is the same one returned, pre-sized
    /// to the total length when known.
    pub(crate) async fn start<S, F>(
        settings: &SourceSettings,
        url: Url,
        expected_len: Option<u64>,
        make_sink: F,
    ) -> SourceResult<(Self, Arc<StreamBuffer>)>
    where
        S: DownloadSink,
        F: FnOnce(Arc<StreamBuffer>) -> S,
    {
        let request = settings.client().get(url.clone());
        let request = match settings.request_timeout() {
            Some(timeout) => request.timeout(timeout),
            None => request,
        };
        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let total_len = response.content_length().or(expected_len);
        tracing::debug!(%url, ?total_len, "download session started");

        let buffer = Arc::new(StreamBuffer::new(total_len));
        if let Some(len) = total_len {
            buffer.set_total_len(len);
        }

        let cancel = CancellationToken::new();
        let sink = make_sink(Arc::clone(&buffer));
        tokio::spawn(pump(
            response,
            sink,
            Arc::clone(&buffer),
            cancel.clone(),
        ));

        let session = Self {
            cancel,
            buffer: Arc::clone(&buffer),
        };
        Ok((session, buffer))
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop network I/O. Idempotent and safe from any context.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
        self.buffer.cancel();
    }
}

impl Drop for DownloadSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Body pump loop: transport chunks in, sink writes out, exactly one terminal
/// buffer transition on the way out.
async fn pump<S: DownloadSink>(
    mut response: reqwest::Response,
    mut sink: S,
    buffer: Arc<StreamBuffer>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                buffer.cancel();
                return;
            }
            chunk = response.chunk() => match chunk {
                Ok(Some(bytes)) => {
                    if let Err(reason) = sink.receive(bytes) {
                        buffer.fail(reason);
                        return;
                    }
                }
                Ok(None) => {
                    match sink.finish() {
                        Ok(()) => buffer.complete(),
                        Err(reason) => buffer.fail(reason),
                    }
                    return;
                }
                Err(e) => {
                    buffer.fail(FailReason::Transport(e.to_string()));
                    return;
                }
            },
        }
    }
}
