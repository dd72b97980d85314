//! Shared download buffer with blocking range reads.
//!
//! One `StreamBuffer` backs one download session. The background download
//! task is the sole writer: it appends bytes, advances the high-water mark
//! and eventually parks the buffer in exactly one terminal phase. Readers
//! (the decoding engine's worker) issue offset-addressed range reads that
//! block on a condvar until the requested range is below the high-water mark
//! or the phase turns terminal.
//!
//! Invariants:
//! - Bytes below the high-water mark are final and immutable once visible.
//! - The high-water mark only advances; readers never observe it regress.
//! - The first terminal phase wins; later transitions are no-ops, so a
//!   cancel racing a transport failure reports whichever landed first.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{SourceError, SourceResult};

/// Re-check interval for blocked readers. Every phase transition notifies the
/// condvar under the lock, so this is an upper bound, not the wake mechanism.
const READER_RECHECK: Duration = Duration::from_millis(100);

/// Why a download session ended abnormally. Cloned into every affected
/// reader's error.
#[derive(Debug, Clone)]
pub(crate) enum FailReason {
    Transport(String),
    Decryption(String),
}

impl FailReason {
    fn to_error(&self) -> SourceError {
        match self {
            FailReason::Transport(msg) => SourceError::Transport(msg.clone()),
            FailReason::Decryption(msg) => SourceError::Decryption(msg.clone()),
        }
    }
}

/// Lifecycle of the download session that owns this buffer.
#[derive(Debug, Clone)]
enum Phase {
    Downloading,
    Complete,
    Cancelled,
    Failed(FailReason),
}

struct State {
    data: Vec<u8>,
    total_len: Option<u64>,
    phase: Phase,
}

/// Append-only byte store shared between one writer task and any number of
/// blocking readers.
pub(crate) struct StreamBuffer {
    state: Mutex<State>,
    readable: Condvar,
}

impl StreamBuffer {
    pub(crate) fn new(expected_len: Option<u64>) -> Self {
        let capacity = expected_len.map(|len| len as usize).unwrap_or(0);
        Self {
            state: Mutex::new(State {
                data: Vec::with_capacity(capacity),
                total_len: expected_len,
                phase: Phase::Downloading,
            }),
            readable: Condvar::new(),
        }
    }

    /// Append bytes from the download task and advance the high-water mark.
    ///
    /// Ignored once the buffer is terminal; a pump task racing its own
    /// cancellation must not resurrect the stream.
    pub(crate) fn append(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        if !matches!(state.phase, Phase::Downloading) {
            return;
        }
        state.data.extend_from_slice(bytes);
        tracing::trace!(high_water_mark = state.data.len(), "buffer advanced");
        self.readable.notify_all();
    }

    /// Record the total length discovered from transport metadata.
    pub(crate) fn set_total_len(&self, len: u64) {
        let mut state = self.state.lock();
        if state.total_len.is_none() {
            state.total_len = Some(len);
        }
    }

    pub(crate) fn total_len(&self) -> Option<u64> {
        self.state.lock().total_len
    }

    /// Offset up to which downloaded bytes are valid and readable.
    pub(crate) fn high_water_mark(&self) -> u64 {
        self.state.lock().data.len() as u64
    }

    /// Normal end of stream. Fixes the total length if it was unknown.
    pub(crate) fn complete(&self) {
        let mut state = self.state.lock();
        if matches!(state.phase, Phase::Downloading) {
            state.phase = Phase::Complete;
            let len = state.data.len() as u64;
            state.total_len.get_or_insert(len);
            tracing::debug!(total_len = len, "download complete");
        }
        self.readable.notify_all();
    }

    /// Cancel the session and wake all blocked readers with
    /// [`SourceError::Cancelled`]. Idempotent; a no-op after any other
    /// terminal phase.
    pub(crate) fn cancel(&self) {
        let mut state = self.state.lock();
        if matches!(state.phase, Phase::Downloading) {
            state.phase = Phase::Cancelled;
            tracing::debug!(high_water_mark = state.data.len(), "download cancelled");
        }
        self.readable.notify_all();
    }

    /// Terminal failure. Every blocked and future reader receives a clone of
    /// `reason`. Ranges already returned to readers stay valid; reads issued
    /// after this point fail fast instead of hanging.
    pub(crate) fn fail(&self, reason: FailReason) {
        let mut state = self.state.lock();
        if matches!(state.phase, Phase::Downloading) {
            tracing::warn!(?reason, "download failed");
            state.phase = Phase::Failed(reason);
        }
        self.readable.notify_all();
    }

    pub(crate) fn is_terminal(&self) -> bool {
        !matches!(self.state.lock().phase, Phase::Downloading)
    }

    /// Blocking range read.
    ///
    /// Returns the full `buf.len()` bytes as soon as the range is entirely
    /// below the high-water mark. Blocks while the download is still running
    /// and the range is not yet covered. At end of stream, returns the
    /// available trailing bytes (possibly zero) rather than an error.
    pub(crate) fn read_at(&self, offset: u64, buf: &mut [u8]) -> SourceResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let end = offset.saturating_add(buf.len() as u64);

        let mut state = self.state.lock();
        let mut waited = false;
        loop {
            let hwm = state.data.len() as u64;
            match &state.phase {
                Phase::Downloading => {
                    if end <= hwm {
                        let start = offset as usize;
                        buf.copy_from_slice(&state.data[start..start + buf.len()]);
                        return Ok(buf.len());
                    }
                    if !waited {
                        tracing::debug!(offset, len = buf.len(), hwm, "reader blocked");
                        waited = true;
                    }
                    let _ = self.readable.wait_for(&mut state, READER_RECHECK);
                }
                Phase::Complete => {
                    if offset >= hwm {
                        return Ok(0);
                    }
                    let start = offset as usize;
                    let n = buf.len().min((hwm - offset) as usize);
                    buf[..n].copy_from_slice(&state.data[start..start + n]);
                    return Ok(n);
                }
                Phase::Cancelled => return Err(SourceError::Cancelled),
                Phase::Failed(reason) => return Err(reason.to_error()),
            }
        }
    }
}
