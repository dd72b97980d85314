//! Chunked decrypting byte source for stripe-encrypted streams.
//!
//! Builds on the same download/buffer machinery as the progressive source
//! with a chunk pipeline between "bytes received" and "bytes visible":
//! transport bytes land in a staging area, and whenever a full 2048-byte
//! chunk is staged it is classified, decrypted in place when it is a
//! ciphertext chunk, and only then appended to the readable buffer. The
//! high-water mark therefore advances in chunk-granular steps and a reader
//! can never observe a half-decrypted chunk. End of stream flushes the final
//! partial chunk through the same path.
//!
//! A decryption failure is terminal for the whole source: later chunks of
//! the stream cannot be interpreted as valid audio.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use url::Url;

use crate::buffer::{FailReason, StreamBuffer};
use crate::cipher::{self, ChunkClass, CHUNK_SIZE};
use crate::download::{DownloadSession, DownloadSink};
use crate::error::SourceResult;
use crate::keys::{KeyDerivation, StreamKey};
use crate::settings::SourceSettings;
use crate::source::{ByteSource, SourceHandle};

/// Construction parameters for a [`StripedSource`].
#[derive(Debug, Clone)]
pub struct StripedParams {
    /// Stream identifier the cipher key is derived from.
    pub stream_id: String,
    /// Remote encrypted-stream URL.
    pub url: Url,
    /// Expected total content length, used when the response does not carry
    /// a `Content-Length` header.
    pub expected_len: Option<u64>,
    /// Content type as reported by the service. Not used by the source
    /// itself; the factory maps it to a decoder format hint.
    pub content_type: Option<String>,
}

/// Byte source that transparently decrypts stripe-encrypted chunks.
pub struct StripedSource {
    buffer: Arc<StreamBuffer>,
    session: DownloadSession,
}

impl StripedSource {
    /// Derive the stream key, open the remote stream and start the
    /// download/decrypt pipeline.
    ///
    /// Key derivation happens first: a bad stream identifier fails with
    /// [`crate::SourceError::KeyDerivation`] before any network I/O.
    pub async fn open(
        settings: &SourceSettings,
        derivation: &dyn KeyDerivation,
        params: StripedParams,
    ) -> SourceResult<Self> {
        let key = derivation.derive(&params.stream_id)?;
        let (session, buffer) = DownloadSession::start(
            settings,
            params.url,
            params.expected_len,
            move |buffer| StripedSink::new(buffer, key),
        )
        .await?;
        Ok(Self { buffer, session })
    }
}

impl ByteSource for StripedSource {
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

impl std::fmt::Debug for StripedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripedSource")
            .field("downloaded", &self.buffer.high_water_mark())
            .field("length", &self.buffer.total_len())
            .finish()
    }
}

/// Download sink that stages raw transport bytes and releases decrypted
/// chunks into the visible buffer.
struct StripedSink {
    buffer: Arc<StreamBuffer>,
    key: StreamKey,
    staging: BytesMut,
    next_chunk: u64,
}

impl StripedSink {
    fn new(buffer: Arc<StreamBuffer>, key: StreamKey) -> Self {
        Self {
            buffer,
            key,
            staging: BytesMut::new(),
            next_chunk: 0,
        }
    }

    /// Classify and, when striped, decrypt one chunk in place, then make it
    /// visible. Applied exactly once per chunk index.
    fn release(&mut self, chunk: &mut [u8]) -> Result<(), FailReason> {
        let index = self.next_chunk;
        self.next_chunk += 1;

        if cipher::classify(index) == ChunkClass::Ciphertext {
            cipher::decrypt_chunk(&self.key, index, chunk)
                .map_err(|e| FailReason::Decryption(e.to_string()))?;
        }
        self.buffer.append(chunk);
        Ok(())
    }

    fn release_full_chunks(&mut self) -> Result<(), FailReason> {
        while self.staging.len() >= CHUNK_SIZE {
            let mut chunk = self.staging.split_to(CHUNK_SIZE);
            self.release(&mut chunk)?;
        }
        Ok(())
    }
}

impl DownloadSink for StripedSink {
    fn receive(&mut self, bytes: Bytes) -> Result<(), FailReason> {
        self.staging.extend_from_slice(&bytes);
        self.release_full_chunks()
    }

    fn finish(&mut self) -> Result<(), FailReason> {
        self.release_full_chunks()?;
        if !self.staging.is_empty() {
            // Final partial chunk: classification and decryption apply to
            // its available bytes.
            let mut chunk = self.staging.split();
            self.release(&mut chunk)?;
        }
        Ok(())
    }
}
