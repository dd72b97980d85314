//! Stripe cipher scheme for encrypted transport streams.
//!
//! The remote service encrypts every third 2048-byte chunk of the stream
//! (chunk index `i % 3 == 0`) with Blowfish-CBC under a fixed, publicly known
//! IV and a per-stream key. Everything in this module is pure and stateless:
//! no I/O, no concurrency, no knowledge of the container format. Garbage
//! plaintext is the decoder's problem to detect, not ours.
//!
//! Notes:
//! - A chunk is decrypted as one chained sequence of 8-byte cipher blocks.
//! - A truncated final chunk is decrypted using only its whole cipher blocks;
//!   any trailing bytes shorter than one block pass through unchanged. The
//!   container places such padding at content boundaries, never mid-chunk.

use blowfish::Blowfish;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};

use crate::keys::StreamKey;

/// Fixed size of one transport chunk, the granularity at which cipher
/// classification is decided.
pub const CHUNK_SIZE: usize = 2048;

/// Every `STRIPE_PERIOD`-th chunk (starting at index 0) is ciphertext.
pub const STRIPE_PERIOD: u64 = 3;

/// Blowfish block size in bytes.
const CIPHER_BLOCK: usize = 8;

/// Fixed initialization vector mandated by the service's wire format.
const STRIPE_IV: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

/// Cipher classification of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkClass {
    /// The chunk passes through unmodified.
    Plaintext,
    /// The chunk must be decrypted before it is served to readers.
    Ciphertext,
}

/// Classify a chunk by its zero-based index (`byte_offset / CHUNK_SIZE`).
///
/// Classification is a pure function of the index.
#[inline]
pub fn classify(chunk_index: u64) -> ChunkClass {
    if chunk_index % STRIPE_PERIOD == 0 {
        ChunkClass::Ciphertext
    } else {
        ChunkClass::Plaintext
    }
}

/// Error from the pure cipher layer.
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    /// The cipher rejected the key material.
    #[error("cipher rejected key material: {0}")]
    InvalidKey(String),
    /// The chunk could not be processed as a chained block sequence.
    #[error("chunk {chunk_index} failed block decryption: {reason}")]
    BlockDecrypt {
        /// Index of the failing chunk.
        chunk_index: u64,
        /// Cipher-level failure description.
        reason: String,
    },
}

/// Decrypt one ciphertext chunk in place.
///
/// Defined only for chunks where [`classify`] returns
/// [`ChunkClass::Ciphertext`]; calling it for a plaintext chunk is a logic
/// error upstream and corrupts data. Only the whole 8-byte blocks of `chunk`
/// are decrypted; a trailing partial block is left untouched.
pub fn decrypt_chunk(
    key: &StreamKey,
    chunk_index: u64,
    chunk: &mut [u8],
) -> Result<(), CipherError> {
    debug_assert_eq!(classify(chunk_index), ChunkClass::Ciphertext);

    let whole = chunk.len() - chunk.len() % CIPHER_BLOCK;
    if whole == 0 {
        return Ok(());
    }

    let decryptor = cbc::Decryptor::<Blowfish>::new_from_slices(key.as_bytes(), &STRIPE_IV)
        .map_err(|e| CipherError::InvalidKey(e.to_string()))?;
    decryptor
        .decrypt_padded_mut::<NoPadding>(&mut chunk[..whole])
        .map_err(|e| CipherError::BlockDecrypt {
            chunk_index,
            reason: e.to_string(),
        })?;
    Ok(())
}
