//! Construction of decoder-ready byte sources.
//!
//! The factory picks the right source variant for the connection parameters
//! and binds it to the decoding engine's expected interface: a Symphonia
//! `MediaSourceStream` plus a format `Hint`. The result is a typed
//! [`DecoderHandle`] or a structured error, never an untyped handle the
//! caller has to cast.

use std::sync::Arc;

use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::probe::Hint;
use url::Url;

use crate::error::SourceResult;
use crate::keys::KeyDerivation;
use crate::settings::SourceSettings;
use crate::source::progressive::ProgressiveSource;
use crate::source::striped::{StripedParams, StripedSource};
use crate::source::{ByteSource, SourceHandle, SourceReader};

/// A byte source bound to the decoding engine's input type.
pub struct DecoderHandle {
    /// Seekable byte stream ready for format probing and decoding.
    pub stream: MediaSourceStream,
    /// Container format hint derived from content type or URL extension.
    pub hint: Hint,
    /// Cancellation and progress handle for the underlying download.
    pub source: SourceHandle,
}

impl std::fmt::Debug for DecoderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderHandle")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Factory for decoder-bound byte sources.
pub struct SourceFactory {
    settings: SourceSettings,
    derivation: Arc<dyn KeyDerivation>,
}

impl SourceFactory {
    pub fn new(settings: SourceSettings, derivation: Arc<dyn KeyDerivation>) -> Self {
        Self {
            settings,
            derivation,
        }
    }

    /// Open a plain progressive-download source for `url`.
    pub async fn open_progressive(&self, url: Url) -> SourceResult<DecoderHandle> {
        let mut hint = Hint::new();
        if let Some(ext) = extension_from_url(&url) {
            hint.with_extension(ext);
        }

        let source = ProgressiveSource::open(&self.settings, url).await?;
        Ok(bind(source, hint))
    }

    /// Open a decrypting source for a stripe-encrypted stream.
    pub async fn open_striped(&self, params: StripedParams) -> SourceResult<DecoderHandle> {
        let mut hint = Hint::new();
        if let Some(content_type) = params.content_type.as_deref() {
            hint.mime_type(content_type);
            if let Some(ext) = extension_for_content_type(content_type) {
                hint.with_extension(ext);
            }
        } else if let Some(ext) = extension_from_url(&params.url) {
            hint.with_extension(ext);
        }

        let source = StripedSource::open(&self.settings, self.derivation.as_ref(), params).await?;
        Ok(bind(source, hint))
    }
}

impl std::fmt::Debug for SourceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFactory")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn bind<S: ByteSource>(source: S, hint: Hint) -> DecoderHandle {
    let handle = source.handle();
    let reader = SourceReader::new(source);
    let stream = MediaSourceStream::new(Box::new(reader), MediaSourceStreamOptions::default());
    DecoderHandle {
        stream,
        hint,
        source: handle,
    }
}

/// Audio file extension from the URL path, when it names one we serve.
fn extension_from_url(url: &Url) -> Option<&'static str> {
    const KNOWN: &[&str] = &["flac", "mp3", "m4a", "mp4", "aac", "ogg", "wav"];
    let ext = url.path().rsplit('/').next()?.rsplit('.').next()?;
    KNOWN
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(ext))
}

/// Map a `Content-Type` to the extension Symphonia keys its probe on.
fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim();
    match mime.to_ascii_lowercase().as_str() {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => Some("m4a"),
        "audio/ogg" | "audio/vorbis" => Some("ogg"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        _ => None,
    }
}
