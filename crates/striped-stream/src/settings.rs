//! Configuration shared by both source variants and the factory.

use std::time::Duration;

/// Settings for opening download sessions.
///
/// Notes:
/// - The `reqwest::Client` is shared; pass a preconfigured one to control
///   proxies, TLS or connection pooling.
/// - `request_timeout` bounds the whole request including the body, so it is
///   off by default: a slow but healthy progressive download may legitimately
///   run for minutes. Set it for environments that prefer failing fast.
#[derive(Debug, Clone, Default)]
pub struct SourceSettings {
    client: reqwest::Client,
    request_timeout: Option<Duration>,
}

impl SourceSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a caller-configured HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Bound the total duration of a download request.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }
}
