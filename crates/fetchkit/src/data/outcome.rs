use std::time::Duration;

use bytes::Bytes;
use encoding_rs::Encoding;
use serde::de::DeserializeOwned;

use super::Headers;
use crate::core::RetryMarker;
use crate::error::Result;

/// Terminal result of one logical fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    status: u16,
    headers: Headers,
    body: Bytes,
    not_modified: bool,
    from_cache: bool,
    elapsed: Duration,
    redirect_url: Option<String>,
    markers: Vec<RetryMarker>,
}

impl Outcome {
    pub(crate) fn new(status: u16, headers: Headers, body: Bytes, elapsed: Duration) -> Self {
        Self {
            status,
            headers,
            body,
            not_modified: false,
            from_cache: false,
            elapsed,
            redirect_url: None,
            markers: Vec::new(),
        }
    }

    pub(crate) fn not_modified(mut self) -> Self {
        self.not_modified = true;
        self
    }

    pub(crate) fn from_cache(mut self) -> Self {
        self.from_cache = true;
        self
    }

    pub(crate) fn with_trace(mut self, redirect_url: Option<String>, markers: Vec<RetryMarker>) -> Self {
        self.redirect_url = redirect_url;
        self.markers = markers;
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// `true` when the server confirmed the cached body is still valid.
    pub fn is_not_modified(&self) -> bool {
        self.not_modified
    }

    /// `true` when the body was served from the cache store without a
    /// network exchange.
    pub fn is_from_cache(&self) -> bool {
        self.from_cache
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Location announced by a 301/302 response seen during the fetch.
    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect_url.as_deref()
    }

    /// Retry decisions taken while producing this outcome.
    pub fn markers(&self) -> &[RetryMarker] {
        &self.markers
    }

    /// Body decoded as text using the `charset` of `Content-Type`.
    ///
    /// Without a known charset the body is read as UTF-8. Malformed
    /// sequences are replaced either way.
    pub fn text(&self) -> String {
        match self
            .headers
            .get("Content-Type")
            .and_then(content_type_charset)
            .and_then(|label| Encoding::for_label(label.as_bytes()))
        {
            Some(encoding) => encoding.decode_without_bom_handling(&self.body).0.into_owned(),
            None => String::from_utf8_lossy(&self.body).into_owned(),
        }
    }

    /// Body deserialized from JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// The `charset` parameter of a media type, unquoted.
fn content_type_charset(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}
