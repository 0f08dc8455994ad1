//! Cached responses and the validators derived from them.

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};

use super::{Headers, Outcome};
use crate::core::parse_http_date;

/// The subset of `Cache-Control` directives that affect storage and expiry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheControl {
    pub max_age: Option<u64>,
    pub no_cache: bool,
    pub no_store: bool,
    pub must_revalidate: bool,
}

impl CacheControl {
    pub fn parse(header: &str) -> Self {
        let mut control = Self::default();

        for directive in header.split(',') {
            let directive = directive.trim().to_ascii_lowercase();

            match directive.as_str() {
                "no-cache" => control.no_cache = true,
                "no-store" => control.no_store = true,
                "must-revalidate" | "proxy-revalidate" => control.must_revalidate = true,
                _ => {
                    if let Some(seconds) = directive.strip_prefix("max-age=")
                        && let Ok(seconds) = seconds.trim_matches('"').parse::<u64>()
                    {
                        control.max_age = Some(seconds);
                    }
                }
            }
        }

        control
    }

    /// Whether a response with these directives may be written to a store.
    pub fn is_storable(&self) -> bool {
        !self.no_store
    }
}

/// A cached response body with its headers and validators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub body: Bytes,
    pub headers: Headers,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub server_date: Option<DateTime<Utc>>,
    /// Instant after which the entry must be revalidated before use.
    /// `None` means it is always revalidated.
    pub expires_at: Option<DateTime<Utc>>,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(body: impl Into<Bytes>, headers: Headers) -> Self {
        let mut entry = Self {
            body: body.into(),
            headers: Headers::new(),
            etag: None,
            last_modified: None,
            server_date: None,
            expires_at: None,
            stored_at: Utc::now(),
        };
        entry.apply_headers(headers);
        entry
    }

    /// Build an entry from a received response, or `None` when the response
    /// forbids storage.
    pub fn from_outcome(outcome: &Outcome) -> Option<Self> {
        let control = cache_control(outcome.headers());
        control
            .is_storable()
            .then(|| Self::new(outcome.body().clone(), outcome.headers().clone()))
    }

    /// The entry after a 304: same body, headers overlaid with the new ones.
    pub fn revalidated(&self, fresh: &Headers) -> Self {
        let mut headers = self.headers.clone();
        headers.merge(fresh);

        let mut entry = Self {
            stored_at: Utc::now(),
            ..self.clone()
        };
        entry.apply_headers(headers);
        entry
    }

    /// Whether a conditional request can be made for this entry.
    pub fn has_validators(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }

    pub fn cache_control(&self) -> CacheControl {
        cache_control(&self.headers)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at > now)
    }

    fn apply_headers(&mut self, headers: Headers) {
        self.etag = headers.get("ETag").map(str::to_owned);
        self.last_modified = headers.get("Last-Modified").and_then(parse_http_date);
        self.server_date = headers.get("Date").and_then(parse_http_date);

        let control = cache_control(&headers);
        let origin = self.server_date.unwrap_or(self.stored_at);
        self.expires_at = if control.no_cache || control.must_revalidate {
            None
        } else if let Some(max_age) = control.max_age {
            i64::try_from(max_age)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .and_then(|age| origin.checked_add_signed(age))
        } else {
            headers.get("Expires").and_then(parse_http_date)
        };
        self.headers = headers;
    }
}

fn cache_control(headers: &Headers) -> CacheControl {
    headers
        .get("Cache-Control")
        .map(CacheControl::parse)
        .unwrap_or_default()
}
