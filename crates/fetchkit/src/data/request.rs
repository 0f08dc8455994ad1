use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use url::Url;

use super::{CacheEntry, Headers, Method};
use crate::body::RequestBuilder;
use crate::core::RetryPolicy;

/// Per-request timeout overrides.
///
/// Unset values fall back to the retry policy's current timeout. Set values
/// never lower it: the transport receives the larger of the two.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Option<Duration>,
    pub read: Option<Duration>,
    pub write: Option<Duration>,
}

impl Timeouts {
    pub const SHORT: Duration = Duration::from_millis(2500);
    pub const LONG: Duration = Duration::from_secs(60);

    pub fn fast() -> Self {
        Self {
            connect: Some(Self::SHORT),
            read: Some(Self::SHORT),
            write: Some(Self::SHORT),
        }
    }

    pub fn long_read() -> Self {
        Self {
            read: Some(Self::LONG),
            ..Self::fast()
        }
    }

    pub fn long_write() -> Self {
        Self {
            write: Some(Self::LONG),
            ..Self::fast()
        }
    }

    /// Combine the overrides with `base`, the policy's current timeout.
    pub fn resolve(&self, base: Duration) -> ResolvedTimeouts {
        let pick = |o: Option<Duration>| o.map_or(base, |o| o.max(base));
        ResolvedTimeouts {
            connect: pick(self.connect),
            read: pick(self.read),
            write: pick(self.write),
        }
    }
}

/// Concrete timeouts for a single transport attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTimeouts {
    pub connect: Duration,
    pub read: Duration,
    pub write: Duration,
}

/// Finalised request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    pub content_type: String,
    pub bytes: Bytes,
}

/// Shared flag checked before every dispatch attempt.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An immutable, ready-to-dispatch request.
///
/// Produced by [`RequestBuilder::build`]. The only field that may still be
/// swapped afterwards is the cache entry, which the client attaches right
/// before dispatch.
#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) origin_url: Url,
    pub(crate) headers: Headers,
    pub(crate) body: Option<Body>,
    pub(crate) timeouts: Timeouts,
    pub(crate) retry_policy: Option<Arc<dyn RetryPolicy>>,
    pub(crate) cache_entry: Option<Arc<CacheEntry>>,
    pub(crate) cache_key: String,
    pub(crate) should_cache: bool,
    pub(crate) cancel: CancelHandle,
}

impl Request {
    pub fn builder(method: Method, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    pub fn get(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::Post, url)
    }

    pub fn put(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::Put, url)
    }

    pub fn patch(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::Patch, url)
    }

    pub fn delete(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::Delete, url)
    }

    pub fn head(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::Head, url)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The URL that is dispatched, including appended query parameters.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The URL as originally given to the builder.
    pub fn origin_url(&self) -> &Url {
        &self.origin_url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Request-specific retry policy; the pipeline default applies when unset.
    pub fn retry_policy(&self) -> Option<&dyn RetryPolicy> {
        self.retry_policy.as_deref()
    }

    pub fn cache_entry(&self) -> Option<&Arc<CacheEntry>> {
        self.cache_entry.as_ref()
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn should_cache(&self) -> bool {
        self.should_cache
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Replace the cache entry used for validation.
    #[must_use]
    pub fn with_cache_entry(mut self, entry: Option<Arc<CacheEntry>>) -> Self {
        self.cache_entry = entry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_never_lower_the_base_timeout() {
        let overrides = Timeouts {
            connect: Some(Duration::from_millis(500)),
            read: Some(Duration::from_secs(10)),
            write: None,
        };

        let resolved = overrides.resolve(Duration::from_secs(2));

        assert_eq!(resolved.connect, Duration::from_secs(2));
        assert_eq!(resolved.read, Duration::from_secs(10));
        assert_eq!(resolved.write, Duration::from_secs(2));
    }

    #[test]
    fn presets() {
        let long_read = Timeouts::long_read();
        assert_eq!(long_read.connect, Some(Timeouts::SHORT));
        assert_eq!(long_read.read, Some(Timeouts::LONG));
        assert_eq!(long_read.write, Some(Timeouts::SHORT));

        let long_write = Timeouts::long_write();
        assert_eq!(long_write.read, Some(Timeouts::SHORT));
        assert_eq!(long_write.write, Some(Timeouts::LONG));
    }

    #[test]
    fn cancel_handle_is_shared() {
        let request = Request::get("https://example.com/").build().unwrap();
        let handle = request.cancel_handle();
        assert!(!request.is_cancelled());

        handle.cancel();
        assert!(request.is_cancelled());
    }
}
