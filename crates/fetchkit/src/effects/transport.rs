use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::data::{Body, Headers, Method, ResolvedTimeouts};
use crate::error::TransportError;

/// One HTTP exchange as handed to a [`Transport`].
///
/// Headers are final: defaults, caller headers, the body content type and
/// cache validators have already been merged.
#[derive(Debug, Clone, Copy)]
pub struct TransportRequest<'a> {
    pub method: Method,
    pub url: &'a Url,
    pub headers: &'a Headers,
    pub body: Option<&'a Body>,
    pub timeouts: ResolvedTimeouts,
}

/// Raw answer to a [`TransportRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Headers,
    /// `None` when the exchange produced no readable body at all.
    pub body: Option<Bytes>,
}

impl TransportResponse {
    pub fn new(status: u16, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: Some(body.into()),
        }
    }

    /// A response whose body could not be obtained.
    pub fn without_body(status: u16, headers: Headers) -> Self {
        Self {
            status,
            headers,
            body: None,
        }
    }
}

/// Blocking HTTP client abstraction.
///
/// Implementations perform exactly one exchange per call. They must not
/// follow redirects or retry on their own; the pipeline owns both decisions.
///
/// # Implementations
///
/// - [`ReqwestTransport`](crate::ReqwestTransport): production implementation using `reqwest`
/// - [`Rewrite`]: decorator applying a [`UrlRewriter`]
/// - Scripted mocks in tests
pub trait Transport: Send + Sync {
    fn execute(&self, request: TransportRequest<'_>) -> Result<TransportResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: TransportRequest<'_>) -> Result<TransportResponse, TransportError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: TransportRequest<'_>) -> Result<TransportResponse, TransportError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: TransportRequest<'_>) -> Result<TransportResponse, TransportError> {
        (**self).execute(request)
    }
}

/// Rewrites outgoing URLs. Returning `None` blocks the request.
pub trait UrlRewriter: Send + Sync {
    fn rewrite(&self, url: &Url) -> Option<Url>;
}

impl<F> UrlRewriter for F
where
    F: Fn(&Url) -> Option<Url> + Send + Sync,
{
    fn rewrite(&self, url: &Url) -> Option<Url> {
        self(url)
    }
}

/// [`Transport`] decorator that passes every URL through a [`UrlRewriter`].
///
/// ```
/// use fetchkit::{Rewrite, TransportRequest, TransportResponse, Transport, TransportError};
/// use url::Url;
///
/// struct Echo;
/// impl Transport for Echo {
///     fn execute(&self, req: TransportRequest<'_>) -> Result<TransportResponse, TransportError> {
///         Ok(TransportResponse::new(200, Default::default(), req.url.to_string()))
///     }
/// }
///
/// let mirror = Rewrite::new(Echo, |url: &Url| {
///     let mut url = url.clone();
///     url.set_host(Some("mirror.example.com")).ok()?;
///     Some(url)
/// });
/// # let _ = mirror;
/// ```
pub struct Rewrite<T, R> {
    inner: T,
    rewriter: R,
}

impl<T: Transport, R: UrlRewriter> Rewrite<T, R> {
    pub fn new(inner: T, rewriter: R) -> Self {
        Self { inner, rewriter }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Transport, R: UrlRewriter> Transport for Rewrite<T, R> {
    fn execute(&self, request: TransportRequest<'_>) -> Result<TransportResponse, TransportError> {
        let Some(rewritten) = self.rewriter.rewrite(request.url) else {
            return Err(TransportError::Blocked {
                url: request.url.to_string(),
            });
        };
        if &rewritten != request.url {
            debug!(from = %request.url, to = %rewritten, "rewrote request URL");
        }
        self.inner.execute(TransportRequest {
            url: &rewritten,
            ..request
        })
    }
}
