use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, error, trace, warn};
use url::Url;

use super::transport::{Transport, TransportRequest, TransportResponse};
use crate::config::default_headers;
use crate::core::{
    DefaultRetryPolicy, RetryCause, RetryMarker, RetryPolicy, RetryState, StatusClass, classify,
    conditional_headers,
};
use crate::data::{Headers, Outcome, Request};
use crate::error::{FetchError, Result};

/// Responses slower than this are logged at `warn`.
pub const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_millis(3000);

/// Runs one logical request to completion over a [`Transport`].
///
/// `fetch` blocks the calling thread. Retries happen on the same thread with
/// an independent [`RetryState`] per call, so one pipeline can be shared
/// between worker threads.
///
/// ```no_run
/// use fetchkit::{FetchPipeline, Request, ReqwestTransport};
///
/// let pipeline = FetchPipeline::new(ReqwestTransport::new()?);
/// let request = Request::get("https://example.com/").accept_json().build()?;
/// let outcome = pipeline.fetch(&request)?;
/// println!("{} in {:?}", outcome.status(), outcome.elapsed());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct FetchPipeline<T> {
    transport: T,
    retry_policy: Arc<dyn RetryPolicy>,
    default_headers: Headers,
    slow_request: Duration,
}

impl<T: Transport> FetchPipeline<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            retry_policy: Arc::new(DefaultRetryPolicy::default()),
            default_headers: default_headers(),
            slow_request: SLOW_REQUEST_THRESHOLD,
        }
    }

    /// Policy used for requests that do not carry their own.
    #[must_use]
    pub fn retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry_policy = Arc::new(policy);
        self
    }

    /// Headers merged under every request's own headers.
    #[must_use]
    pub fn default_headers(mut self, headers: Headers) -> Self {
        self.default_headers = headers;
        self
    }

    #[must_use]
    pub fn slow_request_threshold(mut self, threshold: Duration) -> Self {
        self.slow_request = threshold;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Dispatch `request` until it yields an [`Outcome`] or a terminal error.
    pub fn fetch(&self, request: &Request) -> Result<Outcome> {
        let policy = request.retry_policy().unwrap_or(&*self.retry_policy);
        let headers = self.dispatch_headers(request);
        let started = Instant::now();

        let mut state = policy.start();
        let mut trace = Trace::default();

        loop {
            if request.is_cancelled() {
                debug!(url = %request.url(), "request cancelled before dispatch");
                return Err(FetchError::Cancelled);
            }

            let result = self.transport.execute(TransportRequest {
                method: request.method(),
                url: request.url(),
                headers: &headers,
                body: request.body(),
                timeouts: request.timeouts().resolve(state.timeout),
            });

            let response = match result {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    let timeout = state.timeout;
                    if !trace.retry(policy, &mut state, RetryCause::Timeout, request.url()) {
                        return Err(FetchError::Timeout {
                            attempts: state.attempt,
                            timeout,
                        });
                    }
                    continue;
                }
                Err(e) => return Err(FetchError::NoConnection(e)),
            };

            let elapsed = started.elapsed();
            self.log_response(request, &response, elapsed, &state);

            let TransportResponse {
                status,
                headers: response_headers,
                body,
            } = response;
            let class = classify(status);

            match class {
                StatusClass::Success => {
                    let outcome =
                        Outcome::new(status, response_headers, body.unwrap_or_default(), elapsed);
                    return Ok(trace.finish(outcome));
                }
                StatusClass::NotModified => {
                    let outcome = not_modified(request, response_headers, elapsed);
                    return Ok(trace.finish(outcome));
                }
                StatusClass::Moved => {
                    trace.redirect_url = response_headers.get("Location").map(str::to_owned);
                    error!(
                        origin = %request.origin_url(),
                        location = trace.redirect_url.as_deref().unwrap_or("<missing>"),
                        "request has been redirected"
                    );
                }
                StatusClass::AuthFailure | StatusClass::Failure => {
                    error!(status, url = %request.url(), "unexpected response status");
                }
            }

            let Some(body) = body else {
                return Err(FetchError::Network { status });
            };
            let outcome = Outcome::new(status, response_headers, body, elapsed);

            let cause = match class {
                StatusClass::AuthFailure => RetryCause::Auth,
                StatusClass::Moved => RetryCause::Redirect,
                _ => return Err(FetchError::Server(Box::new(trace.finish(outcome)))),
            };

            if !trace.retry(policy, &mut state, cause, request.url()) {
                let location = trace.redirect_url.clone();
                let outcome = Box::new(trace.finish(outcome));
                return Err(match cause {
                    RetryCause::Redirect => FetchError::Redirect { location, outcome },
                    _ => FetchError::Auth(outcome),
                });
            }
        }
    }

    /// Defaults under the caller's headers, then the body type and validators.
    fn dispatch_headers(&self, request: &Request) -> Headers {
        let mut headers = request.headers().clone();
        headers.merge_defaults(&self.default_headers);
        if let Some(body) = request.body() {
            headers.insert("Content-Type", body.content_type.as_str());
        }
        if let Some(entry) = request.cache_entry() {
            headers.merge(&conditional_headers(entry));
        }
        headers
    }

    fn log_response(
        &self,
        request: &Request,
        response: &TransportResponse,
        lifetime: Duration,
        state: &RetryState,
    ) {
        let size = response.body.as_ref().map(Bytes::len);
        if lifetime > self.slow_request {
            warn!(
                url = %request.url(),
                lifetime_ms = lifetime.as_millis() as u64,
                size,
                status = response.status,
                retry_count = state.attempt,
                "slow HTTP response"
            );
        } else {
            trace!(
                url = %request.url(),
                lifetime_ms = lifetime.as_millis() as u64,
                size,
                status = response.status,
                retry_count = state.attempt,
                "HTTP response"
            );
        }
    }
}

/// A 304 answered with the cached body when one exists.
fn not_modified(request: &Request, fresh: Headers, elapsed: Duration) -> Outcome {
    match request.cache_entry() {
        None => Outcome::new(304, fresh, Bytes::new(), elapsed).not_modified(),
        Some(entry) => {
            let mut headers = entry.headers.clone();
            headers.merge(&fresh);
            Outcome::new(304, headers, entry.body.clone(), elapsed).not_modified()
        }
    }
}

/// Diagnostics accumulated across the attempts of one fetch.
#[derive(Debug, Default)]
struct Trace {
    redirect_url: Option<String>,
    markers: Vec<RetryMarker>,
}

impl Trace {
    /// Ask `policy` for another attempt, recording and logging the decision.
    fn retry(
        &mut self,
        policy: &dyn RetryPolicy,
        state: &mut RetryState,
        cause: RetryCause,
        url: &Url,
    ) -> bool {
        let timeout = state.timeout;
        let retried = policy.retry(state, cause);
        let marker = RetryMarker {
            cause,
            attempt: state.attempt,
            timeout,
            gave_up: !retried,
        };

        if retried {
            debug!(%url, %marker, "retrying request");
            let pause = policy.backoff(state);
            if !pause.is_zero() {
                thread::sleep(pause);
            }
        } else {
            warn!(%url, %marker, "giving up on request");
        }

        self.markers.push(marker);
        retried
    }

    fn finish(&mut self, outcome: Outcome) -> Outcome {
        outcome.with_trace(self.redirect_url.take(), std::mem::take(&mut self.markers))
    }
}
