//! Production [`Transport`] backed by the blocking `reqwest` client.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::redirect;
use tracing::{debug, warn};

use super::transport::{Transport, TransportRequest, TransportResponse};
use crate::data::{Headers, Method, ResolvedTimeouts};
use crate::error::TransportError;

/// Connect timeout used when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Configures TLS and connection settings for a [`ReqwestTransport`].
///
/// Certificate pinning replaces the platform roots: once any PEM is pinned,
/// only the pinned roots are trusted.
#[derive(Debug, Clone)]
pub struct ReqwestTransportBuilder {
    connect_timeout: Duration,
    trust_all_certs: bool,
    accept_invalid_hostnames: bool,
    pinned_certs: Vec<Vec<u8>>,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            trust_all_certs: false,
            accept_invalid_hostnames: false,
            pinned_certs: Vec::new(),
        }
    }
}

impl ReqwestTransportBuilder {
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Accept any server certificate. Development builds only.
    #[must_use]
    pub fn trust_all_certs(mut self, enabled: bool) -> Self {
        self.trust_all_certs = enabled;
        self
    }

    /// Skip hostname verification. Development builds only.
    #[must_use]
    pub fn accept_invalid_hostnames(mut self, enabled: bool) -> Self {
        self.accept_invalid_hostnames = enabled;
        self
    }

    /// Trust the PEM-encoded root certificate `pem`.
    #[must_use]
    pub fn pin_certificate(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.pinned_certs.push(pem.into());
        self
    }

    pub fn build(self) -> Result<ReqwestTransport, TransportError> {
        let mut builder = Client::builder()
            .redirect(redirect::Policy::none())
            .connect_timeout(self.connect_timeout)
            .danger_accept_invalid_certs(self.trust_all_certs)
            .danger_accept_invalid_hostnames(self.accept_invalid_hostnames);

        if self.trust_all_certs || self.accept_invalid_hostnames {
            warn!(
                trust_all_certs = self.trust_all_certs,
                accept_invalid_hostnames = self.accept_invalid_hostnames,
                "TLS verification is relaxed"
            );
        }

        if !self.pinned_certs.is_empty() {
            builder = builder.tls_built_in_root_certs(false);
            for pem in &self.pinned_certs {
                let cert = reqwest::Certificate::from_pem(pem)
                    .map_err(|e| TransportError::Other(format!("invalid pinned certificate: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            debug!(count = self.pinned_certs.len(), "pinned root certificates");
        }

        let client = builder.build().map_err(map_error)?;
        Ok(ReqwestTransport { client })
    }
}

/// Blocking HTTP transport using `reqwest`.
///
/// Redirects are never followed here so the pipeline can observe 301/302.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with default settings.
    pub fn new() -> Result<Self, TransportError> {
        Self::builder().build()
    }

    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: TransportRequest<'_>) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), request.url.as_str())
            .timeout(exchange_deadline(request.timeouts));

        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body.bytes.clone());
        }

        let response = builder.send().map_err(map_error)?;
        let status = response.status().as_u16();
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_owned(), value.to_owned()))
            })
            .collect();
        let body = response.bytes().map_err(map_error)?;

        Ok(TransportResponse::new(status, headers, body))
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
        Method::Trace => reqwest::Method::TRACE,
        Method::Patch => reqwest::Method::PATCH,
    }
}

fn map_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

/// reqwest has a single per-request deadline covering the whole exchange.
fn exchange_deadline(timeouts: ResolvedTimeouts) -> Duration {
    timeouts
        .connect
        .saturating_add(timeouts.read.max(timeouts.write))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_covers_connect_and_slowest_transfer() {
        let timeouts = ResolvedTimeouts {
            connect: Duration::from_secs(2),
            read: Duration::from_secs(5),
            write: Duration::from_secs(3),
        };
        assert_eq!(exchange_deadline(timeouts), Duration::from_secs(7));
    }

    #[test]
    fn deadline_saturates_instead_of_overflowing() {
        let timeouts = ResolvedTimeouts {
            connect: Duration::MAX,
            read: Duration::MAX,
            write: Duration::from_secs(1),
        };
        assert_eq!(exchange_deadline(timeouts), Duration::MAX);
    }

    #[test]
    fn methods_map_to_wire_names() {
        for method in [
            Method::Get,
            Method::Post,
            Method::Put,
            Method::Delete,
            Method::Head,
            Method::Options,
            Method::Trace,
            Method::Patch,
        ] {
            assert_eq!(to_reqwest_method(method).as_str(), method.as_str());
        }
    }

    #[test]
    fn garbage_pin_is_rejected() {
        let err = ReqwestTransport::builder()
            .pin_certificate("not a certificate")
            .build()
            .unwrap_err();
        assert!(matches!(err, TransportError::Other(msg) if msg.contains("pinned")));
    }
}
