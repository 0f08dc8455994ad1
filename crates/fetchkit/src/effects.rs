//! Effects layer: everything that performs I/O.
//!
//! [`Transport`] is the seam to the network. [`FetchPipeline`] drives one
//! request over it and [`Client`] adds a [`CacheStore`](crate::CacheStore).

mod client;
#[cfg(feature = "reqwest")]
mod http;
mod pipeline;
mod transport;

pub use client::Client;
#[cfg(feature = "reqwest")]
pub use http::{DEFAULT_CONNECT_TIMEOUT, ReqwestTransport, ReqwestTransportBuilder};
pub use pipeline::{FetchPipeline, SLOW_REQUEST_THRESHOLD};
pub use transport::{Rewrite, Transport, TransportRequest, TransportResponse, UrlRewriter};
