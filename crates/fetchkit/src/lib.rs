//! Retrying HTTP fetch pipeline with a pluggable transport and cache
//! validation.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Requests, outcomes, headers and cache entries
//! - [`core`] - Pure rules: retry decisions, status classes, HTTP dates
//! - [`effects`] - I/O behind the [`Transport`] trait
//!
//! Request bodies are assembled in [`body`]; caching goes through a
//! [`CacheStore`].
//!
//! # Example
//!
//! ```no_run
//! use fetchkit::{Client, ClientConfig, MemoryStore, Request};
//!
//! let config = ClientConfig::load("fetchkit.toml")?;
//! let transport = config.transport_builder()?.build()?;
//! let client = Client::from_config(transport, MemoryStore::new(), &config);
//!
//! let request = Request::post("https://example.com/upload")
//!     .bearer_auth("token")
//!     .text_part("title", "report")
//!     .build()?;
//! let outcome = client.execute(request)?;
//! println!("{}", outcome.text());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod body;
pub mod config;
pub mod core;
pub mod data;
pub mod effects;
mod error;
pub mod store;

pub use body::{BodyMode, Part, RequestBuilder};
pub use config::ClientConfig;
pub use data::{
    Body, CacheControl, CacheEntry, CancelHandle, Headers, Method, Outcome, Request,
    ResolvedTimeouts, Timeouts,
};
pub use effects::{
    Client, FetchPipeline, Rewrite, Transport, TransportRequest, TransportResponse, UrlRewriter,
};
#[cfg(feature = "reqwest")]
pub use effects::{ReqwestTransport, ReqwestTransportBuilder};
pub use error::{BuildError, ConfigError, FetchError, Result, StoreError, TransportError};
pub use store::{CacheStore, MemoryStore};
pub use crate::core::{DefaultRetryPolicy, RetryCause, RetryMarker, RetryPolicy, RetryState};
