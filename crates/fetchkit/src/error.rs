//! Error types for fetchkit.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::body::BodyMode;
use crate::data::{Method, Outcome};

/// Terminal failure of one logical fetch.
///
/// Variants that were produced from a received response carry the last
/// [`Outcome`] so callers can still inspect status, headers and body.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request was cancelled before dispatch")]
    Cancelled,

    #[error("no connection: {0}")]
    NoConnection(#[source] TransportError),

    #[error("network error: status {status} returned without a body")]
    Network { status: u16 },

    #[error("timed out after {attempts} attempt(s) (last timeout {timeout:?})")]
    Timeout { attempts: u32, timeout: Duration },

    #[error("authentication failed with status {}", .0.status())]
    Auth(Box<Outcome>),

    #[error("redirected to {} and retries are exhausted", .location.as_deref().unwrap_or("<unknown>"))]
    Redirect {
        location: Option<String>,
        outcome: Box<Outcome>,
    },

    #[error("unexpected response status {}", .0.status())]
    Server(Box<Outcome>),

    #[error("failed to interpret response body: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    Build(#[from] BuildError),
}

impl FetchError {
    /// The last outcome received before the failure, if any.
    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            Self::Auth(outcome) | Self::Server(outcome) => Some(outcome),
            Self::Redirect { outcome, .. } => Some(outcome),
            _ => None,
        }
    }

    /// `true` for failures where no usable response was obtained.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::NoConnection(_) | Self::Network { .. })
    }
}

/// Problems detected while assembling a [`Request`](crate::Request).
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("body already started in {current} mode, cannot write {attempted} data")]
    MixedBodyModes {
        current: BodyMode,
        attempted: BodyMode,
    },

    #[error("unknown charset '{0}'")]
    UnsupportedCharset(String),

    #[error("{method} requests cannot carry a body")]
    BodyNotAllowed { method: Method },

    #[error("invalid header name '{0}'")]
    InvalidHeader(String),

    #[error("invalid value for header '{name}'")]
    InvalidHeaderValue { name: String },

    #[error("failed to read body content: {0}")]
    Io(#[from] io::Error),

    #[error("failed to serialize JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of a single exchange inside a [`Transport`](crate::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("socket timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("URL blocked by rewriter: {url}")]
    Blocked { url: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Io(e) => e.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

/// Failure reported by a [`CacheStore`](crate::CacheStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("cache entry could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache lock poisoned")]
    Poisoned,
}

/// Failure loading a [`ClientConfig`](crate::ClientConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] Box<figment::Error>),

    #[error("failed to read pinned certificate '{path}': {source}")]
    Certificate {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Figment(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
