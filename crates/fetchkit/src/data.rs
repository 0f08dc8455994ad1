//! Data layer: requests, outcomes, headers and cache entries.
//!
//! Values here carry no behaviour beyond construction, lookup and small
//! derived properties. Everything that talks to the network lives in
//! [`effects`](crate::effects).

mod cache_entry;
mod headers;
mod method;
mod outcome;
mod request;

pub use cache_entry::{CacheControl, CacheEntry};
pub use headers::Headers;
pub use method::Method;
pub use outcome::Outcome;
pub use request::{Body, CancelHandle, Request, ResolvedTimeouts, Timeouts};
