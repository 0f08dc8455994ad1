//! Disk-backed [`CacheStore`](fetchkit::CacheStore) for fetchkit.
//!
//! Every key maps to two files named after the SHA-256 of the key: a JSON
//! metadata file and the raw body. Both are written to a temporary file in
//! the same directory and renamed into place.
//!
//! ```
//! use fetchkit::{CacheEntry, CacheStore, Headers};
//! use fetchkit_store::DiskStore;
//!
//! let dir = tempfile::tempdir()?;
//! let store = DiskStore::open(dir.path())?;
//! store.put("https://example.com/", CacheEntry::new("body", Headers::new()))?;
//! assert!(store.get("https://example.com/")?.is_some());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Pass a `DiskStore` to [`Client::new`](fetchkit::Client::new) to persist
//! responses across runs.

mod disk;

pub use disk::{DiskStore, key_digest};
