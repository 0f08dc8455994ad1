use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use fetchkit::{CacheEntry, CacheStore, Headers, StoreError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const META_EXT: &str = "json";
const BODY_EXT: &str = "body";

/// Hex SHA-256 of a cache key; the file stem used for it on disk.
///
/// ```
/// assert_eq!(
///     fetchkit_store::key_digest("abc"),
///     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
/// );
/// ```
pub fn key_digest(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Everything in a [`CacheEntry`] except the body.
#[derive(Debug, Serialize, Deserialize)]
struct Meta {
    key: String,
    body_len: u64,
    headers: Headers,
    etag: Option<String>,
    last_modified: Option<DateTime<Utc>>,
    server_date: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    stored_at: DateTime<Utc>,
}

/// [`CacheStore`] keeping one metadata file and one body file per key.
///
/// Reads and writes within one process are serialised per store so a reader
/// never pairs metadata with a body from a different write. Separate
/// processes sharing a directory are not coordinated.
#[derive(Debug)]
pub struct DiskStore {
    root: PathBuf,
    lock: RwLock<()>,
}

impl DiskStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened disk cache store");
        Ok(Self {
            root,
            lock: RwLock::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.write().map_err(|_| StoreError::Poisoned)?;
        for dirent in fs::read_dir(&self.root)? {
            let path = dirent?.path();
            if is_store_file(&path) {
                remove_if_exists(&path)?;
            }
        }
        Ok(())
    }

    /// Number of entries with a metadata file.
    pub fn len(&self) -> Result<usize, StoreError> {
        let _guard = self.lock.read().map_err(|_| StoreError::Poisoned)?;
        let mut count = 0;
        for dirent in fs::read_dir(&self.root)? {
            let path = dirent?.path();
            if is_store_file(&path) && path.extension().is_some_and(|ext| ext == META_EXT) {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn paths(&self, key: &str) -> (PathBuf, PathBuf) {
        let stem = key_digest(key);
        (
            self.root.join(format!("{stem}.{META_EXT}")),
            self.root.join(format!("{stem}.{BODY_EXT}")),
        )
    }

    /// Write `bytes` to `path` via a temporary file in the same directory.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl CacheStore for DiskStore {
    fn get(&self, key: &str) -> Result<Option<Arc<CacheEntry>>, StoreError> {
        let _guard = self.lock.read().map_err(|_| StoreError::Poisoned)?;
        let (meta_path, body_path) = self.paths(key);

        let Some(meta) = read_optional(&meta_path)? else {
            return Ok(None);
        };
        let meta: Meta = serde_json::from_slice(&meta)?;
        if meta.key != key {
            warn!(key, stored = %meta.key, "cache digest collision, ignoring entry");
            return Ok(None);
        }

        let Some(body) = read_optional(&body_path)? else {
            debug!(key, "cache body missing, treating as miss");
            return Ok(None);
        };
        if body.len() as u64 != meta.body_len {
            warn!(key, expected = meta.body_len, actual = body.len(), "truncated cache body");
            return Ok(None);
        }

        Ok(Some(Arc::new(CacheEntry {
            body: Bytes::from(body),
            headers: meta.headers,
            etag: meta.etag,
            last_modified: meta.last_modified,
            server_date: meta.server_date,
            expires_at: meta.expires_at,
            stored_at: meta.stored_at,
        })))
    }

    fn put(&self, key: &str, entry: CacheEntry) -> Result<(), StoreError> {
        let (meta_path, body_path) = self.paths(key);
        let meta = Meta {
            key: key.to_owned(),
            body_len: entry.body.len() as u64,
            headers: entry.headers,
            etag: entry.etag,
            last_modified: entry.last_modified,
            server_date: entry.server_date,
            expires_at: entry.expires_at,
            stored_at: entry.stored_at,
        };
        let meta = serde_json::to_vec_pretty(&meta)?;

        let _guard = self.lock.write().map_err(|_| StoreError::Poisoned)?;
        self.write_atomic(&body_path, &entry.body)?;
        self.write_atomic(&meta_path, &meta)?;
        debug!(key, bytes = entry.body.len(), "stored cache entry");
        Ok(())
    }

    fn evict(&self, key: &str) -> Result<(), StoreError> {
        let (meta_path, body_path) = self.paths(key);
        let _guard = self.lock.write().map_err(|_| StoreError::Poisoned)?;
        remove_if_exists(&meta_path)?;
        remove_if_exists(&body_path)?;
        debug!(key, "evicted cache entry");
        Ok(())
    }
}

fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// `<sha256 hex>.json` or `<sha256 hex>.body`; anything else in the
/// directory belongs to someone else.
fn is_store_file(path: &Path) -> bool {
    let is_digest = path.file_stem().and_then(|stem| stem.to_str()).is_some_and(|stem| {
        stem.len() == 64 && stem.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    });
    is_digest
        && path
            .extension()
            .is_some_and(|ext| ext == META_EXT || ext == BODY_EXT)
}
