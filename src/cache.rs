//! Remote report cache.
//!
//! One report blob is stored per [`CacheKey`]. The cache is strictly
//! best-effort: every operation may fail with [`CacheError::Unavailable`] and
//! the caller is expected to carry on without it.
//!
//! # Implementations
//!
//! | Type | Backing store |
//! |------|---------------|
//! | [`ObjectStoreCache`] | S3 or an S3-compatible endpoint, or in-memory for tests |
//! | [`OfflineCache`] | nothing; every operation reports `Unavailable` |
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use std::path::Path;
//! use test_retry::cache::{CacheKey, ObjectStoreCache, ReportCache};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cache = ObjectStoreCache::memory();
//! let key = CacheKey::derive("abc123", Path::new("/work/my-app"), "yarn jest");
//!
//! assert!(!cache.exists(&key).await.unwrap());
//! cache.put(&key, Bytes::from_static(b"{}")).await.unwrap();
//! assert_eq!(cache.get(&key).await.unwrap(), Bytes::from_static(b"{}"));
//! # }
//! ```

pub mod credentials;
pub mod remote;

pub use remote::ObjectStoreCache;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;

/// Errors from cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The store could not be reached, refused the request, or could not be
    /// set up.
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// The key was not present when fetched.
    #[error("No cached report for key: {key}")]
    Miss { key: String },

    /// The cache settings are unusable.
    #[error("Invalid cache configuration: {0}")]
    Config(String),
}

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Identifies one cached report.
///
/// Formed as `<content hash>-<cwd basename>-<command>`. Any change to the
/// source fingerprint, the directory name, or the exact command text yields a
/// different key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for a content hash, working directory, and command.
    ///
    /// Only the last component of `cwd` participates. A root or empty path
    /// contributes an empty basename.
    pub fn derive(content_hash: &str, cwd: &Path, command: &str) -> Self {
        let basename = cwd
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self(format!("{}-{}-{}", content_hash, basename, command))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Blob storage for serialized reports.
#[async_trait]
pub trait ReportCache: Send + Sync {
    /// Returns whether a report is stored under `key`.
    ///
    /// A missing object is `Ok(false)`, not an error.
    async fn exists(&self, key: &CacheKey) -> CacheResult<bool>;

    /// Fetches the raw report stored under `key`.
    ///
    /// Returns [`CacheError::Miss`] if the object disappeared since
    /// [`exists`](Self::exists) was called.
    async fn get(&self, key: &CacheKey) -> CacheResult<Bytes>;

    /// Stores `body` under `key`, replacing any previous report.
    async fn put(&self, key: &CacheKey, body: Bytes) -> CacheResult<()>;
}

/// Stand-in used when the real cache could not be constructed.
#[derive(Debug, Clone)]
pub struct OfflineCache {
    reason: String,
}

impl OfflineCache {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ReportCache for OfflineCache {
    async fn exists(&self, _key: &CacheKey) -> CacheResult<bool> {
        Err(CacheError::Unavailable(self.reason.clone()))
    }

    async fn get(&self, _key: &CacheKey) -> CacheResult<Bytes> {
        Err(CacheError::Unavailable(self.reason.clone()))
    }

    async fn put(&self, _key: &CacheKey, _body: Bytes) -> CacheResult<()> {
        Err(CacheError::Unavailable(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let key = CacheKey::derive("d41d8cd9", Path::new("/home/ci/work/my-app"), "yarn jest");
        assert_eq!(key.as_str(), "d41d8cd9-my-app-yarn jest");
        assert_eq!(key.to_string(), "d41d8cd9-my-app-yarn jest");
    }

    #[test]
    fn test_key_uses_only_basename() {
        let a = CacheKey::derive("h", Path::new("/a/project"), "cmd");
        let b = CacheKey::derive("h", Path::new("/b/project"), "cmd");
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_changes_with_each_input() {
        let base = CacheKey::derive("h", Path::new("/w/app"), "jest");
        assert_ne!(base, CacheKey::derive("h2", Path::new("/w/app"), "jest"));
        assert_ne!(base, CacheKey::derive("h", Path::new("/w/app2"), "jest"));
        assert_ne!(base, CacheKey::derive("h", Path::new("/w/app"), "jest --ci"));
    }

    #[test]
    fn test_key_for_root_directory() {
        let key = CacheKey::derive("h", Path::new("/"), "jest");
        assert_eq!(key.as_str(), "h--jest");
    }

    #[tokio::test]
    async fn test_offline_cache_is_unavailable() {
        let cache = OfflineCache::new("no credentials");
        let key = CacheKey::derive("h", Path::new("/w/app"), "jest");

        assert!(matches!(
            cache.exists(&key).await,
            Err(CacheError::Unavailable(reason)) if reason == "no credentials"
        ));
        assert!(matches!(cache.get(&key).await, Err(CacheError::Unavailable(_))));
        assert!(matches!(
            cache.put(&key, Bytes::new()).await,
            Err(CacheError::Unavailable(_))
        ));
    }
}
