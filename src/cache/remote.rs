//! Report cache backed by `object_store`.
//!
//! Production runs talk to S3 (or an S3-compatible server behind a custom
//! endpoint, addressed path-style). Tests use the in-memory store.
//!
//! Each key maps to a single object. The key becomes one path segment, so
//! characters such as `/` in the user's command are percent-encoded instead
//! of creating nested directories.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as StorePath;
use object_store::{
    Attribute, AttributeValue, Attributes, ClientOptions, GetOptions, ObjectStore, PutOptions,
    PutPayload, RetryConfig,
};

use super::credentials;
use super::{CacheError, CacheKey, CacheResult, ReportCache};
use crate::config::{CacheConfig, Environment};

/// User metadata key carrying the RFC 3339 expiry time of a report.
pub const EXPIRES_METADATA_KEY: &str = "expires";

/// Report cache on top of any [`ObjectStore`].
#[derive(Debug)]
pub struct ObjectStoreCache {
    inner: Arc<dyn ObjectStore>,
    prefix: Option<StorePath>,
    expiry: chrono::Duration,
}

impl ObjectStoreCache {
    /// Builds an S3 client for `bucket` from the cache settings and resolved
    /// credentials.
    ///
    /// `bucket` is the one carried by [`RetryOptions`](crate::config::RetryOptions);
    /// `config.bucket` only seeds that value and is not read here.
    ///
    /// No request is made here. An unreachable store shows up as
    /// [`CacheError::Unavailable`] on the first operation.
    pub fn from_config(
        bucket: &str,
        config: &CacheConfig,
        env: &Environment,
    ) -> CacheResult<Self> {
        if bucket.trim().is_empty() {
            return Err(CacheError::Config("bucket name is empty".to_string()));
        }

        let client_options = ClientOptions::new().with_timeout(config.timeout());
        let retry = RetryConfig {
            max_retries: config.max_retries,
            retry_timeout: config.timeout(),
            ..Default::default()
        };

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(&config.region)
            .with_client_options(client_options)
            .with_allow_http(config.allow_http)
            .with_retry(retry);

        if let Some(endpoint) = &env.endpoint {
            tracing::debug!("Using custom store endpoint {}", endpoint);
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(false);
        }

        if let Some(creds) = credentials::resolve(config, env)? {
            builder = builder
                .with_access_key_id(creds.access_key_id)
                .with_secret_access_key(creds.secret_access_key);
            if let Some(token) = creds.session_token {
                builder = builder.with_token(token);
            }
        }

        let store = builder
            .build()
            .map_err(|e| CacheError::Unavailable(format!("failed to create S3 client: {}", e)))?;

        Ok(Self::with_store(Arc::new(store), config))
    }

    /// Wraps an existing store, taking prefix and expiry from `config`.
    pub fn with_store(inner: Arc<dyn ObjectStore>, config: &CacheConfig) -> Self {
        let prefix = config.prefix.trim_matches('/');
        Self {
            inner,
            prefix: (!prefix.is_empty()).then(|| StorePath::from(prefix)),
            expiry: chrono::Duration::days(i64::from(config.expiry_days)),
        }
    }

    /// Creates an in-memory cache with default settings.
    pub fn memory() -> Self {
        Self::with_store(
            Arc::new(object_store::memory::InMemory::new()),
            &CacheConfig::default(),
        )
    }

    /// Returns the object path for `key`.
    pub fn location(&self, key: &CacheKey) -> StorePath {
        match &self.prefix {
            Some(prefix) => prefix.clone().join(key.as_str()),
            None => StorePath::from_iter([key.as_str()]),
        }
    }

    fn put_options(&self) -> PutOptions {
        let expires = chrono::Utc::now() + self.expiry;
        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::Metadata(EXPIRES_METADATA_KEY.into()),
            AttributeValue::from(expires.to_rfc3339()),
        );
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from("application/json"),
        );
        PutOptions {
            attributes,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ReportCache for ObjectStoreCache {
    async fn exists(&self, key: &CacheKey) -> CacheResult<bool> {
        let location = self.location(key);
        let options = GetOptions {
            head: true,
            ..Default::default()
        };

        match self.inner.get_opts(&location, options).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(CacheError::Unavailable(format!(
                "failed to check report existence: {}",
                e
            ))),
        }
    }

    async fn get(&self, key: &CacheKey) -> CacheResult<Bytes> {
        let location = self.location(key);

        let result = self
            .inner
            .get_opts(&location, GetOptions::default())
            .await
            .map_err(|e| match e {
                object_store::Error::NotFound { .. } => CacheError::Miss {
                    key: key.to_string(),
                },
                _ => CacheError::Unavailable(format!("failed to get report: {}", e)),
            })?;

        result
            .bytes()
            .await
            .map_err(|e| CacheError::Unavailable(format!("failed to read report bytes: {}", e)))
    }

    async fn put(&self, key: &CacheKey, body: Bytes) -> CacheResult<()> {
        let location = self.location(key);

        self.inner
            .put_opts(&location, PutPayload::from_bytes(body), self.put_options())
            .await
            .map_err(|e| CacheError::Unavailable(format!("failed to put report: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn key(command: &str) -> CacheKey {
        CacheKey::derive("abc123", Path::new("/work/app"), command)
    }

    #[tokio::test]
    async fn test_memory_roundtrip() {
        let cache = ObjectStoreCache::memory();
        let key = key("yarn jest");
        let body = Bytes::from(r#"{"passed":true,"filesResult":[]}"#);

        cache.put(&key, body.clone()).await.unwrap();

        assert!(cache.exists(&key).await.unwrap());
        assert_eq!(cache.get(&key).await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_exists_false_for_missing_key() {
        let cache = ObjectStoreCache::memory();
        assert!(!cache.exists(&key("yarn jest")).await.unwrap());
    }

    #[tokio::test]
    async fn test_get_missing_is_miss() {
        let cache = ObjectStoreCache::memory();
        let result = cache.get(&key("yarn jest")).await;
        assert!(matches!(result, Err(CacheError::Miss { key }) if key == "abc123-app-yarn jest"));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = ObjectStoreCache::memory();
        let key = key("yarn jest");

        cache.put(&key, Bytes::from("first")).await.unwrap();
        cache.put(&key, Bytes::from("second")).await.unwrap();

        assert_eq!(cache.get(&key).await.unwrap(), Bytes::from("second"));
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let cache = ObjectStoreCache::memory();
        cache.put(&key("jest a"), Bytes::from("a")).await.unwrap();

        assert!(!cache.exists(&key("jest b")).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_sets_expiry_metadata() {
        let store = Arc::new(object_store::memory::InMemory::new());
        let config = CacheConfig {
            expiry_days: 10,
            ..Default::default()
        };
        let cache = ObjectStoreCache::with_store(store.clone(), &config);
        let key = key("yarn jest");

        cache.put(&key, Bytes::from("{}")).await.unwrap();

        let result = store
            .get_opts(&cache.location(&key), GetOptions::default())
            .await
            .unwrap();
        let value = result
            .attributes
            .get(&Attribute::Metadata(EXPIRES_METADATA_KEY.into()))
            .unwrap();
        let value: &str = value.as_ref();
        let expires = chrono::DateTime::parse_from_rfc3339(value).unwrap();

        let remaining = expires.with_timezone(&chrono::Utc) - chrono::Utc::now();
        assert!(remaining > chrono::Duration::days(9));
        assert!(remaining <= chrono::Duration::days(10));
    }

    #[test]
    fn test_command_slashes_stay_in_one_segment() {
        let cache = ObjectStoreCache::memory();
        let location = cache.location(&key("node_modules/.bin/jest"));
        assert_eq!(location.parts().count(), 1);
    }

    #[test]
    fn test_prefix_nests_keys() {
        let config = CacheConfig {
            prefix: "/team-a/reports/".to_string(),
            ..Default::default()
        };
        let cache =
            ObjectStoreCache::with_store(Arc::new(object_store::memory::InMemory::new()), &config);
        let location = cache.location(&key("jest"));

        assert!(location.as_ref().starts_with("team-a/reports/"));
        assert_eq!(location.parts().count(), 3);
    }

    #[test]
    fn test_empty_bucket_is_config_error() {
        let result =
            ObjectStoreCache::from_config("", &CacheConfig::default(), &Environment::default());
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_bucket_argument_overrides_config_bucket() {
        let config = CacheConfig {
            bucket: String::new(),
            ..Default::default()
        };
        let env = Environment {
            access_key_id: Some("AKIATEST".to_string()),
            secret_access_key: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(ObjectStoreCache::from_config("team-reports", &config, &env).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        let config = CacheConfig {
            max_retries: 0,
            timeout_secs: 5,
            ..Default::default()
        };
        let env = Environment {
            endpoint: Some("http://127.0.0.1:1".to_string()),
            access_key_id: Some("AKIATEST".to_string()),
            secret_access_key: Some("secret".to_string()),
            ..Default::default()
        };
        let cache = ObjectStoreCache::from_config(&config.bucket, &config, &env).unwrap();
        let key = key("yarn jest");

        assert!(matches!(
            cache.exists(&key).await,
            Err(CacheError::Unavailable(_))
        ));
        assert!(matches!(
            cache.get(&key).await,
            Err(CacheError::Unavailable(_))
        ));
        assert!(matches!(
            cache.put(&key, Bytes::from("{}")).await,
            Err(CacheError::Unavailable(_))
        ));
    }
}
