//! Result publication: persist the processed artifact durably and derive the
//! caller-facing access URL.
//!
//! The durable store sits behind the [`ObjectSink`] trait so the pipeline is
//! written against "put bytes under a key, sign a read URL" rather than a
//! concrete vendor client. [`GcsSink`] is the production backend;
//! [`MemorySink`] is the in-process double the tests run against.
//!
//! ## URL derivation is a pure function of configuration
//!
//! Whether a caller gets a stable public URL or a time-limited signed one is
//! decided by service configuration, never by anything in the upload
//! response. Both forms are recomputable at any time from the object key
//! alone, so nothing about them needs to be persisted.

use crate::config::ServiceConfig;
use crate::error::RemovalError;
use async_trait::async_trait;
use object_store::gcp::{GoogleCloudStorage, GoogleCloudStorageBuilder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Published artifacts are always PNGs: the transform contract requires a
/// valid image at the output path, and the output extension pins the format.
const RESULT_CONTENT_TYPE: &str = "image/png";

/// Published objects are immutable (identity-derived keys), so far-future
/// caching is safe.
const RESULT_CACHE_CONTROL: &str = "public, max-age=31536000";

/// Minimal durable-store surface the pipeline needs.
#[async_trait]
pub trait ObjectSink: Send + Sync {
    /// Store `bytes` under `key`, single-shot, with object metadata.
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), RemovalError>;

    /// Derive a time-limited signed read URL for `key`.
    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String, RemovalError>;
}

// ── Production backend ────────────────────────────────────────────────────

/// Google Cloud Storage sink. Credentials come from the environment the way
/// the `object_store` crate resolves them (service-account key file or
/// metadata server).
pub struct GcsSink {
    store: GoogleCloudStorage,
}

impl GcsSink {
    /// Build the GCS client for the configured bucket. Fails at boot, not
    /// per-request, when the bucket or credentials are unusable.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, RemovalError> {
        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(&config.bucket)
            .build()
            .map_err(|e| RemovalError::InvalidConfig(format!("storage client: {e}")))?;
        Ok(Self { store })
    }
}

#[async_trait]
impl ObjectSink for GcsSink {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), RemovalError> {
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        attributes.insert(Attribute::CacheControl, cache_control.to_string().into());

        self.store
            .put_opts(
                &ObjectPath::from(key),
                PutPayload::from(bytes),
                PutOptions {
                    attributes,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| RemovalError::PublishFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String, RemovalError> {
        let url = self
            .store
            .signed_url(http::Method::GET, &ObjectPath::from(key), expires_in)
            .await
            .map_err(|e| RemovalError::PublishFailed {
                key: key.to_string(),
                reason: format!("signing read URL: {e}"),
            })?;
        Ok(url.to_string())
    }
}

// ── In-process test double ────────────────────────────────────────────────

/// What [`MemorySink`] records per object, so tests can assert on metadata
/// as well as content.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub cache_control: String,
}

/// In-memory [`ObjectSink`] used by tests and local experimentation.
#[derive(Default)]
pub struct MemorySink {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectSink for MemorySink {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), RemovalError> {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                cache_control: cache_control.to_string(),
            },
        );
        Ok(())
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String, RemovalError> {
        Ok(format!(
            "memory:///{key}?expires_in={}",
            expires_in.as_secs()
        ))
    }
}

// ── Publisher ─────────────────────────────────────────────────────────────

/// Uploads a local artifact and derives its access URL.
pub struct Publisher {
    sink: Arc<dyn ObjectSink>,
    bucket: String,
    storage_base_url: String,
    public_urls: bool,
    signed_url_ttl: Duration,
}

impl Publisher {
    pub fn new(config: &ServiceConfig, sink: Arc<dyn ObjectSink>) -> Self {
        Self {
            sink,
            bucket: config.bucket.clone(),
            storage_base_url: config.storage_base_url.clone(),
            public_urls: config.public_urls,
            signed_url_ttl: config.signed_url_ttl,
        }
    }

    /// Upload the artifact at `local` under `key` and return
    /// `(access_url, byte_count)`.
    ///
    /// There is no partial-publish state to reconcile: either the object is
    /// durably stored and a URL comes back, or the whole call fails.
    pub async fn publish(&self, local: &Path, key: &str) -> Result<(String, u64), RemovalError> {
        let bytes = tokio::fs::read(local)
            .await
            .map_err(|e| RemovalError::PublishFailed {
                key: key.to_string(),
                reason: format!("reading processed artifact: {e}"),
            })?;
        let len = bytes.len() as u64;

        debug!("uploading {len} bytes to {}/{key}", self.bucket);
        self.sink
            .put(key, bytes, RESULT_CONTENT_TYPE, RESULT_CACHE_CONTROL)
            .await?;

        let url = if self.public_urls {
            self.public_url(key)?
        } else {
            self.sink.signed_url(key, self.signed_url_ttl).await?
        };

        info!("published {}/{key}", self.bucket);
        Ok((url, len))
    }

    /// Stable public URL: `storage_base_url / bucket / key`, with each key
    /// segment percent-encoded.
    fn public_url(&self, key: &str) -> Result<String, RemovalError> {
        let mut url = reqwest::Url::parse(&self.storage_base_url).map_err(|e| {
            RemovalError::PublishFailed {
                key: key.to_string(),
                reason: format!("storage base URL: {e}"),
            }
        })?;
        {
            let mut segments =
                url.path_segments_mut()
                    .map_err(|_| RemovalError::PublishFailed {
                        key: key.to_string(),
                        reason: "storage base URL cannot be a base".to_string(),
                    })?;
            segments.push(&self.bucket);
            segments.extend(key.split('/'));
        }
        Ok(url.to_string())
    }
}
