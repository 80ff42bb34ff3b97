//! Configuration for the background-removal service.
//!
//! Every knob lives in one [`ServiceConfig`] value, constructed once at
//! startup and passed by reference into the pipeline. Nothing in the pipeline
//! reads ambient environment state, which keeps request handling testable
//! with injected configuration.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest; [`ServiceConfigBuilder::build`] is the
//! single place required values are enforced.

use crate::error::RemovalError;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the background-removal service.
///
/// Built via [`ServiceConfig::builder()`].
///
/// # Example
/// ```rust
/// use cutout::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .bucket("my-output-bucket")
///     .public_urls(false)
///     .transform_timeout_secs(240)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Listen port for the HTTP server. Default: 8080.
    pub port: u16,

    /// Destination bucket for published results. Required — there is no
    /// sensible default, and a missing bucket must fail at boot rather than
    /// on the first request.
    pub bucket: String,

    /// When true, derive stable public URLs for published objects; when
    /// false, derive time-limited signed read URLs instead. Default: true.
    pub public_urls: bool,

    /// Base URL for public object access. Default:
    /// `https://storage.googleapis.com`.
    pub storage_base_url: String,

    /// Validity window for signed read URLs. Default: 1 hour.
    pub signed_url_ttl: Duration,

    /// Whole-request timeout for the source fetch. Default: 30 s.
    ///
    /// The fetch transport must never wait unbounded: a slow origin would
    /// otherwise pin a request slot indefinitely.
    pub fetch_timeout: Duration,

    /// Minimum plausible byte length for a fetched image. Default: 256.
    ///
    /// Near-empty payloads are almost always error pages disguised as 200
    /// responses; real images, even icons, clear this easily.
    pub min_source_bytes: u64,

    /// `User-Agent` header sent with source fetches. Default:
    /// `cutout/<version>`.
    ///
    /// Some content providers reject unidentified clients outright, so the
    /// fetch always identifies itself.
    pub user_agent: String,

    /// Program invoked as the background-removal transform. Default:
    /// `python3`.
    pub transform_program: String,

    /// Leading arguments for the transform program; the input and output
    /// paths are appended after these. Default: `["bg_remove.py"]`.
    pub transform_args: Vec<String>,

    /// Hard wall-clock budget for one transform invocation, after which the
    /// process is killed. Default: 180 s.
    ///
    /// A hung or pathological input must not block the pipeline forever;
    /// heavyweight matting models can legitimately take a couple of minutes
    /// on large images, so the budget is generous but finite.
    pub transform_timeout: Duration,

    /// Scratch directory for per-request transient artifacts. Default: the
    /// system temp dir.
    ///
    /// Paths under it are identity-derived (not random), so repeated
    /// requests for the same source share names — that is what makes
    /// retried requests naturally deduplicate.
    pub work_dir: PathBuf,

    /// Leading path segment of every destination key. Default: `removebg`.
    pub key_prefix: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bucket: String::new(),
            public_urls: true,
            storage_base_url: "https://storage.googleapis.com".to_string(),
            signed_url_ttl: Duration::from_secs(60 * 60),
            fetch_timeout: Duration::from_secs(30),
            min_source_bytes: 256,
            user_agent: concat!("cutout/", env!("CARGO_PKG_VERSION")).to_string(),
            transform_program: "python3".to_string(),
            transform_args: vec!["bg_remove.py".to_string()],
            transform_timeout: Duration::from_secs(180),
            work_dir: std::env::temp_dir(),
            key_prefix: "removebg".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.bucket = bucket.into();
        self
    }

    pub fn public_urls(mut self, v: bool) -> Self {
        self.config.public_urls = v;
        self
    }

    pub fn storage_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.storage_base_url = url.into();
        self
    }

    pub fn signed_url_ttl_secs(mut self, secs: u64) -> Self {
        self.config.signed_url_ttl = Duration::from_secs(secs.max(1));
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout = Duration::from_secs(secs.max(1));
        self
    }

    pub fn min_source_bytes(mut self, n: u64) -> Self {
        self.config.min_source_bytes = n;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn transform_program(mut self, program: impl Into<String>) -> Self {
        self.config.transform_program = program.into();
        self
    }

    pub fn transform_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.transform_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn transform_timeout_secs(mut self, secs: u64) -> Self {
        self.config.transform_timeout = Duration::from_secs(secs.max(1));
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    /// Build the configuration, validating required values.
    pub fn build(self) -> Result<ServiceConfig, RemovalError> {
        let c = &self.config;
        if c.bucket.trim().is_empty() {
            return Err(RemovalError::MissingConfig {
                name: "BUCKET_OUTPUT",
            });
        }
        if c.storage_base_url.trim().is_empty() {
            return Err(RemovalError::InvalidConfig(
                "storage base URL must not be empty".into(),
            ));
        }
        if c.transform_program.trim().is_empty() {
            return Err(RemovalError::InvalidConfig(
                "transform program must not be empty".into(),
            ));
        }
        if c.key_prefix.trim().is_empty() || c.key_prefix.contains('/') {
            return Err(RemovalError::InvalidConfig(format!(
                "key prefix must be a single path segment, got '{}'",
                c.key_prefix
            )));
        }
        Ok(self.config)
    }
}
