//! Source acquisition: retrieve the remote image and validate it before any
//! further work is spent on it.
//!
//! ## Why validate here instead of letting the transform fail?
//!
//! A hosting provider that serves an HTML error page with a 200 status would
//! otherwise ride all the way into the external transform, burn minutes of
//! wall clock, and come back with an opaque failure. Checking transport
//! status, declared content type, and a minimum plausible size up front turns
//! that into an immediate, well-labelled `fetch_failed`.
//!
//! This layer makes exactly one attempt. Retrying belongs to the caller,
//! where it is safe: identity-derived naming makes a repeated request
//! overwrite rather than duplicate.

use crate::config::ServiceConfig;
use crate::error::{bounded_prefix, RemovalError};
use std::path::Path;
use tracing::{debug, info};

/// Media-type prefix a source must declare to be accepted.
const IMAGE_MIME_PREFIX: &str = "image/";

/// HTTP client wrapper for source-image retrieval.
pub struct Fetcher {
    client: reqwest::Client,
    min_bytes: u64,
}

impl Fetcher {
    /// Build the fetch client from service configuration.
    ///
    /// The client follows redirects (bounded), enforces the configured
    /// whole-request timeout, and always identifies itself — several image
    /// CDNs reject clients with no `User-Agent` at all.
    pub fn new(config: &ServiceConfig) -> Result<Self, RemovalError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.fetch_timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| RemovalError::InvalidConfig(format!("fetch client: {e}")))?;

        Ok(Self {
            client,
            min_bytes: config.min_source_bytes,
        })
    }

    /// Fetch `url` and write the validated bytes to `dest`.
    ///
    /// Validation order: transport success, then declared content type, then
    /// minimum plausible size. Returns the byte count written. The bytes are
    /// not retained in memory beyond the write.
    pub async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, RemovalError> {
        debug!("fetching source image from {url}");

        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|e| RemovalError::FetchTransport {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response
            .bytes()
            .await
            .map_err(|e| RemovalError::FetchTransport {
                url: url.to_string(),
                reason: format!("reading body: {e}"),
            })?;

        if !status.is_success() {
            return Err(RemovalError::FetchStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body_prefix: bounded_prefix(&body),
            });
        }

        if !content_type
            .to_ascii_lowercase()
            .starts_with(IMAGE_MIME_PREFIX)
        {
            return Err(RemovalError::FetchContentType {
                url: url.to_string(),
                content_type,
                body_prefix: bounded_prefix(&body),
            });
        }

        if (body.len() as u64) < self.min_bytes {
            return Err(RemovalError::FetchTooSmall {
                url: url.to_string(),
                len: body.len() as u64,
                min: self.min_bytes,
            });
        }

        tokio::fs::write(dest, &body)
            .await
            .map_err(|e| RemovalError::ArtifactWrite {
                path: dest.to_path_buf(),
                source: e,
            })?;

        info!(
            "fetched {} bytes ({content_type}) from {url}",
            body.len()
        );
        Ok(body.len() as u64)
    }
}
