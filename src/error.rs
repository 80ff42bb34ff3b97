//! Error types for the cutout pipeline.
//!
//! One request maps to exactly one [`RemovalError`] on failure. Each variant
//! belongs to a wire-level *category* (see [`RemovalError::category`]) so the
//! HTTP layer can report a stable machine-readable string without leaking
//! stack traces or scratch-file paths to the caller. Full diagnostic detail
//! (captured subprocess output, response-body prefixes) stays in the variant
//! fields and is only ever logged server-side.

use std::path::PathBuf;
use thiserror::Error;

/// How many bytes of a rejected response body are kept for diagnostics.
///
/// Enough to see an HTML error page's title or a JSON error object; small
/// enough that logs stay bounded no matter what the origin returns.
pub const BODY_PREFIX_LIMIT: usize = 512;

/// All errors returned by the background-removal pipeline.
#[derive(Debug, Error)]
pub enum RemovalError {
    // ── Caller errors ─────────────────────────────────────────────────────
    /// The request carried no source image URL (or a blank one).
    #[error("missing or empty 'image_url' parameter")]
    MissingSource,

    // ── Fetch errors ──────────────────────────────────────────────────────
    /// The source could not be reached at the transport level.
    #[error("failed to reach '{url}': {reason}")]
    FetchTransport { url: String, reason: String },

    /// The source answered with a non-success status.
    #[error("'{url}' returned HTTP {status}")]
    FetchStatus {
        url: String,
        status: u16,
        body_prefix: String,
    },

    /// The source answered 200 but with a non-image content type —
    /// typically an HTML error page served with a success status.
    #[error("'{url}' returned non-image content type '{content_type}'")]
    FetchContentType {
        url: String,
        content_type: String,
        body_prefix: String,
    },

    /// The payload is too small to plausibly be an image.
    #[error("'{url}' returned {len} bytes, below the {min}-byte minimum for a plausible image")]
    FetchTooSmall { url: String, len: u64, min: u64 },

    /// Fetched bytes could not be written to the scratch area.
    #[error("could not write fetched bytes to scratch storage: {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Transform errors ──────────────────────────────────────────────────
    /// The external transform failed to start or exited unsuccessfully.
    /// `detail` carries the captured stdout/stderr; it is logged server-side
    /// (via `Debug`) but kept out of `Display` so tracebacks never reach the
    /// caller.
    #[error("transform failed ({status})")]
    TransformFailed { status: String, detail: String },

    /// The external transform exceeded its wall-clock budget and was killed.
    #[error("transform did not finish within {secs}s and was killed")]
    TransformTimeout { secs: u64 },

    /// The transform reported success but left no usable output artifact.
    /// The exit status alone is not trusted.
    #[error("transform exited successfully but produced no output artifact")]
    TransformOutputMissing { path: PathBuf },

    // ── Publish errors ────────────────────────────────────────────────────
    /// Upload or access-URL derivation against durable storage failed.
    #[error("failed to publish '{key}': {reason}")]
    PublishFailed { key: String, reason: String },

    // ── Configuration errors ──────────────────────────────────────────────
    /// A required configuration value is absent. Detected at boot where
    /// possible so the process fails fast instead of per-request.
    #[error("required configuration missing: {name}")]
    MissingConfig { name: &'static str },

    /// A configuration value failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RemovalError {
    /// Stable wire-level category string for the caller-facing response.
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingSource => "bad_request",
            Self::FetchTransport { .. }
            | Self::FetchStatus { .. }
            | Self::FetchContentType { .. }
            | Self::FetchTooSmall { .. }
            | Self::ArtifactWrite { .. } => "fetch_failed",
            Self::TransformFailed { .. }
            | Self::TransformTimeout { .. }
            | Self::TransformOutputMissing { .. } => "processing_failed",
            Self::PublishFailed { .. } => "publish_failed",
            Self::MissingConfig { .. } | Self::InvalidConfig(_) => "config_error",
        }
    }

    /// HTTP status for the caller-facing response: 400 for caller errors,
    /// 500 for everything that went wrong inside the pipeline.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingSource => 400,
            _ => 500,
        }
    }
}

/// Truncate raw response bytes to a bounded, lossy UTF-8 diagnostic prefix.
pub(crate) fn bounded_prefix(body: &[u8]) -> String {
    let slice = &body[..body.len().min(BODY_PREFIX_LIMIT)];
    String::from_utf8_lossy(slice).into_owned()
}
