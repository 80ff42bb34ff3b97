//! Result types returned by a successful pipeline run.

use serde::{Deserialize, Serialize};

/// The outcome of one successful background-removal request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalOutput {
    /// Caller-facing URL of the published result — public or signed
    /// depending on service configuration.
    pub image_url: String,

    /// Destination key of the durable object, e.g.
    /// `removebg/2024-01-01/9f86d081884c7d65.png`. Deterministic for a given
    /// source URL and date, which is what makes retries overwrite instead of
    /// accumulate.
    pub key: String,

    /// Per-stage timings and byte counts.
    pub stats: RemovalStats,
}

/// Wall-clock and size accounting for one request.
///
/// Stage timings are measured around each stage call, so they exclude the
/// orchestrator's own bookkeeping; `total_ms` is measured around the whole
/// request and is what the wire response reports as `ms`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemovalStats {
    /// Time spent fetching and validating the source image.
    pub fetch_ms: u64,
    /// Time spent inside the external transform (including its startup).
    pub transform_ms: u64,
    /// Time spent uploading and deriving the access URL.
    pub publish_ms: u64,
    /// End-to-end request time.
    pub total_ms: u64,
    /// Size of the fetched source image.
    pub source_bytes: u64,
    /// Size of the published result.
    pub result_bytes: u64,
}
