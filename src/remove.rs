//! The per-request orchestrator: one entry point that sequences fetch,
//! transform, and publish, and guarantees scratch cleanup on every exit
//! path.
//!
//! ## Why no retries in here?
//!
//! Each stage runs exactly once per request. The pipeline fails fast and
//! lets the caller decide whether to retry the whole operation — which is
//! safe, because identity-derived naming means a retried request recomputes
//! the same destination key and overwrites the same object instead of
//! accumulating duplicates.

use crate::config::ServiceConfig;
use crate::error::RemovalError;
use crate::output::{RemovalOutput, RemovalStats};
use crate::pipeline::fetch::Fetcher;
use crate::pipeline::publish::{ObjectSink, Publisher};
use crate::pipeline::transform::{self, CommandTransformer, Transformer};
use crate::pipeline::workspace::{self, Workspace};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The request-scoped background-removal pipeline.
///
/// Constructed once at startup and shared across requests; it holds no
/// per-request state, so concurrent requests only meet each other in the
/// scratch directory namespace and the durable store.
pub struct Pipeline {
    config: ServiceConfig,
    fetcher: Fetcher,
    transformer: Arc<dyn Transformer>,
    publisher: Publisher,
}

impl Pipeline {
    /// Assemble the pipeline from configuration and a durable-storage sink.
    ///
    /// The transform defaults to the configured subprocess; tests and
    /// embedders can swap it with [`Pipeline::with_transformer`].
    pub fn new(config: ServiceConfig, sink: Arc<dyn ObjectSink>) -> Result<Self, RemovalError> {
        let fetcher = Fetcher::new(&config)?;
        let transformer: Arc<dyn Transformer> =
            Arc::new(CommandTransformer::from_config(&config));
        let publisher = Publisher::new(&config, sink);
        Ok(Self {
            config,
            fetcher,
            transformer,
            publisher,
        })
    }

    /// Replace the transform implementation.
    pub fn with_transformer(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.transformer = transformer;
        self
    }

    /// Destination key for a request identity: a date partition keeps the
    /// bucket listable, the identity makes retries land on the same object.
    fn destination_key(&self, id: &str) -> String {
        format!(
            "{}/{}/{id}.png",
            self.config.key_prefix,
            Utc::now().format("%Y-%m-%d")
        )
    }

    /// Process one request end to end.
    ///
    /// A blank source reference fails immediately with no side effects — no
    /// scratch file is created and no network call is made. Every other
    /// outcome, success or failure, runs workspace cleanup before returning.
    pub async fn run(&self, source_url: &str) -> Result<RemovalOutput, RemovalError> {
        let total_start = Instant::now();

        let source_url = source_url.trim();
        if source_url.is_empty() {
            return Err(RemovalError::MissingSource);
        }

        let id = workspace::request_id(source_url);
        info!("request {id}: removing background for {source_url}");

        let ws = Workspace::for_request(&self.config.work_dir, &id);
        let result = self.run_stages(source_url, &id, &ws, total_start).await;

        // Cleanup runs whether the stages succeeded or not, and its own
        // failures never reach the caller.
        ws.cleanup().await;

        match &result {
            Ok(output) => info!(
                "request {id}: completed in {}ms → {}",
                output.stats.total_ms, output.key
            ),
            Err(e) => warn!("request {id}: failed ({}): {e}", e.category()),
        }
        result
    }

    async fn run_stages(
        &self,
        source_url: &str,
        id: &str,
        ws: &Workspace,
        total_start: Instant,
    ) -> Result<RemovalOutput, RemovalError> {
        // ── Stage 1: Fetch ───────────────────────────────────────────────
        debug!("request {id}: fetching");
        tokio::fs::create_dir_all(&self.config.work_dir)
            .await
            .map_err(|e| RemovalError::ArtifactWrite {
                path: self.config.work_dir.clone(),
                source: e,
            })?;
        let fetch_start = Instant::now();
        let source_bytes = self.fetcher.fetch_to(source_url, &ws.input_path).await?;
        let fetch_ms = fetch_start.elapsed().as_millis() as u64;

        // ── Stage 2: Transform ───────────────────────────────────────────
        debug!("request {id}: processing");
        let transform_start = Instant::now();
        transform::invoke(&*self.transformer, &ws.input_path, &ws.output_path).await?;
        let transform_ms = transform_start.elapsed().as_millis() as u64;

        // ── Stage 3: Publish ─────────────────────────────────────────────
        debug!("request {id}: publishing");
        let key = self.destination_key(id);
        let publish_start = Instant::now();
        let (image_url, result_bytes) = self.publisher.publish(&ws.output_path, &key).await?;
        let publish_ms = publish_start.elapsed().as_millis() as u64;

        Ok(RemovalOutput {
            image_url,
            key,
            stats: RemovalStats {
                fetch_ms,
                transform_ms,
                publish_ms,
                total_ms: total_start.elapsed().as_millis() as u64,
                source_bytes,
                result_bytes,
            },
        })
    }
}
