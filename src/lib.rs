//! # cutout
//!
//! Background-removal as a service: fetch a source image by URL, run an
//! external matting transform over it, and publish the result to durable
//! object storage under a deterministic key.
//!
//! ## Why a pipeline crate?
//!
//! The interesting contracts live between the HTTP handler and the storage
//! client: validating that a URL really is an image before spending minutes
//! of model time on it, keeping a hung transform from pinning a request
//! forever, refusing to trust an exit status that left no output behind, and
//! guaranteeing that scratch files disappear no matter how a request ends.
//! The matting model itself is deliberately a black box — any program that
//! takes an input path and leaves an image at an output path will do.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image_url
//!  │
//!  ├─ 1. Identity   hash the URL → 16-hex request id (names everything)
//!  ├─ 2. Fetch      download with validation (status, content type, size)
//!  ├─ 3. Transform  spawn the matting process, hard timeout, verify output
//!  ├─ 4. Publish    upload to the bucket, derive public or signed URL
//!  └─ 5. Cleanup    delete scratch artifacts — success or failure alike
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cutout::{GcsSink, Pipeline, ServiceConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder()
//!         .bucket("my-output-bucket")
//!         .build()?;
//!     let sink = Arc::new(GcsSink::from_config(&config)?);
//!     let pipeline = Pipeline::new(config, sink)?;
//!
//!     let output = pipeline.run("https://example.com/photo.jpg").await?;
//!     println!("{}", output.image_url);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | Enables the axum router and the `cutoutd` binary (axum + clap + anyhow + tracing-subscriber) |
//!
//! Disable `server` when embedding only the pipeline:
//! ```toml
//! cutout = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod remove;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::RemovalError;
pub use output::{RemovalOutput, RemovalStats};
pub use pipeline::publish::{GcsSink, MemorySink, ObjectSink, Publisher, StoredObject};
pub use pipeline::transform::{CommandTransformer, Transformer};
pub use pipeline::workspace::request_id;
pub use remove::Pipeline;
