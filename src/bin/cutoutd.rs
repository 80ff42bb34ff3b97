//! Server binary for cutout.
//!
//! A thin shim over the library crate: maps flags and environment variables
//! to a `ServiceConfig`, builds the storage sink (failing fast on bad
//! configuration), and serves the router.

use anyhow::{Context, Result};
use clap::Parser;
use cutout::{GcsSink, Pipeline, ServiceConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "cutoutd",
    version,
    about = "Background-removal service: fetch, transform, publish"
)]
struct Args {
    /// Listen port.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Destination bucket for published results (required).
    #[arg(long, env = "BUCKET_OUTPUT")]
    bucket: Option<String>,

    /// Serve stable public URLs (true) or time-limited signed URLs (false).
    #[arg(long, env = "OUTPUT_PUBLIC", action = clap::ArgAction::Set, default_value_t = true)]
    output_public: bool,

    /// Base URL for public object access.
    #[arg(long, env = "CUTOUT_STORAGE_BASE_URL", default_value = "https://storage.googleapis.com")]
    storage_base_url: String,

    /// Scratch directory for per-request transient artifacts.
    #[arg(long, env = "CUTOUT_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Program invoked as the background-removal transform.
    #[arg(long, env = "CUTOUT_TRANSFORM_PROGRAM", default_value = "python3")]
    transform_program: String,

    /// Leading transform arguments (comma-separated in the environment);
    /// the input and output paths are appended after these.
    #[arg(
        long,
        env = "CUTOUT_TRANSFORM_ARGS",
        value_delimiter = ',',
        default_value = "bg_remove.py"
    )]
    transform_args: Vec<String>,

    /// Hard wall-clock budget for one transform invocation, in seconds.
    #[arg(long, env = "CUTOUT_TRANSFORM_TIMEOUT_SECS", default_value_t = 180)]
    transform_timeout_secs: u64,

    /// Whole-request timeout for the source fetch, in seconds.
    #[arg(long, env = "CUTOUT_FETCH_TIMEOUT_SECS", default_value_t = 30)]
    fetch_timeout_secs: u64,

    /// Validity window for signed read URLs, in seconds.
    #[arg(long, env = "CUTOUT_SIGNED_URL_TTL_SECS", default_value_t = 3600)]
    signed_url_ttl_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut builder = ServiceConfig::builder()
        .port(args.port)
        .bucket(args.bucket.unwrap_or_default())
        .public_urls(args.output_public)
        .storage_base_url(args.storage_base_url)
        .transform_program(args.transform_program)
        .transform_args(args.transform_args)
        .transform_timeout_secs(args.transform_timeout_secs)
        .fetch_timeout_secs(args.fetch_timeout_secs)
        .signed_url_ttl_secs(args.signed_url_ttl_secs);
    if let Some(dir) = args.work_dir {
        builder = builder.work_dir(dir);
    }
    let config = builder.build().context("configuration rejected")?;

    let sink = Arc::new(GcsSink::from_config(&config).context("building storage client")?);
    let pipeline = Arc::new(Pipeline::new(config.clone(), sink)?);
    let app = cutout::server::router(pipeline);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("cutoutd listening on {addr}");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
