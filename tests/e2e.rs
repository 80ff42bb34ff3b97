//! End-to-end tests for the cutout pipeline and its HTTP surface.
//!
//! No external network and no real matting model: source images are served
//! by an in-process origin server on an ephemeral port, durable storage is
//! the in-memory sink, and the transform is a shell command — `cp` for a
//! successful transform, `sh -c true` for one that lies about success, and
//! `sh -c "sleep …"` for one that hangs.

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use cutout::{
    request_id, CommandTransformer, MemorySink, Pipeline, RemovalError, ServiceConfig, Transformer,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Serve fixed bytes at `/photo.jpg` on an ephemeral local port and return
/// the full source URL.
async fn serve_fixture(status: StatusCode, content_type: &'static str, body: Vec<u8>) -> String {
    let app = Router::new().route(
        "/photo.jpg",
        get(move || {
            let body = body.clone();
            async move { (status, [(header::CONTENT_TYPE, content_type)], body).into_response() }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/photo.jpg")
}

/// A plausible JPEG payload: magic bytes plus padding (content is opaque to
/// the pipeline; only size and declared content type are validated).
fn jpeg_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len.max(4)];
    bytes[..4].copy_from_slice(&[0xff, 0xd8, 0xff, 0xe0]);
    bytes
}

fn test_config(work_dir: &Path) -> ServiceConfig {
    ServiceConfig::builder()
        .bucket("results-bucket")
        .work_dir(work_dir)
        .build()
        .expect("valid config")
}

/// Pipeline whose "matting model" is `cp input output`.
fn copy_pipeline(work_dir: &Path, sink: Arc<MemorySink>) -> Pipeline {
    Pipeline::new(test_config(work_dir), sink)
        .expect("pipeline must build")
        .with_transformer(Arc::new(CommandTransformer::new(
            "cp",
            Vec::<String>::new(),
            Duration::from_secs(30),
        )))
}

/// Pipeline with an arbitrary `sh -c` script as the transform
/// (`$0` = input path, `$1` = output path).
fn shell_pipeline(work_dir: &Path, sink: Arc<MemorySink>, script: &str, timeout: Duration) -> Pipeline {
    Pipeline::new(test_config(work_dir), sink)
        .expect("pipeline must build")
        .with_transformer(Arc::new(CommandTransformer::new(
            "sh",
            ["-c".to_string(), script.to_string()],
            timeout,
        )))
}

fn assert_destination_key_shape(key: &str, source_url: &str) {
    let parts: Vec<&str> = key.split('/').collect();
    assert_eq!(parts.len(), 3, "key must be prefix/date/id.png, got: {key}");
    assert_eq!(parts[0], "removebg");
    assert_eq!(
        parts[1],
        chrono::Utc::now().format("%Y-%m-%d").to_string(),
        "date partition must be today's UTC date"
    );
    assert_eq!(parts[2], format!("{}.png", request_id(source_url)));
}

fn assert_no_scratch_left(work_dir: &Path) {
    let leftovers: Vec<_> = std::fs::read_dir(work_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert!(
        leftovers.is_empty(),
        "transient artifacts must not survive the request: {leftovers:?}"
    );
}

// ── Pipeline tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn full_pipeline_publishes_under_a_deterministic_key() {
    let work = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());
    let pipeline = copy_pipeline(work.path(), sink.clone());

    let url = serve_fixture(StatusCode::OK, "image/jpeg", jpeg_bytes(50_000)).await;
    let output = pipeline.run(&url).await.expect("pipeline should succeed");

    assert_destination_key_shape(&output.key, &url);
    assert_eq!(
        output.image_url,
        format!("https://storage.googleapis.com/results-bucket/{}", output.key)
    );
    assert_eq!(output.stats.source_bytes, 50_000);
    assert_eq!(output.stats.result_bytes, 50_000); // cp transform copies verbatim

    let stored = sink.get(&output.key).await.expect("object must be stored");
    assert_eq!(stored.bytes.len(), 50_000);
    assert_eq!(stored.content_type, "image/png");

    assert_no_scratch_left(work.path());
}

#[tokio::test]
async fn repeat_requests_overwrite_the_same_object() {
    let work = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());
    let pipeline = copy_pipeline(work.path(), sink.clone());

    let url = serve_fixture(StatusCode::OK, "image/png", jpeg_bytes(4_096)).await;
    let first = pipeline.run(&url).await.expect("first run");
    let second = pipeline.run(&url).await.expect("second run");

    assert_eq!(first.key, second.key, "identical sources must share a key");
    assert_eq!(sink.len().await, 1, "second publish overwrites, not duplicates");
}

#[tokio::test]
async fn html_error_page_short_circuits_before_the_transform() {
    let work = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());

    // The transform leaves a marker when invoked; it must never run.
    let marker = work.path().join("transform-ran");
    let pipeline = shell_pipeline(
        work.path(),
        sink.clone(),
        &format!("touch {} && cp \"$0\" \"$1\"", marker.display()),
        Duration::from_secs(30),
    );

    let url = serve_fixture(
        StatusCode::OK,
        "text/html",
        b"<html><body>service temporarily unavailable</body></html>".to_vec(),
    )
    .await;
    let err = pipeline.run(&url).await.unwrap_err();

    assert_eq!(err.category(), "fetch_failed");
    match err {
        RemovalError::FetchContentType {
            content_type,
            body_prefix,
            ..
        } => {
            assert_eq!(content_type, "text/html");
            assert!(body_prefix.contains("temporarily unavailable"));
        }
        other => panic!("expected FetchContentType, got {other:?}"),
    }
    assert!(!marker.exists(), "transform must not run after a fetch failure");
    assert!(sink.is_empty().await, "no durable object may be written");
    assert_no_scratch_left(work.path());
}

#[tokio::test]
async fn non_success_status_is_fetch_failed() {
    let work = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());
    let pipeline = copy_pipeline(work.path(), sink.clone());

    let url = serve_fixture(StatusCode::NOT_FOUND, "image/jpeg", b"gone".to_vec()).await;
    let err = pipeline.run(&url).await.unwrap_err();

    assert!(matches!(err, RemovalError::FetchStatus { status: 404, .. }), "got: {err:?}");
    assert!(sink.is_empty().await);
    assert_no_scratch_left(work.path());
}

#[tokio::test]
async fn implausibly_small_payload_is_fetch_failed() {
    let work = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());
    let pipeline = copy_pipeline(work.path(), sink.clone());

    // 10 bytes declared as image/jpeg: an error page in disguise.
    let url = serve_fixture(StatusCode::OK, "image/jpeg", jpeg_bytes(10)).await;
    let err = pipeline.run(&url).await.unwrap_err();

    assert!(matches!(err, RemovalError::FetchTooSmall { len: 10, .. }), "got: {err:?}");
    assert_no_scratch_left(work.path());
}

#[tokio::test]
async fn silent_transform_without_output_is_processing_failed() {
    let work = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());
    let pipeline = shell_pipeline(work.path(), sink.clone(), "true", Duration::from_secs(30));

    let url = serve_fixture(StatusCode::OK, "image/jpeg", jpeg_bytes(4_096)).await;
    let err = pipeline.run(&url).await.unwrap_err();

    assert_eq!(err.category(), "processing_failed");
    assert!(matches!(err, RemovalError::TransformOutputMissing { .. }), "got: {err:?}");
    assert!(sink.is_empty().await);
    assert_no_scratch_left(work.path());
}

#[tokio::test]
async fn hung_transform_times_out_and_leaves_nothing_behind() {
    let work = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());
    let pipeline = shell_pipeline(work.path(), sink.clone(), "sleep 30", Duration::from_secs(1));

    let url = serve_fixture(StatusCode::OK, "image/jpeg", jpeg_bytes(4_096)).await;
    let err = pipeline.run(&url).await.unwrap_err();

    assert!(matches!(err, RemovalError::TransformTimeout { secs: 1 }), "got: {err:?}");
    assert_eq!(err.category(), "processing_failed");
    assert!(sink.is_empty().await);
    assert_no_scratch_left(work.path());
}

// ── HTTP surface tests ───────────────────────────────────────────────────────

/// Spawn the service router around a pipeline and return its base URL.
async fn spawn_service(pipeline: Pipeline) -> String {
    let app = cutout::server::router(Arc::new(pipeline));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn health_answers_without_pipeline_work() {
    let work = tempfile::tempdir().unwrap();
    let base = spawn_service(copy_pipeline(work.path(), Arc::new(MemorySink::new()))).await;

    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn post_with_valid_source_returns_ok_envelope() {
    let work = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());
    let base = spawn_service(copy_pipeline(work.path(), sink.clone())).await;

    let source = serve_fixture(StatusCode::OK, "image/jpeg", jpeg_bytes(50_000)).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/remove-bg"))
        .json(&serde_json::json!({ "image_url": source }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert!(body["ms"].is_u64(), "got: {body}");

    let file = body["file"].as_str().unwrap();
    assert_destination_key_shape(file, &source);
    assert_eq!(
        body["image_url"].as_str().unwrap(),
        format!("https://storage.googleapis.com/results-bucket/{file}")
    );
    assert_eq!(sink.len().await, 1);
}

#[tokio::test]
async fn query_parameter_reaches_the_same_handler() {
    let work = tempfile::tempdir().unwrap();
    let base = spawn_service(copy_pipeline(work.path(), Arc::new(MemorySink::new()))).await;

    let source = serve_fixture(StatusCode::OK, "image/png", jpeg_bytes(4_096)).await;
    let resp = reqwest::get(format!("{base}/remove-bg?image_url={source}")).await.unwrap();

    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn missing_or_empty_source_is_a_400() {
    let work = tempfile::tempdir().unwrap();
    let base = spawn_service(copy_pipeline(work.path(), Arc::new(MemorySink::new()))).await;
    let client = reqwest::Client::new();

    // Empty string, empty object, and no body at all are the same caller error.
    for payload in [
        serde_json::json!({ "image_url": "" }),
        serde_json::json!({}),
    ] {
        let resp = client
            .post(format!("{base}/remove-bg"))
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400, "payload: {payload}");
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "bad_request");
    }

    let resp = client.post(format!("{base}/remove-bg")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn html_origin_maps_to_500_fetch_failed() {
    let work = tempfile::tempdir().unwrap();
    let base = spawn_service(copy_pipeline(work.path(), Arc::new(MemorySink::new()))).await;

    let source = serve_fixture(StatusCode::OK, "text/html", b"<html>oops</html>".to_vec()).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/remove-bg"))
        .json(&serde_json::json!({ "image_url": source }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "fetch_failed");
    assert!(body["message"].as_str().unwrap().contains("text/html"));
}

#[tokio::test]
async fn transform_timeout_maps_to_500_processing_failed_with_clean_scratch() {
    let work = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());
    let base = spawn_service(shell_pipeline(
        work.path(),
        sink.clone(),
        "sleep 30",
        Duration::from_secs(1),
    ))
    .await;

    let source = serve_fixture(StatusCode::OK, "image/jpeg", jpeg_bytes(4_096)).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/remove-bg"))
        .json(&serde_json::json!({ "image_url": source }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "processing_failed");
    assert!(sink.is_empty().await);
    assert_no_scratch_left(work.path());
}

#[tokio::test]
async fn signed_mode_returns_a_time_limited_url() {
    let work = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());
    let config = ServiceConfig::builder()
        .bucket("results-bucket")
        .work_dir(work.path())
        .public_urls(false)
        .signed_url_ttl_secs(900)
        .build()
        .unwrap();
    let pipeline = Pipeline::new(config, sink)
        .unwrap()
        .with_transformer(Arc::new(CommandTransformer::new(
            "cp",
            Vec::<String>::new(),
            Duration::from_secs(30),
        )) as Arc<dyn Transformer>);

    let source = serve_fixture(StatusCode::OK, "image/jpeg", jpeg_bytes(4_096)).await;
    let output = pipeline.run(&source).await.expect("pipeline should succeed");

    assert!(output.image_url.contains(&output.key), "got: {}", output.image_url);
    assert!(output.image_url.contains("expires_in=900"), "got: {}", output.image_url);
}
