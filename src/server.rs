//! HTTP surface: routing and wire translation only.
//!
//! Everything with pipeline semantics lives in [`crate::remove`]; this module
//! just parses the one inbound parameter, invokes the shared [`Pipeline`],
//! and renders the outcome. The same handler backs both the JSON-body POST
//! and the query-parameter GET, so routing carries no behavior of its own.

use crate::error::RemovalError;
use crate::remove::Pipeline;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

/// Build the service router around a shared pipeline.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/remove-bg", axum::routing::post(remove_bg).get(remove_bg))
        .route("/health", get(health))
        .with_state(pipeline)
}

/// Liveness probe: fixed answer, no pipeline work.
async fn health() -> &'static str {
    "ok"
}

/// The one inbound parameter, accepted as a JSON body or a query parameter.
#[derive(Debug, Default, Deserialize)]
struct RemoveParams {
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Serialize)]
struct SuccessBody {
    ok: bool,
    image_url: String,
    file: String,
    ms: u64,
}

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    error: &'static str,
    message: String,
}

async fn remove_bg(
    State(pipeline): State<Arc<Pipeline>>,
    Query(query): Query<RemoveParams>,
    body: Option<Json<RemoveParams>>,
) -> Response {
    let image_url = body
        .and_then(|Json(params)| params.image_url)
        .or(query.image_url)
        .unwrap_or_default();

    match pipeline.run(&image_url).await {
        Ok(output) => (
            StatusCode::OK,
            Json(SuccessBody {
                ok: true,
                image_url: output.image_url,
                file: output.key,
                ms: output.stats.total_ms,
            }),
        )
            .into_response(),
        Err(e) => failure_response(&e),
    }
}

/// Render a pipeline failure: full diagnostics to the log, only category and
/// a human-readable message to the caller.
fn failure_response(e: &RemovalError) -> Response {
    error!("remove-bg failed ({}): {e:?}", e.category());

    let status =
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorBody {
            ok: false,
            error: e.category(),
            message: e.to_string(),
        }),
    )
        .into_response()
}
