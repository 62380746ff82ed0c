use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, instrument};

use crate::observability::Metrics;

/// Prometheus text exposition format
const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Scrape endpoint for the HTTP, cart, catalog and order metrics
#[instrument(name = "metrics_handler", skip(metrics))]
pub async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> Response {
    let exposition = match metrics.encode() {
        Ok(exposition) => exposition,
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response();
        }
    };

    (
        [
            (header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        exposition,
    )
        .into_response()
}
