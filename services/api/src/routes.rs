use crate::infra::{AppState, Marketplace};
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use carenest::identity::account_router;
use carenest::memory::InMemoryDocumentStore;
use carenest::workflows::booking::booking_router;
use carenest::workflows::verification::verification_router;
use serde_json::json;

pub(crate) fn with_marketplace_routes(marketplace: &Marketplace) -> Router {
    account_router(marketplace.accounts.clone())
        .merge(verification_router(marketplace.verifications.clone()))
        .merge(booking_router(marketplace.bookings.clone()))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/media/*key", get(media_endpoint))
        .layer(Extension(marketplace.documents.clone()))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Serves uploaded verification documents back under their stored URL.
pub(crate) async fn media_endpoint(
    Extension(documents): Extension<InMemoryDocumentStore>,
    Path(key): Path<String>,
) -> Response {
    match documents.object(&key) {
        Some(bytes) => {
            let content_type = mime_guess::from_path(&key)
                .first_or_octet_stream()
                .to_string();
            (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Document not found" })),
        )
            .into_response(),
    }
}
