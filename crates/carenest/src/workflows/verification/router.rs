use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};

use super::documents::{read_capped, DocumentSet, UploadFailure};
use super::domain::{DocumentSlot, VerificationId};
use super::service::{DecisionRequest, ListQuery, VerificationService};
use super::views::CaregiverVerificationView;
use crate::error::json_rejection_response;
use crate::identity::CallerId;

/// Router exposing caregiver submission and the admin review queue.
pub fn verification_router(service: Arc<VerificationService>) -> Router {
    let body_limit = service.policy().body_limit(DocumentSlot::ALL.len());

    Router::new()
        .route(
            "/api/verifications/upload-document",
            post(upload_handler).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/verifications/status", get(status_handler))
        .route("/api/verifications/admin/list", get(list_handler))
        .route("/api/verifications/admin/:id/verify", put(decide_handler))
        .with_state(service)
}

pub(crate) async fn upload_handler(
    State(service): State<Arc<VerificationService>>,
    caller: CallerId,
    multipart: Multipart,
) -> Response {
    let policy = service.policy();
    let documents = match read_documents(multipart, policy.max_bytes).await {
        Ok(documents) => documents,
        Err(failure) => return failure.field_response(&policy, "documents"),
    };

    match service.submit(caller, documents) {
        Ok(record) => (
            StatusCode::CREATED,
            Json(CaregiverVerificationView::from(&record)),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Collects the known document fields; unrecognised parts are skipped.
async fn read_documents(
    mut multipart: Multipart,
    max_bytes: u64,
) -> Result<DocumentSet, UploadFailure> {
    let mut documents = DocumentSet::new();
    let mut current: Option<&'static str> = None;
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|err| UploadFailure::from_multipart(err, current))?;
        let Some(mut field) = field else {
            return Ok(documents);
        };
        let Some(slot) = field.name().and_then(DocumentSlot::from_field_name) else {
            current = None;
            continue;
        };
        current = Some(slot.field_name());
        let file_name = field.file_name().unwrap_or_default().to_string();
        let upload = read_capped(&mut field, file_name, max_bytes)
            .await
            .map_err(|err| UploadFailure::from_multipart(err, current))?;
        documents.insert(slot, upload);
    }
}

pub(crate) async fn status_handler(
    State(service): State<Arc<VerificationService>>,
    caller: CallerId,
) -> Response {
    match service.status(caller) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn list_handler(
    State(service): State<Arc<VerificationService>>,
    caller: CallerId,
    Query(query): Query<ListQuery>,
) -> Response {
    match service.list(caller, &query) {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn decide_handler(
    State(service): State<Arc<VerificationService>>,
    caller: CallerId,
    Path(id): Path<u64>,
    payload: Result<Json<DecisionRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection_response(rejection),
    };

    match service.decide(caller, VerificationId(id), request) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}
