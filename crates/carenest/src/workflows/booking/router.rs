use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Local;

use super::directory::CaregiverQuery;
use super::domain::{BookingId, BookingRequest, RespondRequest};
use super::service::BookingService;
use crate::error::json_rejection_response;
use crate::identity::CallerId;

/// Router exposing caregiver discovery and the booking request lifecycle.
pub fn booking_router(service: Arc<BookingService>) -> Router {
    Router::new()
        .route("/api/bookings/caregivers", get(caregivers_handler))
        .route("/api/bookings", post(create_handler))
        .route("/api/bookings/list", get(list_handler))
        .route("/api/bookings/:id/respond", put(respond_handler))
        .with_state(service)
}

pub(crate) async fn caregivers_handler(
    State(service): State<Arc<BookingService>>,
    caller: CallerId,
    Query(query): Query<CaregiverQuery>,
) -> Response {
    match service.caregivers(caller, &query) {
        Ok(listing) => (StatusCode::OK, Json(listing)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn create_handler(
    State(service): State<Arc<BookingService>>,
    caller: CallerId,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection_response(rejection),
    };

    let today = Local::now().date_naive();
    match service.create(caller, request, today) {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn list_handler(
    State(service): State<Arc<BookingService>>,
    caller: CallerId,
) -> Response {
    match service.list(caller) {
        Ok(bookings) => (StatusCode::OK, Json(bookings)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn respond_handler(
    State(service): State<Arc<BookingService>>,
    caller: CallerId,
    Path(id): Path<u64>,
    payload: Result<Json<RespondRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection_response(rejection),
    };

    match service.respond(caller, BookingId(id), request) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}
