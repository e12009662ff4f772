use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use serde_json::json;

use super::access::CallerId;
use super::accounts::{
    AccountService, CaregiverProfileUpdate, OtpRequest, ProfileUpdate, RegistrationRequest,
};
use super::domain::UserId;
use crate::error::json_rejection_response;
use crate::workflows::verification::documents::{read_capped, UploadFailure};
use crate::workflows::verification::DocumentUpload;

const PROFILE_IMAGE_FIELD: &str = "profile_image";

/// Router exposing registration, OTP confirmation and profile endpoints.
pub fn account_router(service: Arc<AccountService>) -> Router {
    let image_body_limit = service.profile_image_policy().body_limit(1);

    Router::new()
        .route("/api/user/register", post(register_handler))
        .route("/api/user/verify-otp", post(verify_otp_handler))
        .route(
            "/api/user/profile",
            get(profile_handler).patch(update_profile_handler),
        )
        .route(
            "/api/user/profile/image",
            put(update_profile_image_handler).layer(DefaultBodyLimit::max(image_body_limit)),
        )
        .route(
            "/api/user/profile/caregiver",
            patch(update_caregiver_profile_handler),
        )
        .route(
            "/api/user/admin/profile/:user_id",
            get(admin_profile_handler),
        )
        .with_state(service)
}

pub(crate) async fn register_handler(
    State(service): State<Arc<AccountService>>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection_response(rejection),
    };

    match service.register(request) {
        Ok(user) => {
            let payload = json!({
                "message": "User registered successfully",
                "user_id": user.id,
                "email": user.email,
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn verify_otp_handler(
    State(service): State<Arc<AccountService>>,
    payload: Result<Json<OtpRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection_response(rejection),
    };

    match service.verify_otp(request) {
        Ok(_) => {
            let payload = json!({ "message": "Email verified successfully" });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn profile_handler(
    State(service): State<Arc<AccountService>>,
    caller: CallerId,
) -> Response {
    match service.profile(caller) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn update_profile_handler(
    State(service): State<Arc<AccountService>>,
    caller: CallerId,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Response {
    let Json(update) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection_response(rejection),
    };

    match service.update_profile(caller, update) {
        Ok(view) => {
            let payload = json!({ "message": "Profile updated successfully", "data": view });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// Multipart upload with a single `profile_image` part.
pub(crate) async fn update_profile_image_handler(
    State(service): State<Arc<AccountService>>,
    caller: CallerId,
    multipart: Multipart,
) -> Response {
    let policy = service.profile_image_policy();
    let upload = match read_profile_image(multipart, policy.max_bytes).await {
        Ok(upload) => upload,
        Err(failure) => return failure.field_response(&policy, PROFILE_IMAGE_FIELD),
    };

    match service.update_profile_image(caller, upload) {
        Ok(view) => {
            let payload = json!({ "message": "Profile updated successfully", "data": view });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

async fn read_profile_image(
    mut multipart: Multipart,
    max_bytes: u64,
) -> Result<Option<DocumentUpload>, UploadFailure> {
    let mut upload = None;
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadFailure::from_multipart(err, None))?
    {
        if field.name() != Some(PROFILE_IMAGE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let image = read_capped(&mut field, file_name, max_bytes)
            .await
            .map_err(|err| UploadFailure::from_multipart(err, Some(PROFILE_IMAGE_FIELD)))?;
        upload = Some(image);
    }
    Ok(upload)
}

pub(crate) async fn update_caregiver_profile_handler(
    State(service): State<Arc<AccountService>>,
    caller: CallerId,
    payload: Result<Json<CaregiverProfileUpdate>, JsonRejection>,
) -> Response {
    let Json(update) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection_response(rejection),
    };

    match service.update_caregiver_profile(caller, update) {
        Ok(view) => {
            let payload = json!({
                "message": "Caregiver details updated successfully",
                "data": view,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn admin_profile_handler(
    State(service): State<Arc<AccountService>>,
    caller: CallerId,
    Path(user_id): Path<u64>,
) -> Response {
    match service.admin_profile(caller, UserId(user_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}
