//! Caller resolution and the single role predicate every operation goes through.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::directory::{DirectoryError, IdentityDirectory};
use super::domain::{Role, User, UserId};
use crate::error::error_response;

/// Header the authenticating gateway uses to forward the caller's user id.
pub const CALLER_HEADER: &str = "x-carenest-user";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("authentication credentials were not provided")]
    Unauthenticated,
    #[error("this account is inactive")]
    Inactive,
    #[error("Email not verified. Please verify OTP.")]
    EmailNotVerified,
    #[error("{}", role_message(.0))]
    RoleRequired(Role),
}

fn role_message(role: &Role) -> &'static str {
    match role {
        Role::Careseeker => "Only care seekers can access this resource.",
        Role::Caregiver => "Only caregivers can access this resource.",
        Role::Admin => "You do not have permission to perform this action.",
    }
}

impl AccessError {
    pub fn status(&self) -> StatusCode {
        match self {
            AccessError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AccessError::Inactive | AccessError::EmailNotVerified | AccessError::RoleRequired(_) => {
                StatusCode::FORBIDDEN
            }
        }
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        error_response(self.status(), self.to_string())
    }
}

/// Capability check: `Admin` is granted by the admin flag, other roles by exact match.
pub fn authorize(caller: &User, required: Role) -> Result<(), AccessError> {
    let allowed = match required {
        Role::Admin => caller.is_admin,
        role => caller.role == role,
    };
    if allowed {
        Ok(())
    } else {
        Err(AccessError::RoleRequired(required))
    }
}

/// Failure while turning a forwarded caller id into an account.
#[derive(Debug, thiserror::Error)]
pub enum CallerError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Loads the caller's account and checks it may act at all.
pub fn resolve_caller(
    directory: &dyn IdentityDirectory,
    caller: CallerId,
) -> Result<User, CallerError> {
    let user = directory
        .fetch_user(caller.0)?
        .ok_or(AccessError::Unauthenticated)?;
    if !user.is_active {
        return Err(AccessError::Inactive.into());
    }
    if !user.may_sign_in() {
        return Err(AccessError::EmailNotVerified.into());
    }
    Ok(user)
}

/// Resolves the caller and applies [`authorize`] in one step.
pub fn require(
    directory: &dyn IdentityDirectory,
    caller: CallerId,
    role: Role,
) -> Result<User, CallerError> {
    let user = resolve_caller(directory, caller)?;
    authorize(&user, role)?;
    Ok(user)
}

/// Authenticated caller id forwarded by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AccessError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(|id| CallerId(UserId(id)))
            .ok_or(AccessError::Unauthenticated)
    }
}
