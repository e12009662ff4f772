use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::access::{require, resolve_caller, AccessError, CallerError, CallerId};
use super::directory::{
    caregiver_profile_or_default, profile_or_default, DirectoryError, IdentityDirectory,
};
use super::domain::{CaregiverProfile, Gender, NewUser, Role, User, UserId, UserProfile};
use crate::error::{error_response, internal_response, validation_response, FieldErrors};
use crate::notifications::{Notice, Notifier};
use crate::workflows::verification::documents::object_key;
use crate::workflows::verification::{
    DocumentPolicy, DocumentStore, DocumentUpload, RepositoryError as VerificationRepositoryError,
    StorageError, VerificationRepository, VerificationStatus,
};

const MAX_USERNAME_CHARS: usize = 30;
const MAX_PHONE_CHARS: usize = 20;
const MAX_CREDENTIAL_CHARS: usize = 255;
const PROFILE_IMAGE_PREFIX: &str = "profiles";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OtpRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub otp: Option<String>,
}

/// Partial update of the shared contact profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Partial update of a caregiver's offer and credentials.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaregiverProfileUpdate {
    #[serde(default)]
    pub service_types: Option<Vec<String>>,
    #[serde(default)]
    pub training_authority: Option<String>,
    #[serde(default)]
    pub certification_year: Option<i32>,
    #[serde(default)]
    pub available_hours: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    /// Empty string clears the declared gender.
    #[serde(default)]
    pub gender: Option<String>,
}

/// Profile as shown to its owner or to an admin.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub user_id: UserId,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub phone: String,
    pub address: String,
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caregiver_details: Option<CaregiverProfile>,
    /// Caregivers only; the inner `None` serializes as `null` when nothing was submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<Option<VerificationStatus>>,
}

/// Account registration, OTP confirmation and profile maintenance.
pub struct AccountService {
    directory: Arc<dyn IdentityDirectory>,
    verifications: Arc<dyn VerificationRepository>,
    media: Arc<dyn DocumentStore>,
    notifier: Arc<dyn Notifier>,
    settings: AccountSettings,
}

/// Tunables for the account service.
#[derive(Debug, Clone, Copy)]
pub struct AccountSettings {
    pub otp_ttl: Duration,
    pub profile_images: DocumentPolicy,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            otp_ttl: Duration::minutes(10),
            profile_images: DocumentPolicy::default(),
        }
    }
}

impl AccountService {
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        verifications: Arc<dyn VerificationRepository>,
        media: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
        settings: AccountSettings,
    ) -> Self {
        Self {
            directory,
            verifications,
            media,
            notifier,
            settings,
        }
    }

    pub fn profile_image_policy(&self) -> DocumentPolicy {
        self.settings.profile_images
    }

    /// Creates an unverified care seeker or caregiver and queues the OTP e-mail.
    pub fn register(&self, request: RegistrationRequest) -> Result<User, AccountError> {
        let mut errors = FieldErrors::new();
        let email = match request.email.as_deref() {
            Some(raw) => normalize_email(raw).or_else(|| {
                errors.add("email", "Enter a valid email address.");
                None
            }),
            None => {
                errors.add("email", "This field is required.");
                None
            }
        };
        let username = check_username(request.username.as_deref(), &mut errors);
        let role = match request.role.as_deref().map(str::trim) {
            None | Some("") | Some("careseeker") => Some(Role::Careseeker),
            Some("caregiver") => Some(Role::Caregiver),
            Some(other) => {
                errors.add("role", format!("\"{other}\" is not a valid choice."));
                None
            }
        };
        let (Some(email), Some(username), Some(role)) = (email, username, role) else {
            return Err(AccountError::Invalid(errors));
        };

        let now = Utc::now();
        let code = generate_otp();
        let user = self
            .directory
            .insert_user(NewUser {
                email,
                username,
                role,
                is_admin: false,
                is_verified: false,
                otp: Some(code.clone()),
                otp_created_at: Some(now),
                created_at: now,
            })
            .map_err(AccountError::from_insert)?;

        self.ensure_profiles(&user)?;
        info!(user_id = %user.id, role = %user.role, "account registered");

        let notice = Notice::OneTimePasscode {
            email: user.email.clone(),
            code,
            ttl_minutes: self.settings.otp_ttl.num_minutes(),
        };
        if let Err(err) = self.notifier.notify(notice) {
            warn!(user_id = %user.id, error = %err, "otp notice not queued");
        }
        Ok(user)
    }

    pub fn verify_otp(&self, request: OtpRequest) -> Result<User, AccountError> {
        self.verify_otp_at(request, Utc::now())
    }

    /// Confirms e-mail ownership as of `now`.
    pub fn verify_otp_at(
        &self,
        request: OtpRequest,
        now: DateTime<Utc>,
    ) -> Result<User, AccountError> {
        let mut user = request
            .email
            .as_deref()
            .and_then(normalize_email)
            .map(|email| self.directory.find_by_email(&email))
            .transpose()?
            .flatten()
            .ok_or_else(|| AccountError::rejected("Invalid email"))?;

        if user.is_verified {
            return Err(AccountError::Conflict("Account already verified".to_string()));
        }

        let submitted = request.otp.as_deref().map(str::trim).unwrap_or_default();
        if user.otp.as_deref() != Some(submitted) || submitted.is_empty() {
            return Err(AccountError::rejected("Invalid OTP"));
        }

        let expired = user
            .otp_created_at
            .map_or(true, |issued| now > issued + self.settings.otp_ttl);
        if expired {
            return Err(AccountError::rejected("OTP has expired"));
        }

        user.is_verified = true;
        user.otp = None;
        user.otp_created_at = None;
        self.directory.update_user(user.clone())?;
        self.ensure_profiles(&user)?;

        info!(user_id = %user.id, "account email verified");
        Ok(user)
    }

    /// Seeds an admin account; admins skip OTP confirmation. Re-running with an
    /// existing admin e-mail returns that account.
    pub fn bootstrap_admin(&self, email: &str, username: &str) -> Result<User, AccountError> {
        let email = normalize_email(email).ok_or_else(|| {
            AccountError::Invalid(FieldErrors::single("email", "Enter a valid email address."))
        })?;

        if let Some(existing) = self.directory.find_by_email(&email)? {
            if existing.is_admin {
                return Ok(existing);
            }
            return Err(AccountError::Conflict(
                "user with this email already exists.".to_string(),
            ));
        }

        let mut errors = FieldErrors::new();
        let username = check_username(Some(username), &mut errors)
            .ok_or(AccountError::Invalid(errors))?;

        let user = self
            .directory
            .insert_user(NewUser {
                email,
                username,
                role: Role::Admin,
                is_admin: true,
                is_verified: true,
                otp: None,
                otp_created_at: None,
                created_at: Utc::now(),
            })
            .map_err(AccountError::from_insert)?;
        self.ensure_profiles(&user)?;

        info!(user_id = %user.id, "admin account seeded");
        Ok(user)
    }

    pub fn profile(&self, caller: CallerId) -> Result<ProfileView, AccountError> {
        let user = resolve_caller(self.directory.as_ref(), caller)?;
        self.profile_view(&user)
    }

    pub fn update_profile(
        &self,
        caller: CallerId,
        update: ProfileUpdate,
    ) -> Result<ProfileView, AccountError> {
        let user = resolve_caller(self.directory.as_ref(), caller)?;
        let mut profile = profile_or_default(self.directory.as_ref(), user.id)?;

        let mut errors = FieldErrors::new();
        if let Some(phone) = update.phone {
            let phone = phone.trim().to_string();
            if phone.chars().count() > MAX_PHONE_CHARS {
                errors.add("phone", too_long(MAX_PHONE_CHARS));
            } else {
                profile.phone = phone;
            }
        }
        if let Some(address) = update.address {
            profile.address = address.trim().to_string();
        }
        errors.into_result().map_err(AccountError::Invalid)?;

        self.directory.save_profile(profile)?;
        info!(user_id = %user.id, "profile updated");
        self.profile_view(&user)
    }

    /// Stores a new profile picture and drops the one it replaces.
    pub fn update_profile_image(
        &self,
        caller: CallerId,
        upload: Option<DocumentUpload>,
    ) -> Result<ProfileView, AccountError> {
        let user = resolve_caller(self.directory.as_ref(), caller)?;
        let upload = upload.ok_or_else(|| {
            AccountError::Invalid(FieldErrors::single(
                "profile_image",
                "No file was submitted.",
            ))
        })?;
        self.settings
            .profile_images
            .check(&upload)
            .map_err(|message| {
                AccountError::Invalid(FieldErrors::single("profile_image", message))
            })?;

        let mut profile = profile_or_default(self.directory.as_ref(), user.id)?;
        let key = object_key(
            PROFILE_IMAGE_PREFIX,
            &user.id.to_string(),
            &upload.file_name,
        );
        let stored = self.media.store(key, &upload)?;
        let previous = profile.profile_image_key.replace(stored.key.clone());
        profile.profile_image = Some(stored.url);

        if let Err(err) = self.directory.save_profile(profile) {
            self.discard_image(&stored.key);
            return Err(err.into());
        }
        if let Some(previous) = previous {
            self.discard_image(&previous);
        }

        info!(user_id = %user.id, "profile image updated");
        self.profile_view(&user)
    }

    fn discard_image(&self, key: &str) {
        if let Err(err) = self.media.remove(key) {
            warn!(key = %key, error = %err, "profile image not removed");
        }
    }

    pub fn update_caregiver_profile(
        &self,
        caller: CallerId,
        update: CaregiverProfileUpdate,
    ) -> Result<ProfileView, AccountError> {
        let user = require(self.directory.as_ref(), caller, Role::Caregiver)?;
        let mut profile = caregiver_profile_or_default(self.directory.as_ref(), user.id)?;

        let mut errors = FieldErrors::new();
        if let Some(service_types) = update.service_types {
            profile.service_types = service_types
                .into_iter()
                .map(|service| service.trim().to_string())
                .filter(|service| !service.is_empty())
                .fold(Vec::new(), |mut unique, service| {
                    if !unique.contains(&service) {
                        unique.push(service);
                    }
                    unique
                });
        }
        if let Some(authority) = update.training_authority {
            if authority.chars().count() > MAX_CREDENTIAL_CHARS {
                errors.add("training_authority", too_long(MAX_CREDENTIAL_CHARS));
            } else {
                profile.training_authority = authority.trim().to_string();
            }
        }
        if let Some(year) = update.certification_year {
            profile.certification_year = Some(year);
        }
        if let Some(hours) = update.available_hours {
            if hours.chars().count() > MAX_CREDENTIAL_CHARS {
                errors.add("available_hours", too_long(MAX_CREDENTIAL_CHARS));
            } else {
                profile.available_hours = hours.trim().to_string();
            }
        }
        if let Some(bio) = update.bio {
            profile.bio = bio.trim().to_string();
        }
        if let Some(gender) = update.gender {
            match parse_gender(&gender) {
                Ok(gender) => profile.gender = gender,
                Err(()) => errors.add("gender", format!("\"{gender}\" is not a valid choice.")),
            }
        }
        errors.into_result().map_err(AccountError::Invalid)?;

        self.directory.save_caregiver_profile(profile)?;
        info!(user_id = %user.id, "caregiver profile updated");
        self.profile_view(&user)
    }

    /// Any account's profile, for admins.
    pub fn admin_profile(
        &self,
        caller: CallerId,
        user_id: UserId,
    ) -> Result<ProfileView, AccountError> {
        require(self.directory.as_ref(), caller, Role::Admin)?;
        let user = self
            .directory
            .fetch_user(user_id)?
            .ok_or(AccountError::NotFound(user_id))?;
        self.profile_view(&user)
    }

    fn ensure_profiles(&self, user: &User) -> Result<(), AccountError> {
        profile_or_default(self.directory.as_ref(), user.id)?;
        if user.role == Role::Caregiver {
            caregiver_profile_or_default(self.directory.as_ref(), user.id)?;
        }
        Ok(())
    }

    fn profile_view(&self, user: &User) -> Result<ProfileView, AccountError> {
        let profile = profile_or_default(self.directory.as_ref(), user.id)?;
        let (caregiver_details, verification_status) = if user.role == Role::Caregiver {
            let details = caregiver_profile_or_default(self.directory.as_ref(), user.id)?;
            let status = self
                .verifications
                .fetch_for_user(user.id)?
                .map(|record| record.status);
            (Some(details), Some(status))
        } else {
            (None, None)
        };

        Ok(ProfileView {
            user_id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            role: user.role,
            phone: profile.phone,
            address: profile.address,
            profile_image: profile.profile_image,
            caregiver_details,
            verification_status,
        })
    }
}

/// Lower-cases the domain part; the local part keeps its case.
pub fn normalize_email(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let (local, domain) = raw.split_once('@')?;
    let valid = !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !raw.chars().any(char::is_whitespace);
    valid.then(|| format!("{local}@{}", domain.to_lowercase()))
}

fn check_username(raw: Option<&str>, errors: &mut FieldErrors) -> Option<String> {
    let Some(raw) = raw else {
        errors.add("username", "This field is required.");
        return None;
    };
    let username = raw.trim();
    if username.is_empty() {
        errors.add("username", "This field may not be blank.");
        return None;
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        errors.add("username", too_long(MAX_USERNAME_CHARS));
        return None;
    }
    Some(username.to_string())
}

fn parse_gender(raw: &str) -> Result<Option<Gender>, ()> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "male" => Ok(Some(Gender::Male)),
        "female" => Ok(Some(Gender::Female)),
        "prefer_not_to_say" => Ok(Some(Gender::PreferNotToSay)),
        _ => Err(()),
    }
}

fn too_long(max_chars: usize) -> String {
    format!("Ensure this field has no more than {max_chars} characters.")
}

fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Error raised by the account service.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("invalid request: {0}")]
    Invalid(FieldErrors),
    #[error("{0}")]
    Conflict(String),
    #[error("user {0} not found")]
    NotFound(UserId),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Verifications(#[from] VerificationRepositoryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AccountError {
    fn rejected(message: &str) -> Self {
        Self::Invalid(FieldErrors::single("non_field_errors", message))
    }

    fn from_insert(err: DirectoryError) -> Self {
        match err {
            DirectoryError::DuplicateEmail => {
                Self::Conflict("user with this email already exists.".to_string())
            }
            DirectoryError::DuplicateUsername => {
                Self::Conflict("user with this username already exists.".to_string())
            }
            other => Self::Directory(other),
        }
    }
}

impl From<CallerError> for AccountError {
    fn from(value: CallerError) -> Self {
        match value {
            CallerError::Access(err) => Self::Access(err),
            CallerError::Directory(err) => Self::Directory(err),
        }
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        match self {
            AccountError::Access(err) => err.into_response(),
            AccountError::Invalid(errors) => validation_response(&errors),
            AccountError::Conflict(message) => error_response(StatusCode::CONFLICT, message),
            AccountError::NotFound(_) => error_response(StatusCode::NOT_FOUND, "User not found"),
            other => {
                error!(error = %other, "account request failed");
                internal_response("Account request failed", other)
            }
        }
    }
}
