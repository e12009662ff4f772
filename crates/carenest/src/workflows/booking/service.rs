use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{NaiveDate, Utc};
use tracing::{error, info};

use super::directory::{caregiver_listing, CaregiverListing, CaregiverQuery};
use super::domain::{
    Booking, BookingDecision, BookingId, BookingRequest, BookingStatus, CaregiverRef, NewBooking,
    RespondRequest,
};
use super::repository::{BookingRepository, RepositoryError};
use super::validation::validate_request;
use super::views::{BookingView, Party};
use crate::error::{error_response, internal_response, validation_response, FieldErrors};
use crate::identity::{
    caregiver_profile_or_default, require, resolve_caller, AccessError, CallerError, CallerId,
    DirectoryError, IdentityDirectory, Role,
};
use crate::workflows::verification::{
    RepositoryError as VerificationRepositoryError, VerificationRepository, VerificationStatus,
};

/// Booking requests between families and approved caregivers.
pub struct BookingService {
    directory: Arc<dyn IdentityDirectory>,
    verifications: Arc<dyn VerificationRepository>,
    repository: Arc<dyn BookingRepository>,
}

impl BookingService {
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        verifications: Arc<dyn VerificationRepository>,
        repository: Arc<dyn BookingRepository>,
    ) -> Self {
        Self {
            directory,
            verifications,
            repository,
        }
    }

    /// Approved caregivers for the requesting family, with their active-booking flag.
    pub fn caregivers(
        &self,
        caller: CallerId,
        query: &CaregiverQuery,
    ) -> Result<Vec<CaregiverListing>, BookingError> {
        let family = require(self.directory.as_ref(), caller, Role::Careseeker)?;
        let approved = self.verifications.approved_caregivers()?;
        let active = self.repository.active_caregivers_for(family.id)?;
        Ok(caregiver_listing(
            self.directory.as_ref(),
            &approved,
            &active,
            query,
        )?)
    }

    /// Creates a pending request from the calling family.
    ///
    /// `today` is the caller-local date used to reject past dates.
    pub fn create(
        &self,
        caller: CallerId,
        request: BookingRequest,
        today: NaiveDate,
    ) -> Result<BookingView, BookingError> {
        let family = require(self.directory.as_ref(), caller, Role::Careseeker)?;

        let caregiver_id = match request.caregiver_ref() {
            CaregiverRef::Id(id) => id,
            CaregiverRef::Missing => {
                return Err(BookingError::invalid("caregiver", "Caregiver is required"))
            }
            CaregiverRef::Invalid => {
                return Err(BookingError::invalid("caregiver", "Invalid caregiver ID"))
            }
        };

        let caregiver = self
            .directory
            .fetch_user(caregiver_id)?
            .filter(|user| user.role == Role::Caregiver)
            .ok_or(BookingError::CaregiverNotFound)?;

        let verification = self.verifications.fetch_for_user(caregiver.id)?;
        if verification.map(|record| record.status) != Some(VerificationStatus::Approved) {
            return Err(BookingError::Conflict(
                "Caregiver is not verified or does not exist".to_string(),
            ));
        }

        let offer = caregiver_profile_or_default(self.directory.as_ref(), caregiver.id)?;
        let details = validate_request(&request, &offer, today).map_err(BookingError::Invalid)?;

        let booking = self
            .repository
            .create(NewBooking {
                family_id: family.id,
                caregiver_id: caregiver.id,
                details,
                created_at: Utc::now(),
            })
            .map_err(BookingError::from_repository)?;

        info!(
            booking_id = %booking.id,
            family_id = %family.id,
            caregiver_id = %caregiver.id,
            "booking requested"
        );
        self.view(&booking)
    }

    /// Bookings the caller made (families) or received (caregivers), newest first.
    pub fn list(&self, caller: CallerId) -> Result<Vec<BookingView>, BookingError> {
        let user = resolve_caller(self.directory.as_ref(), caller)?;
        let bookings = match user.role {
            Role::Careseeker => self.repository.list_for_family(user.id)?,
            Role::Caregiver => self.repository.list_for_caregiver(user.id)?,
            Role::Admin => return Err(BookingError::Forbidden),
        };
        bookings.iter().map(|booking| self.view(booking)).collect()
    }

    /// Accepts or rejects a pending request addressed to the calling caregiver.
    pub fn respond(
        &self,
        caller: CallerId,
        id: BookingId,
        request: RespondRequest,
    ) -> Result<BookingView, BookingError> {
        let caregiver = require(self.directory.as_ref(), caller, Role::Caregiver)?;

        let current = self
            .repository
            .fetch(id)?
            .filter(|booking| booking.caregiver_id == caregiver.id)
            .ok_or(BookingError::NotFound(id))?;
        if current.status != BookingStatus::Pending {
            return Err(already_decided(current.status));
        }

        let decision = request
            .status
            .as_deref()
            .map(str::trim)
            .and_then(BookingDecision::parse)
            .ok_or_else(|| {
                BookingError::invalid("status", "Status must be accepted or rejected")
            })?;

        let booking = self
            .repository
            .respond(id, caregiver.id, decision)
            .map_err(|err| match err {
                RepositoryError::NotFound => BookingError::NotFound(id),
                other => BookingError::from_repository(other),
            })?;

        info!(
            booking_id = %booking.id,
            caregiver_id = %caregiver.id,
            status = %booking.status,
            "booking answered"
        );
        self.view(&booking)
    }

    fn view(&self, booking: &Booking) -> Result<BookingView, BookingError> {
        let family = self.directory.fetch_user(booking.family_id)?;
        let family_profile = self.directory.fetch_profile(booking.family_id)?;
        let caregiver = self.directory.fetch_user(booking.caregiver_id)?;
        let caregiver_profile = self.directory.fetch_profile(booking.caregiver_id)?;
        Ok(BookingView::new(
            booking,
            Party {
                user: family.as_ref(),
                profile: family_profile.as_ref(),
            },
            Party {
                user: caregiver.as_ref(),
                profile: caregiver_profile.as_ref(),
            },
        ))
    }
}

fn already_decided(status: BookingStatus) -> BookingError {
    BookingError::Conflict(format!("Booking is already {status}"))
}

/// Error raised by the booking service.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("Access denied")]
    Forbidden,
    #[error("invalid request: {0}")]
    Invalid(FieldErrors),
    #[error("Caregiver not found")]
    CaregiverNotFound,
    #[error("booking {0} not found")]
    NotFound(BookingId),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Verifications(#[from] VerificationRepositoryError),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl BookingError {
    fn invalid(field: &str, message: &str) -> Self {
        Self::Invalid(FieldErrors::single(field, message))
    }

    /// Invariant violations become conflicts; anything else is internal.
    fn from_repository(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateActive | RepositoryError::CaregiverEngaged => {
                Self::Conflict(err.to_string())
            }
            RepositoryError::AlreadyDecided(status) => already_decided(status),
            other => Self::Repository(other),
        }
    }
}

impl From<RepositoryError> for BookingError {
    fn from(value: RepositoryError) -> Self {
        Self::from_repository(value)
    }
}

impl From<CallerError> for BookingError {
    fn from(value: CallerError) -> Self {
        match value {
            CallerError::Access(err) => Self::Access(err),
            CallerError::Directory(err) => Self::Directory(err),
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        match self {
            BookingError::Access(err) => err.into_response(),
            BookingError::Forbidden => error_response(StatusCode::FORBIDDEN, "Access denied"),
            BookingError::Invalid(errors) => validation_response(&errors),
            BookingError::CaregiverNotFound => {
                error_response(StatusCode::NOT_FOUND, "Caregiver not found")
            }
            BookingError::NotFound(_) => error_response(StatusCode::NOT_FOUND, "Booking not found"),
            BookingError::Conflict(message) => error_response(StatusCode::CONFLICT, message),
            other => {
                error!(error = %other, "booking request failed");
                internal_response("Booking request failed", other)
            }
        }
    }
}
