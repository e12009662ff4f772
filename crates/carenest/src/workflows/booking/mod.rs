//! Booking requests from families to approved caregivers, plus the caregiver
//! listing families browse before requesting.
//!
//! A family/caregiver pair holds at most one active (pending or accepted) booking,
//! and a caregiver holds at most one accepted booking.

pub mod directory;
pub mod domain;
pub mod repository;
pub mod router;
pub mod service;
pub(crate) mod validation;
pub mod views;

#[cfg(test)]
mod tests;

pub use directory::{caregiver_listing, CaregiverListing, CaregiverQuery};
pub use domain::{
    Booking, BookingDecision, BookingId, BookingRequest, BookingStatus, CareDetails,
    CaregiverRef, NewBooking, RespondRequest,
};
pub use repository::{BookingRepository, RepositoryError};
pub use router::booking_router;
pub use service::{BookingError, BookingService};
pub use views::{BookingView, Party};
