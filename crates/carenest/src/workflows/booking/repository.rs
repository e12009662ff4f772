use std::collections::BTreeSet;

use super::domain::{Booking, BookingDecision, BookingId, BookingStatus, NewBooking};
use crate::identity::UserId;

/// Storage abstraction for booking requests.
///
/// `create` and `respond` check an invariant and write in one step; durable
/// implementations need a transaction or conditional update for each.
pub trait BookingRepository: Send + Sync {
    fn fetch(&self, id: BookingId) -> Result<Option<Booking>, RepositoryError>;
    /// Stores a pending booking unless the pair already has an active one.
    fn create(&self, new: NewBooking) -> Result<Booking, RepositoryError>;
    /// Decides a pending booking owned by `caregiver`. Accepting fails while the
    /// caregiver holds another accepted booking.
    fn respond(
        &self,
        id: BookingId,
        caregiver: UserId,
        decision: BookingDecision,
    ) -> Result<Booking, RepositoryError>;
    /// Newest first.
    fn list_for_family(&self, family: UserId) -> Result<Vec<Booking>, RepositoryError>;
    /// Newest first.
    fn list_for_caregiver(&self, caregiver: UserId) -> Result<Vec<Booking>, RepositoryError>;
    /// Caregivers the family currently holds an active booking with.
    fn active_caregivers_for(&self, family: UserId) -> Result<BTreeSet<UserId>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("booking not found")]
    NotFound,
    #[error("You already have an active booking request with this caregiver")]
    DuplicateActive,
    #[error("Booking is already {0}")]
    AlreadyDecided(BookingStatus),
    #[error("Caregiver already has an active accepted booking")]
    CaregiverEngaged,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
