use std::collections::BTreeSet;

use super::domain::{
    CaregiverVerification, NewVerification, Ruling, VerificationFilter, VerificationId,
    VerificationStatus,
};
use crate::identity::UserId;

/// Storage abstraction for verification records (at most one per caregiver).
///
/// `submit` and `decide` are check-then-act operations; implementations must run the
/// status check and the write atomically (row lock, transaction, or conditional update).
pub trait VerificationRepository: Send + Sync {
    fn fetch(&self, id: VerificationId) -> Result<Option<CaregiverVerification>, RepositoryError>;
    fn fetch_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<CaregiverVerification>, RepositoryError>;
    /// Stores a new pending record, discarding a rejected one first.
    /// Fails with `Locked` while the caregiver's record is pending or approved.
    fn submit(&self, new: NewVerification) -> Result<Submitted, RepositoryError>;
    /// Applies the ruling only if the record is still pending.
    fn decide(
        &self,
        id: VerificationId,
        ruling: &Ruling,
    ) -> Result<CaregiverVerification, RepositoryError>;
    fn list(&self, filter: VerificationFilter)
        -> Result<Vec<CaregiverVerification>, RepositoryError>;
    fn approved_caregivers(&self) -> Result<BTreeSet<UserId>, RepositoryError>;
}

/// A stored submission and the rejected record it replaced, if any.
#[derive(Debug, Clone)]
pub struct Submitted {
    pub record: CaregiverVerification,
    pub replaced: Option<CaregiverVerification>,
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("verification record not found")]
    NotFound,
    #[error("existing verification is {0}")]
    Locked(VerificationStatus),
    #[error("This verification has already been {0}")]
    AlreadyDecided(VerificationStatus),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
