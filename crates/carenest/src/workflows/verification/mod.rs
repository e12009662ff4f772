//! Caregiver document verification: submission, review queue and admin decisions.
//!
//! A caregiver holds at most one record. Pending and approved records block new
//! submissions; a rejected record is replaced by the next one.

pub mod documents;
pub mod domain;
pub mod repository;
pub mod router;
pub mod service;
pub mod views;

#[cfg(test)]
mod tests;

pub use documents::{DocumentPolicy, DocumentSet, DocumentStore, DocumentUpload, StorageError};
pub use domain::{
    CaregiverVerification, Decision, DocumentSlot, NewVerification, Ruling, StoredDocument,
    VerificationFilter, VerificationId, VerificationStatus,
};
pub use repository::{RepositoryError, Submitted, VerificationRepository};
pub use router::verification_router;
pub use service::{DecisionRequest, ListQuery, VerificationError, VerificationService};
pub use views::{
    AdminVerificationList, AdminVerificationView, CaregiverVerificationView,
    VerificationStatusView,
};
