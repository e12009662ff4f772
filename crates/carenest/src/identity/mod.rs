//! Accounts, profiles and caller resolution shared by every workflow.

pub mod access;
pub mod accounts;
pub mod directory;
pub mod domain;
pub mod router;

#[cfg(test)]
mod tests;

pub use access::{
    authorize, require, resolve_caller, AccessError, CallerError, CallerId, CALLER_HEADER,
};
pub use accounts::{
    normalize_email, AccountError, AccountService, AccountSettings, CaregiverProfileUpdate,
    OtpRequest, ProfileUpdate, ProfileView, RegistrationRequest,
};
pub(crate) use directory::{caregiver_profile_or_default, profile_or_default};
pub use directory::{DirectoryError, IdentityDirectory};
pub use domain::{CaregiverProfile, Gender, NewUser, Role, User, UserId, UserProfile};
pub use router::account_router;
