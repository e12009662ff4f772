use super::domain::{CaregiverProfile, NewUser, User, UserId, UserProfile};

/// Storage abstraction over user accounts and their profiles.
pub trait IdentityDirectory: Send + Sync {
    /// Creates the account; email and username are unique.
    fn insert_user(&self, user: NewUser) -> Result<User, DirectoryError>;
    fn fetch_user(&self, id: UserId) -> Result<Option<User>, DirectoryError>;
    fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError>;
    fn update_user(&self, user: User) -> Result<(), DirectoryError>;
    fn fetch_profile(&self, id: UserId) -> Result<Option<UserProfile>, DirectoryError>;
    fn save_profile(&self, profile: UserProfile) -> Result<(), DirectoryError>;
    fn fetch_caregiver_profile(
        &self,
        id: UserId,
    ) -> Result<Option<CaregiverProfile>, DirectoryError>;
    fn save_caregiver_profile(&self, profile: CaregiverProfile) -> Result<(), DirectoryError>;
    /// Every caregiver profile, ascending by user id.
    fn caregiver_profiles(&self) -> Result<Vec<CaregiverProfile>, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("a user with this email already exists")]
    DuplicateEmail,
    #[error("a user with this username already exists")]
    DuplicateUsername,
    #[error("user not found")]
    NotFound,
    #[error("identity directory unavailable: {0}")]
    Unavailable(String),
}

/// Fetches the profile, creating an empty one when the account has none yet.
pub(crate) fn profile_or_default(
    directory: &dyn IdentityDirectory,
    id: UserId,
) -> Result<UserProfile, DirectoryError> {
    match directory.fetch_profile(id)? {
        Some(profile) => Ok(profile),
        None => {
            let profile = UserProfile {
                user_id: id,
                ..UserProfile::default()
            };
            directory.save_profile(profile.clone())?;
            Ok(profile)
        }
    }
}

pub(crate) fn caregiver_profile_or_default(
    directory: &dyn IdentityDirectory,
    id: UserId,
) -> Result<CaregiverProfile, DirectoryError> {
    match directory.fetch_caregiver_profile(id)? {
        Some(profile) => Ok(profile),
        None => {
            let profile = CaregiverProfile::empty(id);
            directory.save_caregiver_profile(profile.clone())?;
            Ok(profile)
        }
    }
}
