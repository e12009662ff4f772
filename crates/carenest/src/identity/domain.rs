use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for user accounts.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Marketplace role; fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Careseeker,
    Caregiver,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Careseeker => "careseeker",
            Role::Caregiver => "caregiver",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub is_active: bool,
    pub is_admin: bool,
    /// Email ownership confirmed through OTP. Unrelated to caregiver document approval.
    pub is_verified: bool,
    #[serde(skip_serializing)]
    pub otp: Option<String>,
    #[serde(skip_serializing)]
    pub otp_created_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Admins bypass email verification.
    pub fn may_sign_in(&self) -> bool {
        self.is_active && (self.is_admin || self.is_verified)
    }
}

/// Input for creating a user; the directory assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub role: Role,
    pub is_admin: bool,
    pub is_verified: bool,
    pub otp: Option<String>,
    pub otp_created_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Contact details shared by every role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub phone: String,
    /// Free-form city/area used for location filtering.
    pub address: String,
    pub profile_image: Option<String>,
    /// Storage key behind `profile_image`.
    #[serde(skip)]
    pub profile_image_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    PreferNotToSay,
}

impl Gender {
    pub const fn label(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::PreferNotToSay => "prefer_not_to_say",
        }
    }
}

/// Service offering and credentials declared by a caregiver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaregiverProfile {
    pub user_id: UserId,
    pub service_types: Vec<String>,
    pub training_authority: String,
    pub certification_year: Option<i32>,
    pub available_hours: String,
    pub bio: String,
    pub gender: Option<Gender>,
}

impl CaregiverProfile {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    pub fn offers(&self, service: &str) -> bool {
        self.service_types.iter().any(|offered| offered == service)
    }
}
