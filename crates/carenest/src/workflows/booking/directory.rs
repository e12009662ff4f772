//! Read-only caregiver listing for families: approved caregivers joined with
//! their account, contact profile and offer.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::identity::{
    CaregiverProfile, DirectoryError, Gender, IdentityDirectory, Role, User, UserId, UserProfile,
};
use crate::workflows::verification::VerificationStatus;

/// Optional listing filters from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaregiverQuery {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

impl CaregiverQuery {
    fn location_term(&self) -> Option<String> {
        self.location
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }

    fn gender_term(&self) -> Option<String> {
        self.gender
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty() && !term.eq_ignore_ascii_case("all"))
            .map(str::to_lowercase)
    }

    /// Location is a case-insensitive substring of the address; gender is a
    /// case-insensitive exact match, so an unknown gender matches nobody.
    pub fn matches(&self, caregiver: &CaregiverProfile, contact: Option<&UserProfile>) -> bool {
        if let Some(term) = self.location_term() {
            let address = contact
                .map(|profile| profile.address.to_lowercase())
                .unwrap_or_default();
            if !address.contains(&term) {
                return false;
            }
        }
        if let Some(term) = self.gender_term() {
            if caregiver.gender.map(Gender::label) != Some(term.as_str()) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaregiverListing {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub service_types: Vec<String>,
    pub training_authority: String,
    pub certification_year: Option<i32>,
    pub available_hours: String,
    pub profile_image: Option<String>,
    pub bio: String,
    pub gender: Option<Gender>,
    pub verification_status: VerificationStatus,
    pub address: Option<String>,
    /// The requesting family already holds a pending or accepted booking here.
    pub has_active_booking: bool,
}

impl CaregiverListing {
    fn new(
        user: &User,
        caregiver: CaregiverProfile,
        contact: Option<&UserProfile>,
        has_active_booking: bool,
    ) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            service_types: caregiver.service_types,
            training_authority: caregiver.training_authority,
            certification_year: caregiver.certification_year,
            available_hours: caregiver.available_hours,
            profile_image: contact.and_then(|profile| profile.profile_image.clone()),
            bio: caregiver.bio,
            gender: caregiver.gender,
            verification_status: VerificationStatus::Approved,
            address: contact.map(|profile| profile.address.clone()),
            has_active_booking,
        }
    }
}

/// Approved caregivers matching `query`, ascending by user id.
pub fn caregiver_listing(
    directory: &dyn IdentityDirectory,
    approved: &BTreeSet<UserId>,
    active_with_requester: &BTreeSet<UserId>,
    query: &CaregiverQuery,
) -> Result<Vec<CaregiverListing>, DirectoryError> {
    let mut listing = Vec::new();
    for caregiver in directory.caregiver_profiles()? {
        if !approved.contains(&caregiver.user_id) {
            continue;
        }
        let Some(user) = directory.fetch_user(caregiver.user_id)? else {
            continue;
        };
        if user.role != Role::Caregiver || !user.is_active {
            continue;
        }
        let contact = directory.fetch_profile(user.id)?;
        if !query.matches(&caregiver, contact.as_ref()) {
            continue;
        }
        let has_active_booking = active_with_requester.contains(&user.id);
        listing.push(CaregiverListing::new(
            &user,
            caregiver,
            contact.as_ref(),
            has_active_booking,
        ));
    }
    Ok(listing)
}
