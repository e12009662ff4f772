use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use super::domain::{Booking, BookingId, BookingStatus};
use crate::identity::{User, UserId, UserProfile};

/// Booking as returned to either party.
#[derive(Debug, Clone, Serialize)]
pub struct BookingView {
    pub id: BookingId,
    pub family: UserId,
    pub family_name: Option<String>,
    pub family_profile_image: Option<String>,
    pub caregiver: UserId,
    pub caregiver_name: Option<String>,
    pub caregiver_profile_image: Option<String>,
    pub service_types: Vec<String>,
    pub person_name: String,
    pub person_age: u8,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_hours: u8,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub additional_info: String,
    pub notes: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

/// Display data for one side of a booking.
#[derive(Debug, Clone, Copy, Default)]
pub struct Party<'a> {
    pub user: Option<&'a User>,
    pub profile: Option<&'a UserProfile>,
}

impl Party<'_> {
    fn name(&self) -> Option<String> {
        self.user.map(|user| user.username.clone())
    }

    fn image(&self) -> Option<String> {
        self.profile
            .and_then(|profile| profile.profile_image.clone())
    }
}

impl BookingView {
    pub fn new(booking: &Booking, family: Party<'_>, caregiver: Party<'_>) -> Self {
        let details = &booking.details;
        Self {
            id: booking.id,
            family: booking.family_id,
            family_name: family.name(),
            family_profile_image: family.image(),
            caregiver: booking.caregiver_id,
            caregiver_name: caregiver.name(),
            caregiver_profile_image: caregiver.image(),
            service_types: details.service_types.clone(),
            person_name: details.person_name.clone(),
            person_age: details.person_age,
            date: details.date,
            start_time: details.start_time,
            duration_hours: details.duration_hours,
            emergency_contact_name: details.emergency_contact_name.clone(),
            emergency_contact_phone: details.emergency_contact_phone.clone(),
            additional_info: details.additional_info.clone(),
            notes: details.notes.clone(),
            status: booking.status,
            created_at: booking.created_at,
        }
    }
}
