use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::UserId;

/// Identifier wrapper for booking requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(pub u64);

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Booking lifecycle. `Accepted` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
}

impl BookingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Rejected => "rejected",
        }
    }

    /// Pending and accepted bookings both occupy the family/caregiver pair.
    pub const fn is_active(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Accepted)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Caregiver's answer to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingDecision {
    Accept,
    Reject,
}

impl BookingDecision {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "accepted" => Some(Self::Accept),
            "rejected" => Some(Self::Reject),
            _ => None,
        }
    }

    pub const fn status(self) -> BookingStatus {
        match self {
            BookingDecision::Accept => BookingStatus::Accepted,
            BookingDecision::Reject => BookingStatus::Rejected,
        }
    }
}

/// Validated care details captured with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareDetails {
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
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub family_id: UserId,
    pub caregiver_id: UserId,
    pub details: CareDetails,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Moves a pending booking to the decided status.
    pub fn respond(&mut self, decision: BookingDecision) -> Result<(), BookingStatus> {
        if self.status != BookingStatus::Pending {
            return Err(self.status);
        }
        self.status = decision.status();
        Ok(())
    }
}

/// Input for a fresh pending booking; the repository assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub family_id: UserId,
    pub caregiver_id: UserId,
    pub details: CareDetails,
    pub created_at: DateTime<Utc>,
}

impl NewBooking {
    pub fn into_record(self, id: BookingId) -> Booking {
        Booking {
            id,
            family_id: self.family_id,
            caregiver_id: self.caregiver_id,
            details: self.details,
            status: BookingStatus::Pending,
            created_at: self.created_at,
        }
    }
}

/// Booking payload as sent by the family's client, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingRequest {
    /// Numeric id, or its string form.
    #[serde(default)]
    pub caregiver: Option<Value>,
    #[serde(default)]
    pub service_types: Option<Vec<String>>,
    #[serde(default)]
    pub person_name: Option<String>,
    #[serde(default)]
    pub person_age: Option<i64>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub duration_hours: Option<i64>,
    #[serde(default)]
    pub emergency_contact_name: Option<String>,
    #[serde(default)]
    pub emergency_contact_phone: Option<String>,
    #[serde(default)]
    pub additional_info: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Outcome of reading the `caregiver` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaregiverRef {
    Missing,
    Invalid,
    Id(UserId),
}

impl BookingRequest {
    pub fn caregiver_ref(&self) -> CaregiverRef {
        match &self.caregiver {
            None | Some(Value::Null) => CaregiverRef::Missing,
            Some(Value::String(raw)) if raw.trim().is_empty() => CaregiverRef::Missing,
            Some(Value::Number(number)) => number
                .as_u64()
                .filter(|id| *id > 0)
                .map_or(CaregiverRef::Invalid, |id| CaregiverRef::Id(UserId(id))),
            Some(Value::String(raw)) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|id| *id > 0)
                .map_or(CaregiverRef::Invalid, |id| CaregiverRef::Id(UserId(id))),
            Some(_) => CaregiverRef::Invalid,
        }
    }
}

/// Caregiver response payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RespondRequest {
    #[serde(default)]
    pub status: Option<String>,
}
