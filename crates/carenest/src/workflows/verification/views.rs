use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{CaregiverVerification, VerificationId, VerificationStatus};
use crate::identity::{User, UserId, UserProfile};

/// What a caregiver sees about their own submission.
#[derive(Debug, Clone, Serialize)]
pub struct CaregiverVerificationView {
    pub id: VerificationId,
    pub verification_status: VerificationStatus,
    pub rejection_reason: Option<String>,
    pub citizenship_front_url: String,
    pub citizenship_back_url: String,
    pub certificate_url: String,
    pub uploaded_at: DateTime<Utc>,
    pub can_reupload: bool,
}

impl From<&CaregiverVerification> for CaregiverVerificationView {
    fn from(record: &CaregiverVerification) -> Self {
        Self {
            id: record.id,
            verification_status: record.status,
            rejection_reason: record.rejection_reason.clone(),
            citizenship_front_url: record.citizenship_front.url.clone(),
            citizenship_back_url: record.citizenship_back.url.clone(),
            certificate_url: record.certificate.url.clone(),
            uploaded_at: record.uploaded_at,
            can_reupload: record.can_reupload(),
        }
    }
}

/// Status lookup result: the record, or a prompt to upload.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum VerificationStatusView {
    Record(CaregiverVerificationView),
    NoRecord {
        message: &'static str,
        can_upload: bool,
    },
}

impl VerificationStatusView {
    pub fn from_record(record: Option<&CaregiverVerification>) -> Self {
        match record {
            Some(record) => Self::Record(record.into()),
            None => Self::NoRecord {
                message: "No documents uploaded yet",
                can_upload: true,
            },
        }
    }
}

/// Review-queue entry for admins.
#[derive(Debug, Clone, Serialize)]
pub struct AdminVerificationView {
    pub id: VerificationId,
    pub user_id: UserId,
    pub email: Option<String>,
    pub username: Option<String>,
    pub profile_image: Option<String>,
    pub verification_status: VerificationStatus,
    pub rejection_reason: Option<String>,
    pub citizenship_front_url: String,
    pub citizenship_back_url: String,
    pub certificate_url: String,
    pub uploaded_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by_email: Option<String>,
}

impl AdminVerificationView {
    pub fn new(
        record: &CaregiverVerification,
        owner: Option<&User>,
        owner_profile: Option<&UserProfile>,
        verified_by: Option<&User>,
    ) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            email: owner.map(|user| user.email.clone()),
            username: owner.map(|user| user.username.clone()),
            profile_image: owner_profile.and_then(|profile| profile.profile_image.clone()),
            verification_status: record.status,
            rejection_reason: record.rejection_reason.clone(),
            citizenship_front_url: record.citizenship_front.url.clone(),
            citizenship_back_url: record.citizenship_back.url.clone(),
            certificate_url: record.certificate.url.clone(),
            uploaded_at: record.uploaded_at,
            verified_at: record.verified_at,
            verified_by_email: verified_by.map(|admin| admin.email.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminVerificationList {
    pub count: usize,
    pub results: Vec<AdminVerificationView>,
}

impl From<Vec<AdminVerificationView>> for AdminVerificationList {
    fn from(results: Vec<AdminVerificationView>) -> Self {
        Self {
            count: results.len(),
            results,
        }
    }
}
