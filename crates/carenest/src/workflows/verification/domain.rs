use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::UserId;

/// Identifier wrapper for verification records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationId(pub u64);

impl fmt::Display for VerificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Review state of a caregiver's document submission. `Approved` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The three images every submission carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocumentSlot {
    CitizenshipFront,
    CitizenshipBack,
    Certificate,
}

impl DocumentSlot {
    pub const ALL: [DocumentSlot; 3] = [
        DocumentSlot::CitizenshipFront,
        DocumentSlot::CitizenshipBack,
        DocumentSlot::Certificate,
    ];

    /// Form field name used by uploads and validation errors.
    pub const fn field_name(self) -> &'static str {
        match self {
            DocumentSlot::CitizenshipFront => "citizenship_front",
            DocumentSlot::CitizenshipBack => "citizenship_back",
            DocumentSlot::Certificate => "certificate",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|slot| slot.field_name() == name)
    }

    pub(crate) const fn storage_prefix(self) -> &'static str {
        match self {
            DocumentSlot::CitizenshipFront | DocumentSlot::CitizenshipBack => {
                "verification/citizenship"
            }
            DocumentSlot::Certificate => "verification/certificates",
        }
    }
}

/// Persisted reference to an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub key: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaregiverVerification {
    pub id: VerificationId,
    pub user_id: UserId,
    pub citizenship_front: StoredDocument,
    pub citizenship_back: StoredDocument,
    pub certificate: StoredDocument,
    pub status: VerificationStatus,
    /// Present only while rejected.
    pub rejection_reason: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    /// Set when approved.
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<UserId>,
}

impl CaregiverVerification {
    pub fn can_reupload(&self) -> bool {
        self.status == VerificationStatus::Rejected
    }

    pub fn document(&self, slot: DocumentSlot) -> &StoredDocument {
        match slot {
            DocumentSlot::CitizenshipFront => &self.citizenship_front,
            DocumentSlot::CitizenshipBack => &self.citizenship_back,
            DocumentSlot::Certificate => &self.certificate,
        }
    }

    /// Applies an admin ruling to a pending record.
    ///
    /// Repository implementations call this inside their lock or transaction so the
    /// status check and the write happen together.
    pub fn apply(&mut self, ruling: &Ruling) -> Result<(), VerificationStatus> {
        if self.status != VerificationStatus::Pending {
            return Err(self.status);
        }
        self.verified_by = Some(ruling.admin);
        match &ruling.decision {
            Decision::Approve => {
                self.status = VerificationStatus::Approved;
                self.verified_at = Some(ruling.decided_at);
                self.rejection_reason = None;
            }
            Decision::Reject { reason } => {
                self.status = VerificationStatus::Rejected;
                self.verified_at = None;
                self.rejection_reason = Some(reason.clone());
            }
        }
        Ok(())
    }
}

/// Input for a fresh pending record; the repository assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVerification {
    pub user_id: UserId,
    pub citizenship_front: StoredDocument,
    pub citizenship_back: StoredDocument,
    pub certificate: StoredDocument,
    pub uploaded_at: DateTime<Utc>,
}

impl NewVerification {
    pub fn into_record(self, id: VerificationId) -> CaregiverVerification {
        CaregiverVerification {
            id,
            user_id: self.user_id,
            citizenship_front: self.citizenship_front,
            citizenship_back: self.citizenship_back,
            certificate: self.certificate,
            status: VerificationStatus::Pending,
            rejection_reason: None,
            uploaded_at: self.uploaded_at,
            verified_at: None,
            verified_by: None,
        }
    }
}

/// Admin outcome; a rejection always carries its reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject { reason: String },
}

impl Decision {
    pub fn status(&self) -> VerificationStatus {
        match self {
            Decision::Approve => VerificationStatus::Approved,
            Decision::Reject { .. } => VerificationStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ruling {
    pub decision: Decision,
    pub admin: UserId,
    pub decided_at: DateTime<Utc>,
}

/// Admin review-queue selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationFilter {
    /// Every record, newest upload first.
    All,
    /// One status, oldest upload first.
    Status(VerificationStatus),
}

impl Default for VerificationFilter {
    fn default() -> Self {
        VerificationFilter::Status(VerificationStatus::Pending)
    }
}
