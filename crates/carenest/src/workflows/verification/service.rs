use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};

use super::documents::{storage_key, DocumentPolicy, DocumentSet, DocumentStore, StorageError};
use super::domain::{
    CaregiverVerification, Decision, DocumentSlot, NewVerification, Ruling, StoredDocument,
    VerificationFilter, VerificationId, VerificationStatus,
};
use super::repository::{RepositoryError, VerificationRepository};
use super::views::{AdminVerificationList, AdminVerificationView, VerificationStatusView};
use crate::error::{error_response, internal_response, validation_response, FieldErrors};
use crate::identity::{
    require, AccessError, CallerError, CallerId, DirectoryError, IdentityDirectory, Role, UserId,
};
use crate::notifications::{Notice, Notifier};

/// Admin decision payload as sent by the review console.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecisionRequest {
    #[serde(default)]
    pub verification_status: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

/// Review-queue query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub all: Option<String>,
}

impl ListQuery {
    pub fn filter(&self) -> Result<VerificationFilter, FieldErrors> {
        let show_all = self
            .all
            .as_deref()
            .is_some_and(|raw| raw.trim().eq_ignore_ascii_case("true"));
        if show_all {
            return Ok(VerificationFilter::All);
        }
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(VerificationFilter::default()),
            Some(raw) => VerificationStatus::parse(raw)
                .map(VerificationFilter::Status)
                .ok_or_else(|| {
                    FieldErrors::single("status", format!("Unknown verification status: {raw}"))
                }),
        }
    }
}

/// Caregiver document submission and admin review.
pub struct VerificationService {
    directory: Arc<dyn IdentityDirectory>,
    repository: Arc<dyn VerificationRepository>,
    documents: Arc<dyn DocumentStore>,
    notifier: Arc<dyn Notifier>,
    policy: DocumentPolicy,
}

impl VerificationService {
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        repository: Arc<dyn VerificationRepository>,
        documents: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
        policy: DocumentPolicy,
    ) -> Self {
        Self {
            directory,
            repository,
            documents,
            notifier,
            policy,
        }
    }

    pub fn policy(&self) -> DocumentPolicy {
        self.policy
    }

    /// Submit the three documents, creating a pending record.
    pub fn submit(
        &self,
        caller: CallerId,
        documents: DocumentSet,
    ) -> Result<CaregiverVerification, VerificationError> {
        let caregiver = require(self.directory.as_ref(), caller, Role::Caregiver)?;

        if let Some(existing) = self.repository.fetch_for_user(caregiver.id)? {
            ensure_open_for_submission(existing.status)?;
        }

        self.policy
            .check_set(&documents)
            .map_err(VerificationError::Invalid)?;

        let stored = self.store_documents(caregiver.id, &documents)?;
        let keys: Vec<String> = stored.iter().map(|document| document.key.clone()).collect();
        let [citizenship_front, citizenship_back, certificate]: [_; 3] =
            stored.try_into().map_err(|_| {
                self.discard(&keys);
                StorageError::Unavailable("incomplete document set".to_string())
            })?;

        let submitted = self
            .repository
            .submit(NewVerification {
                user_id: caregiver.id,
                citizenship_front,
                citizenship_back,
                certificate,
                uploaded_at: Utc::now(),
            })
            .map_err(|err| {
                self.discard(&keys);
                match err {
                    RepositoryError::Locked(status) => submission_conflict(status),
                    other => other.into(),
                }
            })?;
        let record = submitted.record;
        if let Some(replaced) = submitted.replaced {
            let stale: Vec<String> = DocumentSlot::ALL
                .into_iter()
                .map(|slot| replaced.document(slot).key.clone())
                .collect();
            self.discard(&stale);
        }

        info!(
            user_id = %caregiver.id,
            verification_id = %record.id,
            "verification documents submitted"
        );
        Ok(record)
    }

    /// Stores every slot; a partial set is removed again before the error is returned.
    fn store_documents(
        &self,
        owner: UserId,
        documents: &DocumentSet,
    ) -> Result<Vec<StoredDocument>, VerificationError> {
        let mut stored: Vec<StoredDocument> = Vec::with_capacity(DocumentSlot::ALL.len());
        for slot in DocumentSlot::ALL {
            let result = match documents.get(slot) {
                Some(upload) => self
                    .documents
                    .store(storage_key(slot, owner, &upload.file_name), upload)
                    .map_err(VerificationError::from),
                None => Err(VerificationError::Invalid(missing(slot))),
            };
            match result {
                Ok(document) => stored.push(document),
                Err(err) => {
                    let keys: Vec<String> =
                        stored.iter().map(|document| document.key.clone()).collect();
                    self.discard(&keys);
                    return Err(err);
                }
            }
        }
        Ok(stored)
    }

    /// Best-effort removal of objects no record points at.
    fn discard(&self, keys: &[String]) {
        for key in keys {
            if let Err(err) = self.documents.remove(key) {
                warn!(key = %key, error = %err, "orphaned document not removed");
            }
        }
    }

    /// Current record for the calling caregiver, or the upload prompt.
    pub fn status(&self, caller: CallerId) -> Result<VerificationStatusView, VerificationError> {
        let caregiver = require(self.directory.as_ref(), caller, Role::Caregiver)?;
        let record = self.repository.fetch_for_user(caregiver.id)?;
        Ok(VerificationStatusView::from_record(record.as_ref()))
    }

    pub fn list(
        &self,
        caller: CallerId,
        query: &ListQuery,
    ) -> Result<AdminVerificationList, VerificationError> {
        require(self.directory.as_ref(), caller, Role::Admin)?;
        let filter = query.filter().map_err(VerificationError::Invalid)?;
        let records = self.repository.list(filter)?;
        let views = records
            .iter()
            .map(|record| self.admin_view(record))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(views.into())
    }

    /// Approve or reject a pending record, then queue the caregiver notice.
    pub fn decide(
        &self,
        caller: CallerId,
        id: VerificationId,
        request: DecisionRequest,
    ) -> Result<AdminVerificationView, VerificationError> {
        let admin = require(self.directory.as_ref(), caller, Role::Admin)?;

        let current = self
            .repository
            .fetch(id)?
            .ok_or(VerificationError::NotFound(id))?;

        let status = request
            .verification_status
            .as_deref()
            .and_then(VerificationStatus::parse)
            .filter(|status| *status != VerificationStatus::Pending)
            .ok_or_else(|| {
                VerificationError::Invalid(FieldErrors::single(
                    "verification_status",
                    "Status must be 'approved' or 'rejected'",
                ))
            })?;

        if current.status != VerificationStatus::Pending {
            return Err(already_decided(current.status));
        }

        let reason = request
            .rejection_reason
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        let decision = match status {
            VerificationStatus::Rejected if reason.is_empty() => {
                return Err(VerificationError::Invalid(FieldErrors::single(
                    "rejection_reason",
                    "Rejection reason is required",
                )));
            }
            VerificationStatus::Rejected => Decision::Reject { reason },
            _ => Decision::Approve,
        };

        let ruling = Ruling {
            decision,
            admin: admin.id,
            decided_at: Utc::now(),
        };
        let record = self
            .repository
            .decide(id, &ruling)
            .map_err(|err| match err {
                RepositoryError::AlreadyDecided(status) => already_decided(status),
                RepositoryError::NotFound => VerificationError::NotFound(id),
                other => other.into(),
            })?;

        info!(
            verification_id = %record.id,
            user_id = %record.user_id,
            admin_id = %admin.id,
            status = %record.status,
            "verification decided"
        );
        self.dispatch_notice(&record);

        self.admin_view(&record)
    }

    fn dispatch_notice(&self, record: &CaregiverVerification) {
        let caregiver = match self.directory.fetch_user(record.user_id) {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(user_id = %record.user_id, "caregiver missing, verification notice skipped");
                return;
            }
            Err(err) => {
                warn!(user_id = %record.user_id, error = %err, "verification notice skipped");
                return;
            }
        };
        let notice = Notice::VerificationDecided {
            email: caregiver.email,
            username: caregiver.username,
            status: record.status,
            rejection_reason: record.rejection_reason.clone(),
        };
        if let Err(err) = self.notifier.notify(notice) {
            warn!(verification_id = %record.id, error = %err, "verification notice not queued");
        }
    }

    fn admin_view(
        &self,
        record: &CaregiverVerification,
    ) -> Result<AdminVerificationView, VerificationError> {
        let owner = self.directory.fetch_user(record.user_id)?;
        let owner_profile = self.directory.fetch_profile(record.user_id)?;
        let verified_by = match record.verified_by {
            Some(admin) => self.directory.fetch_user(admin)?,
            None => None,
        };
        Ok(AdminVerificationView::new(
            record,
            owner.as_ref(),
            owner_profile.as_ref(),
            verified_by.as_ref(),
        ))
    }
}

fn ensure_open_for_submission(status: VerificationStatus) -> Result<(), VerificationError> {
    match status {
        VerificationStatus::Rejected => Ok(()),
        locked => Err(submission_conflict(locked)),
    }
}

fn submission_conflict(status: VerificationStatus) -> VerificationError {
    let message = match status {
        VerificationStatus::Approved => "Your account is already verified",
        _ => "You have a pending verification request",
    };
    VerificationError::Conflict(message.to_string())
}

fn already_decided(status: VerificationStatus) -> VerificationError {
    VerificationError::Conflict(format!("This verification has already been {status}"))
}

fn missing(slot: DocumentSlot) -> FieldErrors {
    FieldErrors::single(
        "documents",
        format!("Missing required documents: {}", slot.field_name()),
    )
}

/// Error raised by the verification service.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("invalid request: {0}")]
    Invalid(FieldErrors),
    #[error("verification {0} not found")]
    NotFound(VerificationId),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<CallerError> for VerificationError {
    fn from(value: CallerError) -> Self {
        match value {
            CallerError::Access(err) => Self::Access(err),
            CallerError::Directory(err) => Self::Directory(err),
        }
    }
}

impl IntoResponse for VerificationError {
    fn into_response(self) -> Response {
        match self {
            VerificationError::Access(err) => err.into_response(),
            VerificationError::Invalid(errors) => validation_response(&errors),
            VerificationError::NotFound(_) => {
                error_response(StatusCode::NOT_FOUND, "Verification request not found")
            }
            VerificationError::Conflict(message) => error_response(StatusCode::CONFLICT, message),
            other => {
                error!(error = %other, "verification request failed");
                internal_response("Verification request failed", other)
            }
        }
    }
}
