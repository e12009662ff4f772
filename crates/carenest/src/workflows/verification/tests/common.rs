use std::collections::BTreeSet;
use std::sync::Arc;

use crate::identity::{Role, User, UserId};
use crate::memory::{InMemoryDocumentStore, InMemoryStore};
use crate::notifications::Notifier;
use crate::testing::{png_bytes, recording_notifier, seed_user, RecordingNotifier};
use crate::workflows::verification::{
    verification_router, CaregiverVerification, DecisionRequest, DocumentPolicy, DocumentSet,
    DocumentSlot, DocumentUpload, NewVerification, RepositoryError, Ruling, Submitted,
    VerificationFilter, VerificationId, VerificationRepository, VerificationService,
    VerificationStatus,
};

pub(super) struct Harness {
    pub(super) store: InMemoryStore,
    pub(super) documents: InMemoryDocumentStore,
    pub(super) notices: Arc<RecordingNotifier>,
    pub(super) service: Arc<VerificationService>,
}

impl Harness {
    pub(super) fn new() -> Self {
        let notices = recording_notifier();
        Self::with_notifier(notices.clone(), notices)
    }

    pub(super) fn with_notifier(
        notices: Arc<RecordingNotifier>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let store = InMemoryStore::new();
        let documents = InMemoryDocumentStore::new("http://media.test");
        let service = Arc::new(VerificationService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(documents.clone()),
            notifier,
            DocumentPolicy::default(),
        ));
        Self {
            store,
            documents,
            notices,
            service,
        }
    }

    pub(super) fn caregiver(&self, username: &str) -> User {
        seed_user(&self.store, username, Role::Caregiver)
    }

    pub(super) fn admin(&self) -> User {
        seed_user(&self.store, "reviewer", Role::Admin)
    }

    pub(super) fn router(&self) -> axum::Router {
        verification_router(self.service.clone())
    }
}

pub(super) fn valid_documents() -> DocumentSet {
    DocumentSet::new()
        .with(
            DocumentSlot::CitizenshipFront,
            DocumentUpload::new("front.png", png_bytes()),
        )
        .with(
            DocumentSlot::CitizenshipBack,
            DocumentUpload::new("back.png", png_bytes()),
        )
        .with(
            DocumentSlot::Certificate,
            DocumentUpload::new("certificate.png", png_bytes()),
        )
}

pub(super) fn approve() -> DecisionRequest {
    DecisionRequest {
        verification_status: Some("approved".to_string()),
        rejection_reason: None,
    }
}

pub(super) fn reject(reason: Option<&str>) -> DecisionRequest {
    DecisionRequest {
        verification_status: Some("rejected".to_string()),
        rejection_reason: reason.map(str::to_string),
    }
}

/// Repository that fails every call.
pub(super) struct UnavailableRepository;

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

impl VerificationRepository for UnavailableRepository {
    fn fetch(&self, _id: VerificationId) -> Result<Option<CaregiverVerification>, RepositoryError> {
        Err(offline())
    }

    fn fetch_for_user(
        &self,
        _user_id: UserId,
    ) -> Result<Option<CaregiverVerification>, RepositoryError> {
        Err(offline())
    }

    fn submit(&self, _new: NewVerification) -> Result<Submitted, RepositoryError> {
        Err(offline())
    }

    fn decide(
        &self,
        _id: VerificationId,
        _ruling: &Ruling,
    ) -> Result<CaregiverVerification, RepositoryError> {
        Err(offline())
    }

    fn list(
        &self,
        _filter: VerificationFilter,
    ) -> Result<Vec<CaregiverVerification>, RepositoryError> {
        Err(offline())
    }

    fn approved_caregivers(&self) -> Result<BTreeSet<UserId>, RepositoryError> {
        Err(offline())
    }
}

/// Repository whose record appears only after the caller's pre-check.
pub(super) struct LostRaceRepository;

impl VerificationRepository for LostRaceRepository {
    fn fetch(&self, _id: VerificationId) -> Result<Option<CaregiverVerification>, RepositoryError> {
        Ok(None)
    }

    fn fetch_for_user(
        &self,
        _user_id: UserId,
    ) -> Result<Option<CaregiverVerification>, RepositoryError> {
        Ok(None)
    }

    fn submit(&self, _new: NewVerification) -> Result<Submitted, RepositoryError> {
        Err(RepositoryError::Locked(VerificationStatus::Pending))
    }

    fn decide(
        &self,
        _id: VerificationId,
        _ruling: &Ruling,
    ) -> Result<CaregiverVerification, RepositoryError> {
        Err(RepositoryError::NotFound)
    }

    fn list(
        &self,
        _filter: VerificationFilter,
    ) -> Result<Vec<CaregiverVerification>, RepositoryError> {
        Ok(Vec::new())
    }

    fn approved_caregivers(&self) -> Result<BTreeSet<UserId>, RepositoryError> {
        Ok(BTreeSet::new())
    }
}

/// Multipart body with one part per `(field, file name, bytes)`.
pub(super) fn multipart_body(parts: &[(&str, &str, Vec<u8>)]) -> (String, Vec<u8>) {
    let boundary = "carenest-test-boundary";
    let mut body = Vec::new();
    for (field, file_name, bytes) in parts {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

pub(super) fn valid_parts() -> Vec<(&'static str, &'static str, Vec<u8>)> {
    vec![
        ("citizenship_front", "front.png", png_bytes()),
        ("citizenship_back", "back.jpg", png_bytes()),
        ("certificate", "certificate.webp", png_bytes()),
    ]
}
