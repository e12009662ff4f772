use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde_json::json;

use crate::identity::{Gender, Role, User};
use crate::memory::InMemoryStore;
use crate::testing::{seed_caregiver, seed_user};
use crate::workflows::booking::{booking_router, BookingRequest, BookingService};
use crate::workflows::verification::{
    Decision, NewVerification, Ruling, StoredDocument, VerificationRepository,
};

pub(super) struct Harness {
    pub(super) store: InMemoryStore,
    pub(super) service: Arc<BookingService>,
}

impl Harness {
    pub(super) fn new() -> Self {
        let store = InMemoryStore::new();
        let service = Arc::new(BookingService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
        ));
        Self { store, service }
    }

    pub(super) fn family(&self, username: &str) -> User {
        seed_user(&self.store, username, Role::Careseeker)
    }

    /// Caregiver offering bathing and mobility, with approved documents.
    pub(super) fn verified_caregiver(&self, username: &str) -> User {
        let caregiver = self.unverified_caregiver(username, "Lalitpur", Some(Gender::Female));
        self.approve(&caregiver);
        caregiver
    }

    pub(super) fn unverified_caregiver(
        &self,
        username: &str,
        address: &str,
        gender: Option<Gender>,
    ) -> User {
        seed_caregiver(
            &self.store,
            username,
            &["bathing", "mobility"],
            address,
            gender,
        )
    }

    pub(super) fn submit_documents(&self, caregiver: &User) {
        self.store
            .submit(NewVerification {
                user_id: caregiver.id,
                citizenship_front: document("front"),
                citizenship_back: document("back"),
                certificate: document("certificate"),
                uploaded_at: Utc::now(),
            })
            .expect("documents submitted");
    }

    pub(super) fn approve(&self, caregiver: &User) {
        self.submit_documents(caregiver);
        let record = self
            .store
            .fetch_for_user(caregiver.id)
            .expect("fetch")
            .expect("record");
        self.store
            .decide(
                record.id,
                &Ruling {
                    decision: Decision::Approve,
                    admin: crate::identity::UserId(0),
                    decided_at: Utc::now(),
                },
            )
            .expect("approved");
    }

    pub(super) fn router(&self) -> axum::Router {
        booking_router(self.service.clone())
    }
}

fn document(name: &str) -> StoredDocument {
    StoredDocument {
        key: format!("verification/{name}.png"),
        url: format!("http://media.test/verification/{name}.png"),
        content_type: "image/png".to_string(),
        size_bytes: 64,
    }
}

pub(super) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub(super) fn tomorrow() -> NaiveDate {
    today() + Duration::days(1)
}

/// Valid request for `bathing`, tomorrow at 09:00 for two hours.
pub(super) fn request_for(caregiver: &User) -> BookingRequest {
    serde_json::from_value(payload_for(caregiver)).expect("payload deserializes")
}

pub(super) fn payload_for(caregiver: &User) -> serde_json::Value {
    json!({
        "caregiver": caregiver.id,
        "service_types": ["bathing"],
        "person_name": "Grandmother",
        "person_age": 81,
        "date": tomorrow().format("%Y-%m-%d").to_string(),
        "start_time": "09:00",
        "duration_hours": 2,
        "emergency_contact_name": "Ramesh",
        "emergency_contact_phone": "9800000000",
        "additional_info": "Uses a walker",
    })
}
