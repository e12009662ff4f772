//! Fixtures shared by the workflow test modules.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::Utc;
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::Value;

use crate::identity::{
    CaregiverProfile, Gender, IdentityDirectory, NewUser, Role, User, UserProfile,
};
use crate::memory::InMemoryStore;
use crate::notifications::{Notice, Notifier, NotifyError};

/// Seeds an active, e-mail-verified account.
pub(crate) fn seed_user(store: &InMemoryStore, username: &str, role: Role) -> User {
    let user = store
        .insert_user(NewUser {
            email: format!("{username}@carenest.test"),
            username: username.to_string(),
            role,
            is_admin: role == Role::Admin,
            is_verified: true,
            otp: None,
            otp_created_at: None,
            created_at: Utc::now(),
        })
        .expect("user inserted");
    store
        .save_profile(UserProfile {
            user_id: user.id,
            ..UserProfile::default()
        })
        .expect("profile saved");
    user
}

/// Seeds a caregiver with an offer, address and gender.
pub(crate) fn seed_caregiver(
    store: &InMemoryStore,
    username: &str,
    services: &[&str],
    address: &str,
    gender: Option<Gender>,
) -> User {
    let user = seed_user(store, username, Role::Caregiver);
    store
        .save_profile(UserProfile {
            user_id: user.id,
            phone: "555-0101".to_string(),
            address: address.to_string(),
            profile_image: Some(format!("http://media.test/profiles/{username}.png")),
            profile_image_key: Some(format!("profiles/{username}.png")),
        })
        .expect("profile saved");
    store
        .save_caregiver_profile(CaregiverProfile {
            service_types: services.iter().map(|s| s.to_string()).collect(),
            training_authority: "Red Cross".to_string(),
            certification_year: Some(2020),
            available_hours: "weekdays".to_string(),
            bio: format!("{username} has years of home-care experience"),
            gender,
            ..CaregiverProfile::empty(user.id)
        })
        .expect("caregiver profile saved");
    user
}

pub(crate) fn png_bytes() -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(8, 8))
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("png encodes");
    buffer.into_inner()
}

/// Notifier that records every notice it is handed.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub(crate) fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notifier mutex").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) -> Result<(), NotifyError> {
        self.notices.lock().expect("notifier mutex").push(notice);
        Ok(())
    }
}

/// Notifier whose queue is gone.
pub(crate) struct ClosedNotifier;

impl Notifier for ClosedNotifier {
    fn notify(&self, _notice: Notice) -> Result<(), NotifyError> {
        Err(NotifyError::QueueClosed)
    }
}

pub(crate) fn recording_notifier() -> Arc<RecordingNotifier> {
    Arc::new(RecordingNotifier::default())
}

pub(crate) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
