use std::sync::Arc;

use chrono::Duration;

use crate::identity::{account_router, AccountService, AccountSettings, RegistrationRequest, User};
use crate::memory::{InMemoryDocumentStore, InMemoryStore};
use crate::notifications::Notice;
use crate::testing::{recording_notifier, RecordingNotifier};

pub(super) const OTP_TTL_MINUTES: i64 = 10;

pub(super) struct Harness {
    pub(super) store: InMemoryStore,
    pub(super) media: InMemoryDocumentStore,
    pub(super) notices: Arc<RecordingNotifier>,
    pub(super) service: Arc<AccountService>,
}

impl Harness {
    pub(super) fn new() -> Self {
        let store = InMemoryStore::new();
        let media = InMemoryDocumentStore::new("http://media.test");
        let notices = recording_notifier();
        let service = Arc::new(AccountService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(media.clone()),
            notices.clone(),
            AccountSettings {
                otp_ttl: Duration::minutes(OTP_TTL_MINUTES),
                ..AccountSettings::default()
            },
        ));
        Self {
            store,
            media,
            notices,
            service,
        }
    }

    pub(super) fn register(&self, username: &str, role: &str) -> User {
        self.service
            .register(registration(username, role))
            .expect("registered")
    }

    /// Last passcode mailed to `email`.
    pub(super) fn issued_code(&self, email: &str) -> String {
        self.notices
            .notices()
            .into_iter()
            .rev()
            .find_map(|notice| match notice {
                Notice::OneTimePasscode {
                    email: recipient,
                    code,
                    ..
                } if recipient == email => Some(code),
                _ => None,
            })
            .expect("passcode issued")
    }

    pub(super) fn router(&self) -> axum::Router {
        account_router(self.service.clone())
    }
}

pub(super) fn registration(username: &str, role: &str) -> RegistrationRequest {
    RegistrationRequest {
        email: Some(format!("{username}@CareNest.test")),
        username: Some(username.to_string()),
        role: Some(role.to_string()),
    }
}
