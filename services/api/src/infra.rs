use carenest::config::AppConfig;
use carenest::identity::{AccountService, AccountSettings};
use carenest::memory::{InMemoryDocumentStore, InMemoryStore};
use carenest::notifications::{Notice, Notifier, NotifyError};
use carenest::workflows::booking::BookingService;
use carenest::workflows::verification::{DocumentPolicy, VerificationService};
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Services wired over one shared in-memory store.
#[derive(Clone)]
pub(crate) struct Marketplace {
    pub(crate) documents: InMemoryDocumentStore,
    pub(crate) accounts: Arc<AccountService>,
    pub(crate) verifications: Arc<VerificationService>,
    pub(crate) bookings: Arc<BookingService>,
}

impl Marketplace {
    pub(crate) fn in_memory(config: &AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        let store = InMemoryStore::new();
        let documents = InMemoryDocumentStore::new(config.uploads.media_base_url.clone());

        let policy = DocumentPolicy {
            max_bytes: config.uploads.max_document_bytes,
        };

        let accounts = Arc::new(AccountService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(documents.clone()),
            notifier.clone(),
            AccountSettings {
                otp_ttl: config.accounts.otp_ttl(),
                profile_images: policy,
            },
        ));
        let verifications = Arc::new(VerificationService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(documents.clone()),
            notifier,
            policy,
        ));
        let bookings = Arc::new(BookingService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store),
        ));

        Self {
            documents,
            accounts,
            verifications,
            bookings,
        }
    }
}

/// Notifier that keeps notices in memory; used by the CLI demo.
#[derive(Default, Clone)]
pub(crate) struct InMemoryNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl Notifier for InMemoryNotifier {
    fn notify(&self, notice: Notice) -> Result<(), NotifyError> {
        let mut guard = self
            .notices
            .lock()
            .map_err(|_| NotifyError::QueueClosed)?;
        guard.push(notice);
        Ok(())
    }
}

impl InMemoryNotifier {
    pub(crate) fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|notices| notices.clone())
            .unwrap_or_default()
    }

    /// Most recent passcode sent to `email`.
    pub(crate) fn latest_code(&self, email: &str) -> Option<String> {
        self.notices().into_iter().rev().find_map(|notice| match notice {
            Notice::OneTimePasscode {
                email: recipient,
                code,
                ..
            } if recipient == email => Some(code),
            _ => None,
        })
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
