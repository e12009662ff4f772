//! In-process store backing every repository trait.
//!
//! All tables live behind one mutex, so each check-then-act repository call runs as a
//! single critical section.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::identity::{
    CaregiverProfile, DirectoryError, IdentityDirectory, NewUser, User, UserId, UserProfile,
};
use crate::workflows::booking::{
    Booking, BookingDecision, BookingId, BookingRepository, BookingStatus, NewBooking,
    RepositoryError as BookingRepositoryError,
};
use crate::workflows::verification::documents::content_type_for;
use crate::workflows::verification::{
    CaregiverVerification, DocumentStore, DocumentUpload, NewVerification,
    RepositoryError as VerificationRepositoryError, Ruling, StorageError, StoredDocument,
    Submitted, VerificationFilter, VerificationId, VerificationRepository, VerificationStatus,
};

#[derive(Default)]
struct StoreState {
    last_user_id: u64,
    users: BTreeMap<UserId, User>,
    profiles: BTreeMap<UserId, UserProfile>,
    caregiver_profiles: BTreeMap<UserId, CaregiverProfile>,
    last_verification_id: u64,
    verifications: BTreeMap<VerificationId, CaregiverVerification>,
    last_booking_id: u64,
    bookings: BTreeMap<BookingId, Booking>,
}

impl StoreState {
    fn verification_for(&self, user_id: UserId) -> Option<&CaregiverVerification> {
        self.verifications
            .values()
            .find(|record| record.user_id == user_id)
    }

    fn bookings_where(&self, predicate: impl Fn(&Booking) -> bool) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .values()
            .filter(|booking| predicate(booking))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        bookings
    }
}

/// Mutex poisoning surfaced as an unavailable store.
struct Poisoned;

impl From<Poisoned> for DirectoryError {
    fn from(_: Poisoned) -> Self {
        DirectoryError::Unavailable("store mutex poisoned".to_string())
    }
}

impl From<Poisoned> for VerificationRepositoryError {
    fn from(_: Poisoned) -> Self {
        VerificationRepositoryError::Unavailable("store mutex poisoned".to_string())
    }
}

impl From<Poisoned> for BookingRepositoryError {
    fn from(_: Poisoned) -> Self {
        BookingRepositoryError::Unavailable("store mutex poisoned".to_string())
    }
}

/// Users, profiles, verifications and bookings held in memory.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, Poisoned> {
        self.state.lock().map_err(|_| Poisoned)
    }
}

impl IdentityDirectory for InMemoryStore {
    fn insert_user(&self, user: NewUser) -> Result<User, DirectoryError> {
        let mut state = self.lock()?;
        if state.users.values().any(|existing| existing.email == user.email) {
            return Err(DirectoryError::DuplicateEmail);
        }
        if state
            .users
            .values()
            .any(|existing| existing.username == user.username)
        {
            return Err(DirectoryError::DuplicateUsername);
        }

        state.last_user_id += 1;
        let record = User {
            id: UserId(state.last_user_id),
            email: user.email,
            username: user.username,
            role: user.role,
            is_active: true,
            is_admin: user.is_admin,
            is_verified: user.is_verified,
            otp: user.otp,
            otp_created_at: user.otp_created_at,
            created_at: user.created_at,
        };
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    fn fetch_user(&self, id: UserId) -> Result<Option<User>, DirectoryError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let state = self.lock()?;
        Ok(state
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    fn update_user(&self, user: User) -> Result<(), DirectoryError> {
        let mut state = self.lock()?;
        match state.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user;
                Ok(())
            }
            None => Err(DirectoryError::NotFound),
        }
    }

    fn fetch_profile(&self, id: UserId) -> Result<Option<UserProfile>, DirectoryError> {
        Ok(self.lock()?.profiles.get(&id).cloned())
    }

    fn save_profile(&self, profile: UserProfile) -> Result<(), DirectoryError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&profile.user_id) {
            return Err(DirectoryError::NotFound);
        }
        state.profiles.insert(profile.user_id, profile);
        Ok(())
    }

    fn fetch_caregiver_profile(
        &self,
        id: UserId,
    ) -> Result<Option<CaregiverProfile>, DirectoryError> {
        Ok(self.lock()?.caregiver_profiles.get(&id).cloned())
    }

    fn save_caregiver_profile(&self, profile: CaregiverProfile) -> Result<(), DirectoryError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&profile.user_id) {
            return Err(DirectoryError::NotFound);
        }
        state.caregiver_profiles.insert(profile.user_id, profile);
        Ok(())
    }

    fn caregiver_profiles(&self) -> Result<Vec<CaregiverProfile>, DirectoryError> {
        Ok(self.lock()?.caregiver_profiles.values().cloned().collect())
    }
}

impl VerificationRepository for InMemoryStore {
    fn fetch(
        &self,
        id: VerificationId,
    ) -> Result<Option<CaregiverVerification>, VerificationRepositoryError> {
        Ok(self.lock()?.verifications.get(&id).cloned())
    }

    fn fetch_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<CaregiverVerification>, VerificationRepositoryError> {
        Ok(self.lock()?.verification_for(user_id).cloned())
    }

    fn submit(&self, new: NewVerification) -> Result<Submitted, VerificationRepositoryError> {
        let mut state = self.lock()?;
        let mut replaced = None;
        if let Some(existing) = state.verification_for(new.user_id) {
            if existing.status != VerificationStatus::Rejected {
                return Err(VerificationRepositoryError::Locked(existing.status));
            }
            let stale = existing.id;
            replaced = state.verifications.remove(&stale);
        }

        state.last_verification_id += 1;
        let record = new.into_record(VerificationId(state.last_verification_id));
        state.verifications.insert(record.id, record.clone());
        Ok(Submitted { record, replaced })
    }

    fn decide(
        &self,
        id: VerificationId,
        ruling: &Ruling,
    ) -> Result<CaregiverVerification, VerificationRepositoryError> {
        let mut state = self.lock()?;
        let record = state
            .verifications
            .get_mut(&id)
            .ok_or(VerificationRepositoryError::NotFound)?;
        record
            .apply(ruling)
            .map_err(VerificationRepositoryError::AlreadyDecided)?;
        Ok(record.clone())
    }

    fn list(
        &self,
        filter: VerificationFilter,
    ) -> Result<Vec<CaregiverVerification>, VerificationRepositoryError> {
        let state = self.lock()?;
        let mut records: Vec<CaregiverVerification> = match filter {
            VerificationFilter::All => state.verifications.values().cloned().collect(),
            VerificationFilter::Status(status) => state
                .verifications
                .values()
                .filter(|record| record.status == status)
                .cloned()
                .collect(),
        };
        match filter {
            VerificationFilter::All => records.sort_by(|a, b| {
                b.uploaded_at
                    .cmp(&a.uploaded_at)
                    .then_with(|| b.id.cmp(&a.id))
            }),
            VerificationFilter::Status(_) => records.sort_by(|a, b| {
                a.uploaded_at
                    .cmp(&b.uploaded_at)
                    .then_with(|| a.id.cmp(&b.id))
            }),
        }
        Ok(records)
    }

    fn approved_caregivers(&self) -> Result<BTreeSet<UserId>, VerificationRepositoryError> {
        let state = self.lock()?;
        Ok(state
            .verifications
            .values()
            .filter(|record| record.status == VerificationStatus::Approved)
            .map(|record| record.user_id)
            .collect())
    }
}

impl BookingRepository for InMemoryStore {
    fn fetch(&self, id: BookingId) -> Result<Option<Booking>, BookingRepositoryError> {
        Ok(self.lock()?.bookings.get(&id).cloned())
    }

    fn create(&self, new: NewBooking) -> Result<Booking, BookingRepositoryError> {
        let mut state = self.lock()?;
        let duplicate = state.bookings.values().any(|booking| {
            booking.family_id == new.family_id
                && booking.caregiver_id == new.caregiver_id
                && booking.status.is_active()
        });
        if duplicate {
            return Err(BookingRepositoryError::DuplicateActive);
        }

        state.last_booking_id += 1;
        let booking = new.into_record(BookingId(state.last_booking_id));
        state.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    fn respond(
        &self,
        id: BookingId,
        caregiver: UserId,
        decision: BookingDecision,
    ) -> Result<Booking, BookingRepositoryError> {
        let mut state = self.lock()?;
        let current = state
            .bookings
            .get(&id)
            .filter(|booking| booking.caregiver_id == caregiver)
            .ok_or(BookingRepositoryError::NotFound)?;
        if current.status != BookingStatus::Pending {
            return Err(BookingRepositoryError::AlreadyDecided(current.status));
        }

        if decision == BookingDecision::Accept {
            let engaged = state.bookings.values().any(|booking| {
                booking.id != id
                    && booking.caregiver_id == caregiver
                    && booking.status == BookingStatus::Accepted
            });
            if engaged {
                return Err(BookingRepositoryError::CaregiverEngaged);
            }
        }

        let booking = state
            .bookings
            .get_mut(&id)
            .ok_or(BookingRepositoryError::NotFound)?;
        booking
            .respond(decision)
            .map_err(BookingRepositoryError::AlreadyDecided)?;
        Ok(booking.clone())
    }

    fn list_for_family(&self, family: UserId) -> Result<Vec<Booking>, BookingRepositoryError> {
        let state = self.lock()?;
        Ok(state.bookings_where(|booking| booking.family_id == family))
    }

    fn list_for_caregiver(
        &self,
        caregiver: UserId,
    ) -> Result<Vec<Booking>, BookingRepositoryError> {
        let state = self.lock()?;
        Ok(state.bookings_where(|booking| booking.caregiver_id == caregiver))
    }

    fn active_caregivers_for(
        &self,
        family: UserId,
    ) -> Result<BTreeSet<UserId>, BookingRepositoryError> {
        let state = self.lock()?;
        Ok(state
            .bookings
            .values()
            .filter(|booking| booking.family_id == family && booking.status.is_active())
            .map(|booking| booking.caregiver_id)
            .collect())
    }
}

/// Keeps uploaded bytes in memory and resolves URLs under a media base URL.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    base_url: String,
    objects: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryDocumentStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Arc::default(),
        }
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn objects(&self) -> Result<MutexGuard<'_, BTreeMap<String, Vec<u8>>>, StorageError> {
        self.objects
            .lock()
            .map_err(|_| StorageError::Unavailable("document store mutex poisoned".to_string()))
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn store(&self, key: String, upload: &DocumentUpload) -> Result<StoredDocument, StorageError> {
        self.objects()?.insert(key.clone(), upload.bytes.clone());
        Ok(StoredDocument {
            url: format!("{}/{}", self.base_url, key),
            content_type: content_type_for(&upload.file_name),
            size_bytes: upload.size(),
            key,
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.objects()?.remove(key);
        Ok(())
    }
}
