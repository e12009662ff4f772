//! End-to-end scenarios driven through the public HTTP routers: onboarding, document
//! verification and booking, wired over the in-memory store.

mod common {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use axum::body::Body;
    use axum::http::{header, Request, Response};
    use axum::Router;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use serde_json::Value;
    use tower::ServiceExt;

    use carenest::identity::{
        account_router, AccountService, AccountSettings, User, CALLER_HEADER,
    };
    use carenest::memory::{InMemoryDocumentStore, InMemoryStore};
    use carenest::notifications::{Notice, Notifier, NotifyError};
    use carenest::workflows::booking::{booking_router, BookingService};
    use carenest::workflows::verification::{
        verification_router, DocumentPolicy, VerificationService,
    };

    #[derive(Default)]
    pub struct Outbox {
        notices: Mutex<Vec<Notice>>,
    }

    impl Outbox {
        pub fn notices(&self) -> Vec<Notice> {
            self.notices.lock().expect("outbox mutex").clone()
        }

        pub fn code_for(&self, email: &str) -> String {
            self.notices()
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
                .expect("passcode mailed")
        }
    }

    impl Notifier for Outbox {
        fn notify(&self, notice: Notice) -> Result<(), NotifyError> {
            self.notices.lock().expect("outbox mutex").push(notice);
            Ok(())
        }
    }

    pub struct Marketplace {
        pub outbox: Arc<Outbox>,
        pub documents: InMemoryDocumentStore,
        pub accounts: Arc<AccountService>,
        router: Router,
    }

    impl Marketplace {
        pub fn new() -> Self {
            let store = InMemoryStore::new();
            let documents = InMemoryDocumentStore::new("http://media.test");
            let outbox = Arc::new(Outbox::default());

            let accounts = Arc::new(AccountService::new(
                Arc::new(store.clone()),
                Arc::new(store.clone()),
                Arc::new(documents.clone()),
                outbox.clone(),
                AccountSettings::default(),
            ));
            let verifications = Arc::new(VerificationService::new(
                Arc::new(store.clone()),
                Arc::new(store.clone()),
                Arc::new(documents.clone()),
                outbox.clone(),
                DocumentPolicy::default(),
            ));
            let bookings = Arc::new(BookingService::new(
                Arc::new(store.clone()),
                Arc::new(store.clone()),
                Arc::new(store),
            ));

            let router = account_router(accounts.clone())
                .merge(verification_router(verifications))
                .merge(booking_router(bookings));

            Self {
                outbox,
                documents,
                accounts,
                router,
            }
        }

        pub fn admin(&self) -> User {
            self.accounts
                .bootstrap_admin("reviewer@carenest.test", "reviewer")
                .expect("admin seeded")
        }

        pub async fn send(&self, request: Request<Body>) -> (u16, Value) {
            let response = self
                .router
                .clone()
                .oneshot(request)
                .await
                .expect("route responds");
            let status = response.status().as_u16();
            (status, json_body(response).await)
        }

        pub async fn json(
            &self,
            method: &str,
            uri: &str,
            caller: Option<&Value>,
            payload: Value,
        ) -> (u16, Value) {
            let mut builder = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json");
            if let Some(caller) = caller {
                builder = builder.header(CALLER_HEADER, caller.to_string());
            }
            self.send(
                builder
                    .body(Body::from(payload.to_string()))
                    .expect("request builds"),
            )
            .await
        }

        pub async fn get(&self, uri: &str, caller: &Value) -> (u16, Value) {
            self.send(
                Request::get(uri)
                    .header(CALLER_HEADER, caller.to_string())
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
        }

        pub async fn upload(&self, caller: &Value) -> (u16, Value) {
            let boundary = "carenest-boundary";
            let mut body = Vec::new();
            for name in ["citizenship_front", "citizenship_back", "certificate"] {
                body.extend_from_slice(
                    format!(
                        "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                         filename=\"{name}.png\"\r\nContent-Type: image/png\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(&png());
                body.extend_from_slice(b"\r\n");
            }
            body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

            self.send(
                Request::post("/api/verifications/upload-document")
                    .header(CALLER_HEADER, caller.to_string())
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .expect("request builds"),
            )
            .await
        }

        pub async fn upload_profile_image(&self, caller: &Value) -> (u16, Value) {
            let boundary = "carenest-profile";
            let mut body = format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"profile_image\"; \
                 filename=\"portrait.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .into_bytes();
            body.extend_from_slice(&png());
            body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

            self.send(
                Request::put("/api/user/profile/image")
                    .header(CALLER_HEADER, caller.to_string())
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .expect("request builds"),
            )
            .await
        }
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json payload")
    }

    fn png() -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(8, 8))
            .write_to(&mut buffer, ImageFormat::Png)
            .expect("png encodes");
        buffer.into_inner()
    }
}

use chrono::{Duration, Local};
use serde_json::{json, Value};

use common::Marketplace;

/// Registers through the API and confirms the mailed passcode; returns the user id.
async fn onboard(market: &Marketplace, username: &str, role: &str) -> Value {
    let email = format!("{username}@carenest.test");
    let (status, body) = market
        .json(
            "POST",
            "/api/user/register",
            None,
            json!({ "email": email, "username": username, "role": role }),
        )
        .await;
    assert_eq!(status, 201, "register {username}: {body}");
    let user_id = body["user_id"].clone();

    let code = market.outbox.code_for(&email);
    let (status, body) = market
        .json(
            "POST",
            "/api/user/verify-otp",
            None,
            json!({ "email": email, "otp": code }),
        )
        .await;
    assert_eq!(status, 200, "verify {username}: {body}");

    user_id
}

fn tomorrow() -> String {
    (Local::now().date_naive() + Duration::days(1))
        .format("%Y-%m-%d")
        .to_string()
}

#[tokio::test]
async fn caregiver_is_verified_then_booked() {
    let market = Marketplace::new();
    let family = onboard(&market, "asha", "careseeker").await;
    let caregiver = onboard(&market, "gita", "caregiver").await;
    let admin = json!(market.admin().id);

    let (status, _) = market
        .json(
            "PATCH",
            "/api/user/profile",
            Some(&caregiver),
            json!({ "address": "Lalitpur", "phone": "9800000001" }),
        )
        .await;
    assert_eq!(status, 200);
    let (status, _) = market
        .json(
            "PATCH",
            "/api/user/profile/caregiver",
            Some(&caregiver),
            json!({ "service_types": ["bathing", "mobility"], "gender": "female" }),
        )
        .await;
    assert_eq!(status, 200);

    let (status, listing) = market.get("/api/bookings/caregivers", &family).await;
    assert_eq!(status, 200);
    assert_eq!(listing, json!([]));

    let (status, record) = market.upload(&caregiver).await;
    assert_eq!(status, 201, "upload: {record}");
    assert_eq!(market.documents.len(), 3);

    let (status, queue) = market.get("/api/verifications/admin/list", &admin).await;
    assert_eq!(status, 200);
    assert_eq!(queue["count"], 1);
    let verification_id = queue["results"][0]["id"].clone();

    let booking = json!({
        "caregiver": caregiver,
        "service_types": ["bathing"],
        "person_name": "Grandmother",
        "person_age": 81,
        "date": tomorrow(),
        "start_time": "09:00",
        "duration_hours": 2,
        "emergency_contact_name": "Ramesh",
        "emergency_contact_phone": "9800000000",
    });
    let (status, _) = market
        .json("POST", "/api/bookings", Some(&family), booking.clone())
        .await;
    assert_eq!(status, 409, "pending caregivers cannot be booked");

    let (status, decided) = market
        .json(
            "PUT",
            &format!("/api/verifications/admin/{verification_id}/verify"),
            Some(&admin),
            json!({ "verification_status": "approved" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(decided["verified_by_email"], "reviewer@carenest.test");

    let (status, listing) = market
        .get("/api/bookings/caregivers?location=lalit", &family)
        .await;
    assert_eq!(status, 200);
    assert_eq!(listing[0]["username"], "gita");
    assert_eq!(listing[0]["has_active_booking"], false);
    assert_eq!(listing[0]["profile_image"], Value::Null);

    let (status, updated) = market.upload_profile_image(&caregiver).await;
    assert_eq!(status, 200, "profile image: {updated}");
    let image_url = updated["data"]["profile_image"].clone();
    assert!(image_url
        .as_str()
        .is_some_and(|url| url.starts_with("http://media.test/profiles/")));
    let (_, listing) = market.get("/api/bookings/caregivers", &family).await;
    assert_eq!(listing[0]["profile_image"], image_url);

    let (status, created) = market
        .json("POST", "/api/bookings", Some(&family), booking.clone())
        .await;
    assert_eq!(status, 201, "booking: {created}");
    let (status, _) = market
        .json("POST", "/api/bookings", Some(&family), booking)
        .await;
    assert_eq!(status, 409);

    let (status, answered) = market
        .json(
            "PUT",
            &format!("/api/bookings/{}/respond", created["id"]),
            Some(&caregiver),
            json!({ "status": "accepted" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(answered["status"], "accepted");

    let (_, listing) = market.get("/api/bookings/caregivers", &family).await;
    assert_eq!(listing[0]["has_active_booking"], true);

    let (status, profile) = market.get("/api/user/profile", &caregiver).await;
    assert_eq!(status, 200);
    assert_eq!(profile["verification_status"], "approved");
}

#[tokio::test]
async fn rejected_caregiver_can_resubmit() {
    let market = Marketplace::new();
    let caregiver = onboard(&market, "gita", "caregiver").await;
    let admin = json!(market.admin().id);

    let (status, first) = market.upload(&caregiver).await;
    assert_eq!(status, 201);

    let (status, _) = market.upload(&caregiver).await;
    assert_eq!(status, 409, "pending record blocks a second upload");

    let (status, _) = market
        .json(
            "PUT",
            &format!("/api/verifications/admin/{}/verify", first["id"]),
            Some(&admin),
            json!({ "verification_status": "rejected", "rejection_reason": "Blurry scan" }),
        )
        .await;
    assert_eq!(status, 200);

    let (status, current) = market.get("/api/verifications/status", &caregiver).await;
    assert_eq!(status, 200);
    assert_eq!(current["verification_status"], "rejected");
    assert_eq!(current["rejection_reason"], "Blurry scan");
    assert_eq!(current["can_reupload"], true);

    let (status, second) = market.upload(&caregiver).await;
    assert_eq!(status, 201);
    assert_eq!(second["verification_status"], "pending");
    assert_eq!(second["rejection_reason"], Value::Null);

    let decided = market
        .outbox
        .notices()
        .iter()
        .filter(|notice| notice.template() == "verification_decided")
        .count();
    assert_eq!(decided, 1);
}
