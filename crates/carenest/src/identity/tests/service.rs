use chrono::{Duration, Utc};

use super::common::*;
use crate::identity::{
    AccessError, AccountError, CallerId, CaregiverProfileUpdate, Gender, IdentityDirectory,
    OtpRequest, ProfileUpdate, RegistrationRequest, Role, UserId,
};
use crate::testing::{png_bytes, seed_user};
use crate::workflows::verification::DocumentUpload;

fn otp(email: &str, code: &str) -> OtpRequest {
    OtpRequest {
        email: Some(email.to_string()),
        otp: Some(code.to_string()),
    }
}

#[test]
fn registration_creates_unverified_account_and_mails_code() {
    let harness = Harness::new();

    let user = harness.register("gita", "caregiver");

    assert_eq!(user.email, "gita@carenest.test");
    assert_eq!(user.role, Role::Caregiver);
    assert!(!user.is_verified);
    assert!(!user.may_sign_in());
    let code = harness.issued_code(&user.email);
    assert_eq!(code.len(), 6);
    assert!(harness
        .store
        .fetch_caregiver_profile(user.id)
        .expect("fetch")
        .is_some());
}

#[test]
fn role_defaults_to_careseeker() {
    let harness = Harness::new();

    let user = harness
        .service
        .register(RegistrationRequest {
            role: None,
            ..registration("asha", "")
        })
        .expect("registered");

    assert_eq!(user.role, Role::Careseeker);
}

#[test]
fn registration_reports_every_invalid_field() {
    let harness = Harness::new();

    let err = harness
        .service
        .register(RegistrationRequest {
            email: Some("not-an-email".to_string()),
            username: Some("x".repeat(31)),
            role: Some("admin".to_string()),
        })
        .expect_err("invalid");

    let AccountError::Invalid(errors) = err else {
        panic!("expected validation error");
    };
    assert_eq!(errors.messages("email"), ["Enter a valid email address."]);
    assert_eq!(
        errors.messages("username"),
        ["Ensure this field has no more than 30 characters."]
    );
    assert_eq!(errors.messages("role"), ["\"admin\" is not a valid choice."]);
    assert!(harness.notices.notices().is_empty());
}

#[test]
fn duplicate_email_or_username_conflicts() {
    let harness = Harness::new();
    harness.register("gita", "caregiver");

    let err = harness
        .service
        .register(registration("gita", "careseeker"))
        .expect_err("same email");
    assert!(
        matches!(err, AccountError::Conflict(ref message) if message == "user with this email already exists.")
    );

    let err = harness
        .service
        .register(RegistrationRequest {
            email: Some("other@carenest.test".to_string()),
            ..registration("gita", "careseeker")
        })
        .expect_err("same username");
    assert!(
        matches!(err, AccountError::Conflict(ref message) if message == "user with this username already exists.")
    );
}

#[test]
fn correct_code_verifies_email_once() {
    let harness = Harness::new();
    let user = harness.register("asha", "careseeker");
    let code = harness.issued_code(&user.email);

    let verified = harness
        .service
        .verify_otp(otp("asha@CARENEST.test", &code))
        .expect("verified");
    assert!(verified.is_verified);
    assert!(verified.otp.is_none());
    assert!(verified.may_sign_in());

    let err = harness
        .service
        .verify_otp(otp(&user.email, &code))
        .expect_err("already verified");
    assert!(
        matches!(err, AccountError::Conflict(ref message) if message == "Account already verified")
    );
}

#[test]
fn wrong_email_or_code_is_rejected() {
    let harness = Harness::new();
    let user = harness.register("asha", "careseeker");
    let code = harness.issued_code(&user.email);
    let wrong = if code == "123456" { "654321" } else { "123456" };

    let err = harness
        .service
        .verify_otp(otp("nobody@carenest.test", &code))
        .expect_err("unknown email");
    let AccountError::Invalid(errors) = err else {
        panic!("expected validation error");
    };
    assert_eq!(errors.messages("non_field_errors"), ["Invalid email"]);

    let err = harness
        .service
        .verify_otp(otp(&user.email, wrong))
        .expect_err("wrong code");
    let AccountError::Invalid(errors) = err else {
        panic!("expected validation error");
    };
    assert_eq!(errors.messages("non_field_errors"), ["Invalid OTP"]);
}

#[test]
fn code_expires_after_ttl() {
    let harness = Harness::new();
    let user = harness.register("asha", "careseeker");
    let code = harness.issued_code(&user.email);
    let later = Utc::now() + Duration::minutes(OTP_TTL_MINUTES + 1);

    let err = harness
        .service
        .verify_otp_at(otp(&user.email, &code), later)
        .expect_err("expired");
    let AccountError::Invalid(errors) = err else {
        panic!("expected validation error");
    };
    assert_eq!(errors.messages("non_field_errors"), ["OTP has expired"]);
}

#[test]
fn unverified_account_cannot_act() {
    let harness = Harness::new();
    let user = harness.register("asha", "careseeker");

    let err = harness
        .service
        .profile(CallerId(user.id))
        .expect_err("email not verified");
    assert!(matches!(
        err,
        AccountError::Access(AccessError::EmailNotVerified)
    ));
}

#[test]
fn bootstrap_admin_is_idempotent() {
    let harness = Harness::new();

    let admin = harness
        .service
        .bootstrap_admin("Root@CareNest.test", "root")
        .expect("seeded");
    assert!(admin.is_admin);
    assert!(admin.may_sign_in());

    let again = harness
        .service
        .bootstrap_admin("Root@carenest.test", "root")
        .expect("idempotent");
    assert_eq!(again.id, admin.id);

    let member = harness.register("asha", "careseeker");
    let err = harness
        .service
        .bootstrap_admin(&member.email, "asha-admin")
        .expect_err("existing non-admin");
    assert!(matches!(err, AccountError::Conflict(_)));
}

#[test]
fn caregiver_profile_has_null_verification_status() {
    let harness = Harness::new();
    let caregiver = seed_user(&harness.store, "gita", Role::Caregiver);
    let family = seed_user(&harness.store, "asha", Role::Careseeker);

    let view = harness.service.profile(CallerId(caregiver.id)).expect("view");
    assert_eq!(view.verification_status, Some(None));
    assert!(view.caregiver_details.is_some());

    let view = harness.service.profile(CallerId(family.id)).expect("view");
    assert_eq!(view.verification_status, None);
    assert!(view.caregiver_details.is_none());
}

#[test]
fn profile_update_is_partial() {
    let harness = Harness::new();
    let family = seed_user(&harness.store, "asha", Role::Careseeker);

    harness
        .service
        .update_profile(
            CallerId(family.id),
            ProfileUpdate {
                phone: Some("9800000000".to_string()),
                address: Some("Bhaktapur".to_string()),
            },
        )
        .expect("updated");
    let view = harness
        .service
        .update_profile(
            CallerId(family.id),
            ProfileUpdate {
                phone: None,
                address: Some(" Patan ".to_string()),
            },
        )
        .expect("updated");

    assert_eq!(view.phone, "9800000000");
    assert_eq!(view.address, "Patan");

    let err = harness
        .service
        .update_profile(
            CallerId(family.id),
            ProfileUpdate {
                phone: Some("9".repeat(21)),
                address: None,
            },
        )
        .expect_err("phone too long");
    assert!(matches!(err, AccountError::Invalid(ref errors) if errors.contains("phone")));
}

#[test]
fn caregiver_details_update_dedupes_services() {
    let harness = Harness::new();
    let caregiver = seed_user(&harness.store, "gita", Role::Caregiver);

    let view = harness
        .service
        .update_caregiver_profile(
            CallerId(caregiver.id),
            CaregiverProfileUpdate {
                service_types: Some(vec![
                    "bathing".to_string(),
                    " bathing ".to_string(),
                    "mobility".to_string(),
                ]),
                gender: Some("Female".to_string()),
                certification_year: Some(2019),
                ..CaregiverProfileUpdate::default()
            },
        )
        .expect("updated");

    let details = view.caregiver_details.expect("caregiver details");
    assert_eq!(details.service_types, vec!["bathing", "mobility"]);
    assert_eq!(details.gender, Some(Gender::Female));
    assert_eq!(details.certification_year, Some(2019));

    let err = harness
        .service
        .update_caregiver_profile(
            CallerId(caregiver.id),
            CaregiverProfileUpdate {
                gender: Some("other".to_string()),
                ..CaregiverProfileUpdate::default()
            },
        )
        .expect_err("bad gender");
    assert!(matches!(err, AccountError::Invalid(ref errors) if errors.contains("gender")));
}

#[test]
fn caregiver_details_are_caregiver_only() {
    let harness = Harness::new();
    let family = seed_user(&harness.store, "asha", Role::Careseeker);

    let err = harness
        .service
        .update_caregiver_profile(CallerId(family.id), CaregiverProfileUpdate::default())
        .expect_err("not a caregiver");
    assert!(matches!(
        err,
        AccountError::Access(AccessError::RoleRequired(Role::Caregiver))
    ));
}

#[test]
fn admin_reads_any_profile() {
    let harness = Harness::new();
    let admin = seed_user(&harness.store, "root", Role::Admin);
    let caregiver = seed_user(&harness.store, "gita", Role::Caregiver);

    let view = harness
        .service
        .admin_profile(CallerId(admin.id), caregiver.id)
        .expect("view");
    assert_eq!(view.username, "gita");

    let err = harness
        .service
        .admin_profile(CallerId(admin.id), UserId(999))
        .expect_err("missing");
    assert!(matches!(err, AccountError::NotFound(UserId(999))));

    let err = harness
        .service
        .admin_profile(CallerId(caregiver.id), admin.id)
        .expect_err("not admin");
    assert!(matches!(
        err,
        AccountError::Access(AccessError::RoleRequired(Role::Admin))
    ));
}

#[test]
fn profile_image_is_stored_and_replaced() {
    let harness = Harness::new();
    let caregiver = seed_user(&harness.store, "gita", Role::Caregiver);

    let first = harness
        .service
        .update_profile_image(
            CallerId(caregiver.id),
            Some(DocumentUpload::new("Me.PNG", png_bytes())),
        )
        .expect("stored");
    let first_url = first.profile_image.expect("image url");
    assert!(first_url.starts_with(&format!("http://media.test/profiles/{}-", caregiver.id)));
    assert!(first_url.ends_with(".png"));

    let second = harness
        .service
        .update_profile_image(
            CallerId(caregiver.id),
            Some(DocumentUpload::new("me.webp", png_bytes())),
        )
        .expect("replaced");
    assert_ne!(second.profile_image, Some(first_url));
    assert_eq!(harness.media.len(), 1);

    let profile = harness
        .store
        .fetch_profile(caregiver.id)
        .expect("fetch")
        .expect("profile");
    let key = profile.profile_image_key.expect("key kept");
    assert!(key.starts_with("profiles/"));
    assert!(harness.media.object(&key).is_some());
}

#[test]
fn profile_image_must_be_a_small_image() {
    let harness = Harness::new();
    let family = seed_user(&harness.store, "asha", Role::Careseeker);

    let missing = harness
        .service
        .update_profile_image(CallerId(family.id), None)
        .expect_err("nothing sent");
    let not_image = harness
        .service
        .update_profile_image(
            CallerId(family.id),
            Some(DocumentUpload::new("me.png", b"plain text".to_vec())),
        )
        .expect_err("not an image");
    let oversized = harness
        .service
        .update_profile_image(
            CallerId(family.id),
            Some(DocumentUpload::oversized("me.png", 6 * 1024 * 1024)),
        )
        .expect_err("too large");

    let messages: Vec<Vec<String>> = [missing, not_image, oversized]
        .into_iter()
        .map(|err| match err {
            AccountError::Invalid(errors) => errors.messages("profile_image").to_vec(),
            other => panic!("expected validation error, got {other:?}"),
        })
        .collect();
    assert_eq!(
        messages,
        [
            vec!["No file was submitted.".to_string()],
            vec!["File is not a valid image".to_string()],
            vec!["Image file size must be less than 5MB. Current size: 6.00MB".to_string()],
        ]
    );
    assert!(harness.media.is_empty());
}
