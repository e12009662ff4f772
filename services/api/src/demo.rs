use crate::infra::{InMemoryNotifier, Marketplace};
use carenest::config::{AccountConfig, AppConfig, AppEnvironment, ServerConfig};
use carenest::config::{TelemetryConfig, UploadConfig};
use carenest::error::AppError;
use carenest::identity::{
    AccountService, CallerId, CaregiverProfileUpdate, OtpRequest, ProfileUpdate,
    RegistrationRequest, User,
};
use carenest::notifications::render;
use carenest::workflows::booking::{BookingRequest, CaregiverQuery, RespondRequest};
use carenest::workflows::verification::{
    DecisionRequest, DocumentSet, DocumentSlot, DocumentUpload, ListQuery,
};
use chrono::{Local, NaiveDate};
use clap::Args;
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the date bookings are validated against (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Stop after the verification walkthrough.
    #[arg(long)]
    pub(crate) skip_bookings: bool,
    /// Print every e-mail queued during the walkthrough.
    #[arg(long)]
    pub(crate) show_mail: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        skip_bookings,
        show_mail,
    } = args;
    let today = today.unwrap_or_else(|| Local::now().date_naive());

    let notifier = InMemoryNotifier::default();
    let marketplace = Marketplace::in_memory(&demo_config(), Arc::new(notifier.clone()));

    println!("CareNest workflow demo");
    let admin = marketplace
        .accounts
        .bootstrap_admin("reviewer@carenest.test", "reviewer")?;
    let Some(family) = onboard(&marketplace.accounts, &notifier, "asha", "careseeker") else {
        return Ok(());
    };
    let Some(caregiver) = onboard(&marketplace.accounts, &notifier, "gita", "caregiver") else {
        return Ok(());
    };

    let profile = marketplace.accounts.update_profile(
        CallerId(caregiver.id),
        ProfileUpdate {
            phone: Some("9800000001".to_string()),
            address: Some("Lalitpur".to_string()),
        },
    );
    let details = marketplace.accounts.update_caregiver_profile(
        CallerId(caregiver.id),
        CaregiverProfileUpdate {
            service_types: Some(vec!["bathing".to_string(), "mobility".to_string()]),
            training_authority: Some("Red Cross".to_string()),
            certification_year: Some(2020),
            gender: Some("female".to_string()),
            ..CaregiverProfileUpdate::default()
        },
    );
    if let Err(err) = profile.and(details) {
        println!("  Profile update rejected: {err}");
        return Ok(());
    }
    println!("- {} offers bathing and mobility in Lalitpur", caregiver.username);

    println!("\nDocument verification");
    let documents = sample_documents();
    let first = match marketplace
        .verifications
        .submit(CallerId(caregiver.id), documents.clone())
    {
        Ok(record) => record,
        Err(err) => {
            println!("  Upload rejected: {err}");
            return Ok(());
        }
    };
    println!("- Upload {} -> {}", first.id, first.status);

    match marketplace
        .verifications
        .list(CallerId(admin.id), &ListQuery::default())
    {
        Ok(queue) => println!("- Review queue holds {} pending request(s)", queue.count),
        Err(err) => println!("  Review queue unavailable: {err}"),
    }

    let rejected = marketplace.verifications.decide(
        CallerId(admin.id),
        first.id,
        DecisionRequest {
            verification_status: Some("rejected".to_string()),
            rejection_reason: Some("Citizenship back side is blurry".to_string()),
        },
    );
    match rejected {
        Ok(view) => println!(
            "- Reviewer rejected: {}",
            view.rejection_reason.unwrap_or_default()
        ),
        Err(err) => println!("  Decision failed: {err}"),
    }

    let second = match marketplace
        .verifications
        .submit(CallerId(caregiver.id), documents)
    {
        Ok(record) => record,
        Err(err) => {
            println!("  Re-upload rejected: {err}");
            return Ok(());
        }
    };
    println!("- Re-upload {} -> {}", second.id, second.status);

    let approved = marketplace.verifications.decide(
        CallerId(admin.id),
        second.id,
        DecisionRequest {
            verification_status: Some("approved".to_string()),
            rejection_reason: None,
        },
    );
    match approved {
        Ok(view) => println!(
            "- Reviewer {} approved {}",
            view.verified_by_email.unwrap_or_default(),
            view.username.unwrap_or_default()
        ),
        Err(err) => println!("  Decision failed: {err}"),
    }

    if !skip_bookings {
        run_booking_walkthrough(&marketplace, &notifier, &family, &caregiver, today);
    }

    if show_mail {
        println!("\nQueued mail");
        for message in notifier.notices().iter().filter_map(render) {
            println!("- to {}: {}", message.to_email, message.subject);
        }
    }

    Ok(())
}

fn run_booking_walkthrough(
    marketplace: &Marketplace,
    notifier: &InMemoryNotifier,
    family: &User,
    caregiver: &User,
    today: NaiveDate,
) {
    println!("\nBookings");
    match marketplace.bookings.caregivers(
        CallerId(family.id),
        &CaregiverQuery {
            location: Some("lalitpur".to_string()),
            gender: None,
        },
    ) {
        Ok(listing) => {
            for entry in &listing {
                println!(
                    "- Found {} ({}) active booking: {}",
                    entry.username,
                    entry.service_types.join(", "),
                    entry.has_active_booking
                );
            }
        }
        Err(err) => println!("  Caregiver search failed: {err}"),
    }

    let request = booking_request(caregiver, today);
    let booking = match marketplace
        .bookings
        .create(CallerId(family.id), request.clone(), today)
    {
        Ok(booking) => booking,
        Err(err) => {
            println!("  Booking rejected: {err}");
            return;
        }
    };
    println!(
        "- {} requested {} on {} -> {}",
        family.username, caregiver.username, booking.date, booking.status
    );

    if let Err(err) = marketplace
        .bookings
        .create(CallerId(family.id), request, today)
    {
        println!("- Second request refused: {err}");
    }

    match marketplace.bookings.respond(
        CallerId(caregiver.id),
        booking.id,
        RespondRequest {
            status: Some("accepted".to_string()),
        },
    ) {
        Ok(view) => println!("- {} answered -> {}", caregiver.username, view.status),
        Err(err) => println!("  Response failed: {err}"),
    }

    let Some(neighbour) = onboard(&marketplace.accounts, notifier, "binod", "careseeker") else {
        return;
    };
    let competing = match marketplace.bookings.create(
        CallerId(neighbour.id),
        booking_request(caregiver, today),
        today,
    ) {
        Ok(booking) => booking,
        Err(err) => {
            println!("  Competing request rejected: {err}");
            return;
        }
    };
    if let Err(err) = marketplace.bookings.respond(
        CallerId(caregiver.id),
        competing.id,
        RespondRequest {
            status: Some("accepted".to_string()),
        },
    ) {
        println!("- Accepting a second family refused: {err}");
    }

    match marketplace.bookings.list(CallerId(caregiver.id)) {
        Ok(bookings) => {
            println!("- {} sees {} request(s):", caregiver.username, bookings.len());
            for booking in bookings {
                println!(
                    "    - #{} from {} -> {}",
                    booking.id,
                    booking.family_name.unwrap_or_default(),
                    booking.status
                );
            }
        }
        Err(err) => println!("  Listing failed: {err}"),
    }
}

/// Registers an account and confirms it with the mailed passcode.
fn onboard(
    accounts: &AccountService,
    notifier: &InMemoryNotifier,
    username: &str,
    role: &str,
) -> Option<User> {
    let registration = RegistrationRequest {
        email: Some(format!("{username}@carenest.test")),
        username: Some(username.to_string()),
        role: Some(role.to_string()),
    };
    let user = match accounts.register(registration) {
        Ok(user) => user,
        Err(err) => {
            println!("  Registration of {username} rejected: {err}");
            return None;
        }
    };
    let verified = accounts.verify_otp(OtpRequest {
        email: Some(user.email.clone()),
        otp: notifier.latest_code(&user.email),
    });
    match verified {
        Ok(user) => {
            println!("- {} registered as {} and verified", user.username, user.role);
            Some(user)
        }
        Err(err) => {
            println!("  OTP confirmation for {username} failed: {err}");
            None
        }
    }
}

fn booking_request(caregiver: &User, today: NaiveDate) -> BookingRequest {
    let payload = json!({
        "caregiver": caregiver.id,
        "service_types": ["bathing"],
        "person_name": "Grandmother",
        "person_age": 81,
        "date": (today + chrono::Duration::days(1)).format("%Y-%m-%d").to_string(),
        "start_time": "09:00",
        "duration_hours": 2,
        "emergency_contact_name": "Ramesh",
        "emergency_contact_phone": "9800000000",
    });
    serde_json::from_value(payload).unwrap_or_default()
}

fn sample_documents() -> DocumentSet {
    let image = sample_png();
    DocumentSet::new()
        .with(
            DocumentSlot::CitizenshipFront,
            DocumentUpload::new("front.png", image.clone()),
        )
        .with(
            DocumentSlot::CitizenshipBack,
            DocumentUpload::new("back.png", image.clone()),
        )
        .with(
            DocumentSlot::Certificate,
            DocumentUpload::new("certificate.png", image),
        )
}

fn sample_png() -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    let encoded =
        DynamicImage::ImageRgb8(RgbImage::new(16, 16)).write_to(&mut buffer, ImageFormat::Png);
    match encoded {
        Ok(()) => buffer.into_inner(),
        Err(_) => Vec::new(),
    }
}

fn demo_config() -> AppConfig {
    AppConfig {
        environment: AppEnvironment::Development,
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        },
        telemetry: TelemetryConfig {
            log_level: "warn".to_string(),
        },
        uploads: UploadConfig::default(),
        accounts: AccountConfig::default(),
    }
}
