use chrono::{NaiveDate, NaiveTime};

use super::domain::{BookingRequest, CareDetails};
use crate::error::FieldErrors;
use crate::identity::CaregiverProfile;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";
const MAX_AGE: i64 = 150;
const MAX_NAME_CHARS: usize = 255;
const MAX_PHONE_CHARS: usize = 20;

/// Checks a booking payload against the caregiver's offer, collecting every field error.
pub fn validate_request(
    request: &BookingRequest,
    caregiver: &CaregiverProfile,
    today: NaiveDate,
) -> Result<CareDetails, FieldErrors> {
    let mut errors = FieldErrors::new();

    let service_types = check_services(request.service_types.as_deref(), caregiver, &mut errors);
    let person_name = required_text(
        "person_name",
        request.person_name.as_deref(),
        MAX_NAME_CHARS,
        &mut errors,
    );
    let person_age = check_age(request.person_age, &mut errors);
    let date = check_date(request.date.as_deref(), today, &mut errors);
    let start_time = check_start_time(request.start_time.as_deref(), &mut errors);
    let duration_hours = check_duration(request.duration_hours, &mut errors);
    let emergency_contact_name = optional_text(
        "emergency_contact_name",
        request.emergency_contact_name.as_deref(),
        MAX_NAME_CHARS,
        &mut errors,
    );
    let emergency_contact_phone = required_text(
        "emergency_contact_phone",
        request.emergency_contact_phone.as_deref(),
        MAX_PHONE_CHARS,
        &mut errors,
    );

    match (
        service_types,
        person_name,
        person_age,
        date,
        start_time,
        duration_hours,
        emergency_contact_phone,
    ) {
        (
            Some(service_types),
            Some(person_name),
            Some(person_age),
            Some(date),
            Some(start_time),
            Some(duration_hours),
            Some(emergency_contact_phone),
        ) if errors.is_empty() => Ok(CareDetails {
            service_types,
            person_name,
            person_age,
            date,
            start_time,
            duration_hours,
            emergency_contact_name,
            emergency_contact_phone,
            additional_info: trimmed(request.additional_info.as_deref()),
            notes: trimmed(request.notes.as_deref()),
        }),
        _ => Err(errors),
    }
}

fn check_services(
    requested: Option<&[String]>,
    caregiver: &CaregiverProfile,
    errors: &mut FieldErrors,
) -> Option<Vec<String>> {
    let requested: Vec<String> = requested
        .unwrap_or_default()
        .iter()
        .map(|service| service.trim().to_string())
        .filter(|service| !service.is_empty())
        .fold(Vec::new(), |mut unique, service| {
            if !unique.contains(&service) {
                unique.push(service);
            }
            unique
        });

    if requested.is_empty() {
        errors.add("service_types", "At least one service must be selected");
        return None;
    }

    let unoffered: Vec<&str> = requested
        .iter()
        .filter(|service| !caregiver.offers(service))
        .map(String::as_str)
        .collect();
    if !unoffered.is_empty() {
        errors.add(
            "service_types",
            format!(
                "Services not offered by this caregiver: {}",
                unoffered.join(", ")
            ),
        );
        return None;
    }

    Some(requested)
}

fn required_text(
    field: &str,
    value: Option<&str>,
    max_chars: usize,
    errors: &mut FieldErrors,
) -> Option<String> {
    let Some(value) = value else {
        errors.add(field, REQUIRED);
        return None;
    };
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    within_length(field, value, max_chars, errors).then(|| value.to_string())
}

fn optional_text(
    field: &str,
    value: Option<&str>,
    max_chars: usize,
    errors: &mut FieldErrors,
) -> String {
    let value = value.unwrap_or_default().trim();
    if within_length(field, value, max_chars, errors) {
        value.to_string()
    } else {
        String::new()
    }
}

fn within_length(field: &str, value: &str, max_chars: usize, errors: &mut FieldErrors) -> bool {
    if value.chars().count() > max_chars {
        errors.add(
            field,
            format!("Ensure this field has no more than {max_chars} characters."),
        );
        return false;
    }
    true
}

fn check_age(age: Option<i64>, errors: &mut FieldErrors) -> Option<u8> {
    match age {
        None => {
            errors.add("person_age", REQUIRED);
            None
        }
        Some(age) if age < 0 => {
            errors.add(
                "person_age",
                "Ensure this value is greater than or equal to 0.",
            );
            None
        }
        Some(age) if age > MAX_AGE => {
            errors.add(
                "person_age",
                format!("Ensure this value is less than or equal to {MAX_AGE}."),
            );
            None
        }
        Some(age) => u8::try_from(age).ok(),
    }
}

fn check_date(raw: Option<&str>, today: NaiveDate, errors: &mut FieldErrors) -> Option<NaiveDate> {
    let Some(raw) = raw else {
        errors.add("date", REQUIRED);
        return None;
    };
    let Ok(date) = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") else {
        errors.add(
            "date",
            "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
        );
        return None;
    };
    if date < today {
        errors.add("date", "Date cannot be in the past");
        return None;
    }
    Some(date)
}

fn check_start_time(raw: Option<&str>, errors: &mut FieldErrors) -> Option<NaiveTime> {
    let Some(raw) = raw else {
        errors.add("start_time", REQUIRED);
        return None;
    };
    let raw = raw.trim();
    let parsed = NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"));
    match parsed {
        Ok(time) => Some(time),
        Err(_) => {
            errors.add(
                "start_time",
                "Time has wrong format. Use one of these formats instead: hh:mm[:ss].",
            );
            None
        }
    }
}

fn check_duration(hours: Option<i64>, errors: &mut FieldErrors) -> Option<u8> {
    match hours {
        None => {
            errors.add("duration_hours", REQUIRED);
            None
        }
        Some(hours) if (1..=24).contains(&hours) => u8::try_from(hours).ok(),
        Some(_) => {
            errors.add("duration_hours", "Duration must be between 1 and 24 hours");
            None
        }
    }
}

fn trimmed(value: Option<&str>) -> String {
    value.unwrap_or_default().trim().to_string()
}
