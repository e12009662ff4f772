use super::{MailMessage, Notice};
use crate::workflows::verification::VerificationStatus;

const DEFAULT_REJECTION: &str = "The submitted documents did not meet verification requirements.";

/// Renders a notice into mail. Pending decisions produce nothing.
pub fn render(notice: &Notice) -> Option<MailMessage> {
    match notice {
        Notice::OneTimePasscode {
            email,
            code,
            ttl_minutes,
        } => Some(MailMessage {
            subject: "Verify your CareNest account".to_string(),
            body: format!(
                "Your CareNest OTP is {code}. It is valid for {ttl_minutes} minutes."
            ),
            to_email: email.clone(),
        }),
        Notice::VerificationDecided {
            email,
            username,
            status,
            rejection_reason,
        } => {
            let (subject, body) = match status {
                VerificationStatus::Approved => (
                    "CareNest - Your Account is Verified!",
                    approved_body(username),
                ),
                VerificationStatus::Rejected => (
                    "CareNest - Document Verification Update",
                    rejected_body(username, rejection_reason.as_deref()),
                ),
                VerificationStatus::Pending => return None,
            };
            Some(MailMessage {
                subject: subject.to_string(),
                body,
                to_email: email.clone(),
            })
        }
    }
}

fn approved_body(username: &str) -> String {
    format!(
        "Dear {username},\n\n\
         We're pleased to inform you that your documents have been successfully verified.\n\n\
         Your caregiver account is now active. You can begin completing your profile and \
         responding to care requests through your dashboard.\n\n\
         Thank you for choosing CareNest.\n\n\
         Kind regards,\nCareNest Team\n\n\
         (This is an automated email. Please do not reply.)"
    )
}

fn rejected_body(username: &str, reason: Option<&str>) -> String {
    let reason = reason
        .map(str::trim)
        .filter(|reason| !reason.is_empty())
        .unwrap_or(DEFAULT_REJECTION);
    format!(
        "Dear {username},\n\n\
         We have reviewed the documents you submitted for verification.\n\n\
         At this time, they could not be verified for the following reason:\n\n\
         {reason}\n\n\
         You may log in to your dashboard to review the feedback and re-upload corrected \
         documents.\n\n\
         If you require assistance, please contact our support team.\n\n\
         Kind regards,\nCareNest Team\n\n\
         (This is an automated email. Please do not reply.)"
    )
}
