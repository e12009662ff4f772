//! Outbound e-mail notices. Delivery is fire-and-forget: callers hand a [`Notice`] to a
//! [`Notifier`] and never wait on, retry, or fail because of the transport.

mod queue;
mod templates;

pub use queue::{NotificationQueue, QueueWorker};
pub use templates::render;

use serde::{Deserialize, Serialize};

use crate::workflows::verification::VerificationStatus;

/// Events that produce an e-mail to an account holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    OneTimePasscode {
        email: String,
        code: String,
        ttl_minutes: i64,
    },
    VerificationDecided {
        email: String,
        username: String,
        status: VerificationStatus,
        rejection_reason: Option<String>,
    },
}

impl Notice {
    pub fn recipient(&self) -> &str {
        match self {
            Notice::OneTimePasscode { email, .. } | Notice::VerificationDecided { email, .. } => {
                email
            }
        }
    }

    pub fn template(&self) -> &'static str {
        match self {
            Notice::OneTimePasscode { .. } => "one_time_passcode",
            Notice::VerificationDecided { .. } => "verification_decided",
        }
    }
}

/// Non-blocking hand-off point for notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification queue closed")]
    QueueClosed,
}

/// Rendered e-mail ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub subject: String,
    pub body: String,
    pub to_email: String,
}

/// Transport that actually delivers rendered mail (SMTP, SES, ...).
pub trait MailTransport: Send + Sync + 'static {
    fn send(&self, message: &MailMessage) -> Result<(), TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("mail transport unavailable: {0}")]
    Unavailable(String),
    #[error("recipient rejected: {0}")]
    Rejected(String),
}

/// Default transport for development: writes each message to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl MailTransport for LogTransport {
    fn send(&self, message: &MailMessage) -> Result<(), TransportError> {
        tracing::info!(
            to = %message.to_email,
            subject = %message.subject,
            body = %message.body,
            "mail delivered to log transport"
        );
        Ok(())
    }
}
