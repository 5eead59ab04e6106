//! Outbound notifications.
//!
//! `dispatch` never fails the caller: delivery happens off the request path
//! and failures are only logged.

use std::sync::Arc;

use crate::utils::email::EmailService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    VerifyEmail {
        to: String,
        name: String,
        url: String,
    },
    ResetPassword {
        to: String,
        url: String,
        expires_in_minutes: i64,
    },
    PasswordChanged {
        to: String,
        name: String,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::VerifyEmail { .. } => "verify_email",
            Notification::ResetPassword { .. } => "reset_password",
            Notification::PasswordChanged { .. } => "password_changed",
        }
    }
}

pub trait Notifier: Send + Sync {
    fn dispatch(&self, notification: Notification);
}

/// Sends notifications as plain-text mail over SMTP.
pub struct EmailNotifier {
    email: Arc<EmailService>,
}

impl EmailNotifier {
    pub fn new(email: EmailService) -> Self {
        Self {
            email: Arc::new(email),
        }
    }

    fn deliver(email: &EmailService, notification: &Notification) -> anyhow::Result<()> {
        match notification {
            Notification::VerifyEmail { to, name, url } => {
                email.send_verification_email(to, name, url)
            }
            Notification::ResetPassword {
                to,
                url,
                expires_in_minutes,
            } => email.send_password_reset_email(to, url, *expires_in_minutes),
            Notification::PasswordChanged { to, name } => {
                email.send_password_changed_notification(to, name)
            }
        }
    }
}

impl Notifier for EmailNotifier {
    fn dispatch(&self, notification: Notification) {
        let email = Arc::clone(&self.email);
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(kind = notification.kind(), "No runtime available, notification dropped");
            return;
        };
        handle.spawn_blocking(move || {
            if let Err(err) = Self::deliver(&email, &notification) {
                tracing::warn!(kind = notification.kind(), error = ?err, "Failed to send notification");
            }
        });
    }
}
