use anyhow::Result;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::SmtpConfig;

pub struct EmailService {
    mailer: SmtpTransport,
    from_address: String,
    skip_send: bool,
}

impl EmailService {
    pub fn new(smtp: &SmtpConfig) -> Result<Self> {
        let mailer = if smtp.username.is_empty() {
            SmtpTransport::builder_dangerous(&smtp.host)
                .port(smtp.port)
                .build()
        } else {
            let creds = Credentials::new(smtp.username.clone(), smtp.password.clone());
            SmtpTransport::relay(&smtp.host)?
                .port(smtp.port)
                .credentials(creds)
                .build()
        };

        Ok(Self {
            mailer,
            from_address: smtp.from_address.clone(),
            skip_send: smtp.skip_send,
        })
    }

    pub fn send_verification_email(
        &self,
        to_email: &str,
        name: &str,
        verify_url: &str,
    ) -> Result<()> {
        let body = format!(
            r#"
Hi {},

Welcome to IronClub! Please confirm your email address by opening the link below:

{}

If you did not create an account, no further action is required.

---
IronClub triathlon community
"#,
            name, verify_url
        );

        self.send(to_email, "Verify your email address - IronClub", body)
    }

    pub fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_url: &str,
        expires_in_minutes: i64,
    ) -> Result<()> {
        let body = format!(
            r#"
We received a request to reset the password for your account.

Open the link below to choose a new password:

{}

This link expires in {} minutes.

If you did not request a password reset, you can ignore this email.

---
IronClub triathlon community
"#,
            reset_url, expires_in_minutes
        );

        self.send(to_email, "Reset your password - IronClub", body)
    }

    pub fn send_password_changed_notification(&self, to_email: &str, name: &str) -> Result<()> {
        let body = format!(
            r#"
Hi {},

The password for your IronClub account was changed and every signed-in device
has been logged out.

Changed at: {}

If you did not make this change, reset your password immediately.

---
IronClub triathlon community
"#,
            name,
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );

        self.send(to_email, "Your password was changed - IronClub", body)
    }

    fn send(&self, to_email: &str, subject: &str, body: String) -> Result<()> {
        if self.skip_send {
            tracing::debug!(to = to_email, subject, "SMTP_SKIP_SEND set, mail not sent");
            return Ok(());
        }

        let email = Message::builder()
            .from(self.from_address.parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.mailer.send(&email)?;
        Ok(())
    }
}
