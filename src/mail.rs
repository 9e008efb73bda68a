//! Outbound email. Delivery goes through a `Mailer`; the default one only writes the message to the
//! log. Sending is fire-and-forget so a slow or broken transport can't fail the request that
//! triggered it.
use crate::datastore::structs::User;
use crate::metrics;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub text_body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> anyhow::Result<()>;
}

/// Logs each email instead of delivering it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> anyhow::Result<()> {
        info!(
            subject = &email.subject[..],
            sender = &email.sender[..],
            recipients = ?email.recipients,
            "email handed to log transport"
        );
        Ok(())
    }
}

/// Send in the background. The outcome is only logged and counted.
pub fn dispatch(mailer: Arc<dyn Mailer>, email: Email) {
    actix_web::rt::spawn(async move {
        let result = mailer.send(email).await;
        let label = match &result {
            Ok(()) => "ok",
            Err(e) => {
                warn!("couldn't send email: {:#}", e);
                "err"
            }
        };
        metrics::EMAILS.with_label_values(&[label]).inc();
    });
}

pub fn password_reset_email(sender: &str, user: &User, token: &str) -> Email {
    let text_body = format!(
        "Dear {},\n\n\
         To reset your password, submit a new password along with this token:\n\n\
         {}\n\n\
         If you have not requested a password reset simply ignore this message.\n",
        user.username, token
    );
    Email {
        subject: "[Microblog] Reset Your Password".to_owned(),
        sender: sender.to_owned(),
        recipients: vec![user.email.clone()],
        text_body,
    }
}
