/// Reminder delivery
///
/// The worker only decides who gets a reminder; delivery goes through the
/// [`Mailer`] trait. [`LogMailer`] is the built-in implementation and records
/// each send as a structured log event, which is enough for deployments that
/// forward logs to a notification pipeline.

use async_trait::async_trait;
use dailytask_shared::models::user::User;

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    /// The transport refused or failed this message
    #[error("Delivery to {to} failed: {reason}")]
    Delivery { to: String, reason: String },
}

/// One reminder, ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl ReminderMessage {
    pub fn for_user(user: &User, window_hours: i64) -> Self {
        let greeting = user.name.as_deref().unwrap_or("there");

        Self {
            to: user.email.clone(),
            subject: "Don't forget today's task".to_string(),
            body: format!(
                "Hi {},\n\nWe haven't seen a task submission from you in the last {} hours. \
                 Take a few minutes to share what you researched and where you got stuck.\n",
                greeting, window_hours
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Short transport name for logs
    fn name(&self) -> &'static str;

    async fn send(&self, message: &ReminderMessage) -> Result<(), MailerError>;
}

/// Writes each reminder to the log instead of sending it
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: &ReminderMessage) -> Result<(), MailerError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "Reminder sent"
        );
        Ok(())
    }
}
