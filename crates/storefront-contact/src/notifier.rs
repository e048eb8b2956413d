//! Contact Notifier

use std::sync::Arc;

use crate::error::{ContactError, Result};
use crate::mailer::{Mailer, OutgoingEmail};
use crate::message::{EmailStatus, MessageStore};

/// Sends the owner notification and records the outcome
pub struct ContactNotifier {
    mailer: Arc<dyn Mailer>,
    store: Arc<dyn MessageStore>,
    from_email: String,
    to_email: String,
}

impl ContactNotifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        store: Arc<dyn MessageStore>,
        from_email: impl Into<String>,
        to_email: impl Into<String>,
    ) -> Self {
        Self {
            mailer,
            store,
            from_email: from_email.into(),
            to_email: to_email.into(),
        }
    }

    /// Notify about a newly created message.
    ///
    /// The email is built from the stored document, so nothing is sent for
    /// an id the store does not know. A delivery failure is not an error: it
    /// is recorded on the document and returned as [`EmailStatus::Failed`].
    pub async fn notify(&self, id: &str) -> Result<EmailStatus> {
        let message = self.store.get(id).await?.ok_or_else(|| {
            tracing::warn!(message_id = %id, "Contact message not found, nothing sent");
            ContactError::MessageNotFound(id.to_string())
        })?;
        message.validate()?;

        tracing::info!(
            message_id = %id,
            nome = %message.nome,
            email = %message.email,
            "New contact message, sending notification"
        );

        let email = OutgoingEmail::contact_notification(&message, &self.from_email, &self.to_email);

        let status = match self.mailer.send(&email).await {
            Ok(()) => {
                tracing::info!(message_id = %id, mailer = self.mailer.name(), "Notification sent");
                EmailStatus::Sent
            }
            Err(e) => {
                tracing::error!(
                    message_id = %id,
                    mailer = self.mailer.name(),
                    error = %e,
                    "Failed to send contact notification"
                );
                EmailStatus::Failed {
                    error: e.to_string(),
                }
            }
        };

        self.store.record_email_status(id, &status).await?;

        Ok(status)
    }
}
