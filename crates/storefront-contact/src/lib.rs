//! # storefront-contact
//!
//! Emails the shop owner when a visitor leaves a message through the
//! contact form, then records the delivery outcome on the message document
//! (`statusEmail`, plus `erro` when sending failed).

pub mod mailer;
pub mod message;
pub mod notifier;

mod error;

pub use error::{ContactError, Result};
pub use mailer::{Mailer, OutgoingEmail, RecordingMailer};
pub use message::{ContactMessage, EmailStatus, MemoryMessageStore, MessageStore};
pub use notifier::ContactNotifier;
