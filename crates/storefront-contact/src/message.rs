//! Contact Messages
//!
//! Documents in the `mensagens` collection, written by the contact page.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ContactError, Result};

pub const MESSAGES_COLLECTION: &str = "mensagens";

pub const STATUS_FIELD: &str = "statusEmail";
pub const ERROR_FIELD: &str = "erro";

/// A message left through the contact form
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub mensagem: String,
}

impl ContactMessage {
    /// Reject messages with nothing to send
    pub fn validate(&self) -> Result<()> {
        if self.mensagem.trim().is_empty() {
            return Err(ContactError::InvalidMessage(
                "O campo 'mensagem' é obrigatório.".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of the notification email
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmailStatus {
    Sent,
    Failed { error: String },
}

impl EmailStatus {
    /// Value stored in `statusEmail`
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Sent => "Enviado com sucesso",
            Self::Failed { .. } => "Falha no envio",
        }
    }

    /// Document fields recording this status
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(STATUS_FIELD.into(), Value::String(self.label().into()));
        if let Self::Failed { error } = self {
            fields.insert(ERROR_FIELD.into(), Value::String(error.clone()));
        }
        fields
    }
}

/// Message storage trait
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Load a message document
    async fn get(&self, id: &str) -> Result<Option<ContactMessage>>;

    /// Write the email outcome onto an existing message document
    async fn record_email_status(&self, id: &str, status: &EmailStatus) -> Result<()>;

    /// Backend name
    fn name(&self) -> &str;
}

#[derive(Clone, Debug)]
struct StoredMessage {
    message: ContactMessage,
    status: Option<EmailStatus>,
}

/// In-memory message store (for development)
#[derive(Default)]
pub struct MemoryMessageStore {
    messages: RwLock<HashMap<String, StoredMessage>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a message as the contact page would
    pub fn insert(&self, id: impl Into<String>, message: ContactMessage) {
        self.messages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into(), StoredMessage { message, status: None });
    }

    pub fn status(&self, id: &str) -> Option<EmailStatus> {
        let messages = self.messages.read().unwrap_or_else(PoisonError::into_inner);
        messages.get(id).and_then(|stored| stored.status.clone())
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn get(&self, id: &str) -> Result<Option<ContactMessage>> {
        let messages = self.messages.read().unwrap_or_else(PoisonError::into_inner);
        Ok(messages.get(id).map(|stored| stored.message.clone()))
    }

    async fn record_email_status(&self, id: &str, status: &EmailStatus) -> Result<()> {
        let mut messages = self.messages.write().unwrap_or_else(PoisonError::into_inner);
        let stored = messages
            .get_mut(id)
            .ok_or_else(|| ContactError::MessageNotFound(id.to_string()))?;
        stored.status = Some(status.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
