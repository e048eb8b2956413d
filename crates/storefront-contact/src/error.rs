//! Contact Error Types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContactError>;

#[derive(Error, Debug)]
pub enum ContactError {
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Mail provider error: {0}")]
    Mail(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ContactError {
    pub fn user_message(&self) -> &str {
        match self {
            Self::InvalidMessage(message) => message,
            Self::MessageNotFound(_) => "Mensagem não encontrada.",
            _ => "Erro interno ao processar a mensagem.",
        }
    }
}
