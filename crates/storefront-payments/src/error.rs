//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Caller sent a malformed or incomplete request
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// MercadoPago API error
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Gateway payload could not be interpreted
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Webhook referenced an order document that does not exist
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Gateway(_) | Self::Storage(_) | Self::OrderNotFound(_)
        )
    }

    /// Whether the error was caused by the caller's input
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Get user-friendly message
    ///
    /// Input errors are returned verbatim; everything else is collapsed to a
    /// generic message so gateway details and secret names never leak.
    pub fn user_message(&self) -> &str {
        match self {
            Self::InvalidArgument(message) => message,
            Self::WebhookSignature(_) => "Assinatura inválida.",
            _ => "Falha ao criar preferência de pagamento.",
        }
    }
}
