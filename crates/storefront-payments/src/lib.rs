//! # storefront-payments
//!
//! MercadoPago checkout and payment reconciliation for the storefront.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐  createPaymentPreference  ┌─────────────────┐
//! │  Storefront │──────────────────────────▶│   MercadoPago   │
//! │  (checkout) │◀── redirect (init_point) ─│  Checkout Page  │
//! └─────────────┘                           └────────┬────────┘
//!                                                    │ webhook (async)
//!                                                    ▼
//!                 ┌─────────────┐  update   ┌─────────────────┐
//!                 │ Order Store │◀──────────│ Webhook Receiver│
//!                 │  (pedidos)  │           │ (fetch payment) │
//!                 └─────────────┘           └─────────────────┘
//! ```
//!
//! The order document is created by the storefront before checkout starts.
//! Webhooks only ever update it: status, payment id, the raw payment payload
//! and a server timestamp are overwritten on every delivery, so duplicate
//! deliveries converge on the same document.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use storefront_payments::{PreferenceCreator, WebhookProcessor, Notification};
//!
//! let creator = PreferenceCreator::new(gateway.clone(), None);
//! let preference = creator.create(&request_data).await?;
//! // Redirect the payer to: preference.init_point
//!
//! let processor = WebhookProcessor::new(gateway, orders);
//! let outcome = processor.process(&Notification::parse(&body, &query)).await?;
//! ```

pub mod environment;
pub mod gateway;
pub mod order;
pub mod preference;
pub mod signature;
pub mod webhook;

mod error;
mod mock;

pub use environment::{Environment, GatewayCredentials, SANDBOX_ACCESS_TOKEN};
pub use error::{PaymentError, Result};
pub use gateway::{
    BackUrls, PaymentDetails, PaymentGateway, Preference, PreferenceItem, PreferencePayer,
    PreferenceRequest,
};
pub use mock::MockGateway;
pub use order::{MemoryOrderStore, Order, OrderItem, OrderStore, Payer, PaymentUpdate};
pub use preference::{PreferenceCreator, PreferenceResult};
pub use signature::SignatureVerifier;
pub use webhook::{Notification, WebhookOutcome, WebhookProcessor};
