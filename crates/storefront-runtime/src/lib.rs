//! # storefront-runtime
//!
//! Network implementations of the storefront's domain traits:
//!
//! - [`MercadoPagoClient`]: `PaymentGateway` over the MercadoPago REST API
//! - [`SendGridMailer`]: `Mailer` over the SendGrid v3 API
//! - [`FirestoreStore`]: `OrderStore` and `MessageStore` over the Firestore REST API

pub mod firestore;
pub mod mercadopago;
pub mod sendgrid;

pub use firestore::{FirestoreClient, FirestoreConfig, FirestoreError, FirestoreStore, TokenSource};
pub use mercadopago::{MercadoPagoClient, MercadoPagoConfig};
pub use sendgrid::{SendGridConfig, SendGridMailer};

/// Default timeout for outbound calls, matching the function timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
