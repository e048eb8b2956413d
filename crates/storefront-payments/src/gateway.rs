//! Payment Gateway Abstraction
//!
//! Wire types for MercadoPago checkout preferences and payments, plus the
//! [`PaymentGateway`] trait implemented by the REST client and the mock.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PaymentError, Result};

/// Payment gateway trait (Strategy pattern)
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a checkout preference
    async fn create_preference(&self, request: &PreferenceRequest) -> Result<Preference>;

    /// Fetch full payment details by gateway payment id
    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetails>;

    /// Gateway name
    fn name(&self) -> &str;
}

/// Preference creation body
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRequest {
    pub items: Vec<PreferenceItem>,
    pub payer: PreferencePayer,
    pub back_urls: BackUrls,
    pub auto_return: String,
    pub external_reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<String>,
}

/// One line of a preference
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreferenceItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub currency_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferencePayer {
    pub name: String,
    pub surname: String,
    pub email: String,
}

/// Where the payer lands after checkout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

/// Gateway response to a preference creation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Preference {
    pub id: String,
    pub init_point: String,
    #[serde(default)]
    pub sandbox_init_point: Option<String>,
}

/// Payment as returned by the gateway
///
/// `raw` is the untouched payload; it is persisted on the order document.
#[derive(Clone, Debug, PartialEq)]
pub struct PaymentDetails {
    pub status: String,
    pub external_reference: Option<String>,
    pub raw: Value,
}

impl PaymentDetails {
    /// Interpret a raw payment payload
    pub fn from_value(raw: Value) -> Result<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| PaymentError::WebhookParse("Payment is not an object".into()))?;

        let status = obj
            .get("status")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| PaymentError::WebhookParse("Payment has no status".into()))?;

        let external_reference = obj
            .get("external_reference")
            .and_then(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty());

        Ok(Self {
            status,
            external_reference,
            raw,
        })
    }
}
