//! Checkout Preference Creation
//!
//! Validates the storefront's checkout request, normalizes it into a
//! [`PreferenceRequest`] and creates the preference through the gateway.

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PaymentError, Result};
use crate::gateway::{BackUrls, PaymentGateway, PreferenceItem, PreferencePayer, PreferenceRequest};

/// All prices are in Brazilian reais
pub const CURRENCY: &str = "BRL";

/// Return to the storefront automatically only for approved payments
pub const AUTO_RETURN: &str = "approved";

const DEFAULT_ITEM_ID: &str = "item-default-id";
const DEFAULT_ITEM_TITLE: &str = "Produto";

/// What the storefront gets back
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceResult {
    pub id: String,
    pub init_point: String,
}

/// Creates checkout preferences
pub struct PreferenceCreator {
    gateway: Arc<dyn PaymentGateway>,
    default_notification_url: Option<String>,
}

impl PreferenceCreator {
    pub fn new(gateway: Arc<dyn PaymentGateway>, default_notification_url: Option<String>) -> Self {
        Self {
            gateway,
            default_notification_url,
        }
    }

    /// Validate and create a preference.
    ///
    /// Input errors are returned before the gateway is contacted.
    pub async fn create(&self, data: &Value) -> Result<PreferenceResult> {
        let request = self.build_request(data)?;

        let preference = self
            .gateway
            .create_preference(&request)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    gateway = self.gateway.name(),
                    external_reference = %request.external_reference,
                    "Failed to create payment preference"
                );
                e
            })?;

        if preference.id.is_empty() || preference.init_point.is_empty() {
            tracing::error!(
                external_reference = %request.external_reference,
                "Gateway returned a preference without id or init_point"
            );
            return Err(PaymentError::Gateway("Incomplete preference returned".into()));
        }

        tracing::info!(
            preference_id = %preference.id,
            external_reference = %request.external_reference,
            items = request.items.len(),
            "Created payment preference"
        );

        Ok(PreferenceResult {
            id: preference.id,
            init_point: preference.init_point,
        })
    }

    /// Turn the storefront payload into a gateway request
    pub fn build_request(&self, data: &Value) -> Result<PreferenceRequest> {
        let data = data
            .as_object()
            .ok_or_else(|| invalid("Os dados da requisição são obrigatórios."))?;

        let items = data
            .get("items")
            .and_then(Value::as_array)
            .filter(|items| !items.is_empty())
            .ok_or_else(|| invalid("A lista de 'items' é obrigatória."))?;

        let payer = data.get("payerInfo").filter(|p| p.is_object());
        let email = payer
            .and_then(|p| text(p.get("email")))
            .ok_or_else(|| invalid("As 'payerInfo' com 'email' são obrigatórias."))?;

        let back_urls = data
            .get("backUrls")
            .filter(|b| b.is_object())
            .ok_or_else(|| invalid("As 'backUrls' são obrigatórias."))?;
        let success = text(back_urls.get("success"))
            .ok_or_else(|| invalid("A URL 'backUrls.success' é obrigatória."))?;
        let failure = text(back_urls.get("failure"))
            .ok_or_else(|| invalid("A URL 'backUrls.failure' é obrigatória."))?;
        let pending = text(back_urls.get("pending")).unwrap_or_else(|| success.clone());

        let external_reference = text(data.get("externalReference"))
            .ok_or_else(|| invalid("A 'externalReference' é obrigatória."))?;

        let notification_url =
            text(data.get("notificationUrl")).or_else(|| self.default_notification_url.clone());

        let items = items
            .iter()
            .enumerate()
            .map(|(index, item)| normalize_item(index, item))
            .collect::<Result<Vec<_>>>()?;

        Ok(PreferenceRequest {
            items,
            payer: PreferencePayer {
                name: payer.and_then(|p| text(p.get("name"))).unwrap_or_default(),
                surname: payer.and_then(|p| text(p.get("surname"))).unwrap_or_default(),
                email,
            },
            back_urls: BackUrls {
                success,
                failure,
                pending,
            },
            auto_return: AUTO_RETURN.to_string(),
            external_reference,
            notification_url,
        })
    }
}

fn invalid(message: &str) -> PaymentError {
    PaymentError::InvalidArgument(message.to_string())
}

/// String form of a scalar; empty strings and non-scalars count as absent
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn normalize_item(index: usize, item: &Value) -> Result<PreferenceItem> {
    if !item.is_object() {
        return Err(PaymentError::InvalidArgument(format!(
            "O item {index} da lista 'items' é inválido."
        )));
    }

    let title = text(item.get("title")).unwrap_or_else(|| DEFAULT_ITEM_TITLE.to_string());
    let description = text(item.get("description")).unwrap_or_else(|| title.clone());

    Ok(PreferenceItem {
        id: text(item.get("id")).unwrap_or_else(|| DEFAULT_ITEM_ID.to_string()),
        quantity: quantity(item.get("quantity")).ok_or_else(|| {
            PaymentError::InvalidArgument(format!(
                "O item {index} precisa de 'quantity' inteira e positiva."
            ))
        })?,
        unit_price: unit_price(item.get("unit_price")).ok_or_else(|| {
            PaymentError::InvalidArgument(format!(
                "O item {index} precisa de 'unit_price' numérico e não negativo."
            ))
        })?,
        title,
        description,
        currency_id: CURRENCY.to_string(),
    })
}

/// Numbers and numeric strings; must be a positive whole number
fn quantity(value: Option<&Value>) -> Option<u32> {
    let parsed = decimal(value?)?;
    if parsed <= Decimal::ZERO || !parsed.fract().is_zero() {
        return None;
    }
    parsed.to_u32()
}

/// Numbers and numeric strings; must not be negative
fn unit_price(value: Option<&Value>) -> Option<Decimal> {
    decimal(value?).filter(|price| !price.is_sign_negative())
}

fn decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(&s.trim().replace(',', ".")).ok(),
        _ => None,
    }
}
