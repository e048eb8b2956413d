//! Payment Webhook Handling
//!
//! Reconciles MercadoPago payment notifications with order documents.
//! Each delivery is handled on its own: fetch the payment, overwrite the
//! order's payment fields. Errors bubble up so the HTTP layer answers 500 and
//! the gateway redelivers.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{PaymentError, Result};
use crate::gateway::PaymentGateway;
use crate::order::{OrderStore, PaymentUpdate};

/// Notification type that triggers reconciliation
pub const PAYMENT_TOPIC: &str = "payment";

/// A notification as delivered by the gateway
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Notification {
    pub kind: Option<String>,
    pub payment_id: Option<String>,
    pub action: Option<String>,

    /// Payment id came from the IPN query string, which carries no signature
    pub legacy: bool,
}

impl Notification {
    /// Read a notification from the JSON body, falling back to the legacy
    /// IPN query parameters (`type`/`topic`, `data.id`/`id`).
    pub fn parse(body: &Value, query: &HashMap<String, String>) -> Self {
        let kind = body
            .get("type")
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| query.get("type").cloned())
            .or_else(|| query.get("topic").cloned());

        let body_id = body
            .get("data")
            .and_then(|data| data.get("id"))
            .and_then(id_text)
            .filter(|id| !id.is_empty());
        let legacy = body_id.is_none();

        let payment_id = body_id
            .or_else(|| query.get("data.id").cloned())
            .or_else(|| query.get("id").cloned())
            .filter(|id| !id.trim().is_empty());

        let action = body.get("action").and_then(Value::as_str).map(String::from);

        Self {
            kind,
            legacy: legacy && payment_id.is_some(),
            payment_id,
            action,
        }
    }

    /// Payment notification carrying an id
    pub fn is_payment(&self) -> bool {
        self.kind.as_deref() == Some(PAYMENT_TOPIC) && self.payment_id.is_some()
    }
}

/// Payment ids are numeric; anything outside ASCII alphanumerics can never
/// be looked up
pub fn is_valid_payment_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// What happened to a notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Not a payment notification; acknowledged without action
    Ignored { kind: Option<String> },

    /// Order updated with the fetched payment
    Updated {
        reference: String,
        payment_id: String,
        status: String,
    },

    /// Payment carries no external reference; nothing to update
    Unreferenced { payment_id: String, status: String },

    /// Payment id that no lookup can resolve; acknowledged so it is not
    /// redelivered
    Malformed { payment_id: String },
}

impl WebhookOutcome {
    /// Acknowledged without looking at any payment
    pub const fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored { .. } | Self::Malformed { .. })
    }
}

/// Webhook processor
pub struct WebhookProcessor {
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderStore>,
}

impl WebhookProcessor {
    pub fn new(gateway: Arc<dyn PaymentGateway>, orders: Arc<dyn OrderStore>) -> Self {
        Self { gateway, orders }
    }

    /// Process a notification
    pub async fn process(&self, notification: &Notification) -> Result<WebhookOutcome> {
        let payment_id = match (&notification.payment_id, notification.is_payment()) {
            (Some(id), true) => id.clone(),
            _ => {
                tracing::debug!(
                    kind = ?notification.kind,
                    action = ?notification.action,
                    "Notification does not require action"
                );
                return Ok(WebhookOutcome::Ignored {
                    kind: notification.kind.clone(),
                });
            }
        };

        if !is_valid_payment_id(&payment_id) {
            tracing::warn!(payment_id = %payment_id, "Malformed payment id, acknowledging");
            return Ok(WebhookOutcome::Malformed { payment_id });
        }

        tracing::info!(
            payment_id = %payment_id,
            action = ?notification.action,
            legacy = notification.legacy,
            "Processing payment notification"
        );

        let payment = self.gateway.get_payment(&payment_id).await.map_err(|e| {
            tracing::error!(payment_id = %payment_id, error = %e, "Failed to fetch payment");
            e
        })?;

        let Some(reference) = payment.external_reference.clone() else {
            tracing::warn!(
                payment_id = %payment_id,
                status = %payment.status,
                "Payment has no external reference, nothing to update"
            );
            return Ok(WebhookOutcome::Unreferenced {
                payment_id,
                status: payment.status,
            });
        };

        let update = PaymentUpdate {
            status: payment.status.clone(),
            payment_id: payment_id.clone(),
            payment: payment.raw,
        };

        self.orders
            .apply_payment_update(&reference, &update)
            .await
            .map_err(|e| {
                match &e {
                    PaymentError::OrderNotFound(_) => tracing::warn!(
                        payment_id = %payment_id,
                        reference = %reference,
                        "Payment references an unknown order"
                    ),
                    _ => tracing::error!(
                        payment_id = %payment_id,
                        reference = %reference,
                        error = %e,
                        "Failed to update order"
                    ),
                }
                e
            })?;

        tracing::info!(
            reference = %reference,
            payment_id = %payment_id,
            status = %update.status,
            "Order payment status updated"
        );

        Ok(WebhookOutcome::Updated {
            reference,
            payment_id,
            status: update.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use crate::order::{MemoryOrderStore, Order, Payer};
    use serde_json::json;

    fn no_query() -> HashMap<String, String> {
        HashMap::new()
    }

    fn from_body(body: Value) -> Notification {
        Notification::parse(&body, &no_query())
    }

    fn store_with_order() -> Arc<MemoryOrderStore> {
        let store = Arc::new(MemoryOrderStore::new());
        store.insert(
            "ORD1",
            Order::new(
                vec![],
                Payer {
                    email: "a@b.com".into(),
                    ..Default::default()
                },
            ),
        );
        store
    }

    #[test]
    fn test_parse_body_notification() {
        let n = from_body(json!({
            "type": "payment",
            "action": "payment.updated",
            "data": {"id": "PAY123"}
        }));
        assert!(n.is_payment());
        assert!(!n.legacy);
        assert_eq!(n.payment_id.as_deref(), Some("PAY123"));
        assert_eq!(n.action.as_deref(), Some("payment.updated"));

        let n = from_body(json!({"type": "payment", "data": {"id": 987654}}));
        assert_eq!(n.payment_id.as_deref(), Some("987654"));
    }

    #[test]
    fn test_parse_query_notification() {
        let query = HashMap::from([
            ("topic".to_string(), "payment".to_string()),
            ("id".to_string(), "555".to_string()),
        ]);
        let n = Notification::parse(&Value::Null, &query);
        assert!(n.is_payment());
        assert!(n.legacy);
        assert_eq!(n.payment_id.as_deref(), Some("555"));
    }

    #[test]
    fn test_parse_query_type_and_data_id() {
        let query = HashMap::from([
            ("type".to_string(), "payment".to_string()),
            ("data.id".to_string(), "777".to_string()),
        ]);
        let n = Notification::parse(&Value::Null, &query);
        assert!(n.is_payment());
        assert!(n.legacy);
        assert_eq!(n.kind.as_deref(), Some("payment"));
        assert_eq!(n.payment_id.as_deref(), Some("777"));
    }

    #[test]
    fn test_body_id_wins_over_query() {
        let query = HashMap::from([("data.id".to_string(), "777".to_string())]);
        let n = Notification::parse(&json!({"type": "payment", "data": {"id": "PAY1"}}), &query);
        assert_eq!(n.payment_id.as_deref(), Some("PAY1"));
        assert!(!n.legacy);
    }

    #[test]
    fn test_payment_id_validation() {
        assert!(is_valid_payment_id("123456789"));
        assert!(is_valid_payment_id("PAY123"));
        assert!(!is_valid_payment_id(""));
        assert!(!is_valid_payment_id("../v1/users"));
        assert!(!is_valid_payment_id("12 34"));
    }

    #[test]
    fn test_payment_without_id_is_not_actionable() {
        let n = from_body(json!({"type": "payment", "data": {}}));
        assert!(!n.is_payment());
    }

    #[tokio::test]
    async fn test_non_payment_is_ignored() {
        let gateway = Arc::new(MockGateway::new());
        let store = store_with_order();
        let processor = WebhookProcessor::new(gateway.clone(), store.clone());

        let n = from_body(json!({"type": "merchant_order", "data": {"id": "MO1"}}));
        let outcome = processor.process(&n).await.unwrap();

        assert!(outcome.is_ignored());
        assert!(gateway.payment_lookups().is_empty());
        let order = store.get("ORD1").await.unwrap().unwrap();
        assert!(order.payment_status.is_none());
    }

    #[tokio::test]
    async fn test_payment_updates_order() {
        let gateway = Arc::new(MockGateway::new().with_payment("PAY123", "approved", "ORD1"));
        let store = store_with_order();
        let processor = WebhookProcessor::new(gateway, store.clone());

        let n = from_body(json!({"type": "payment", "data": {"id": "PAY123"}}));
        let outcome = processor.process(&n).await.unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Updated {
                reference: "ORD1".into(),
                payment_id: "PAY123".into(),
                status: "approved".into(),
            }
        );
        let order = store.get("ORD1").await.unwrap().unwrap();
        assert_eq!(order.payment_status.as_deref(), Some("approved"));
        assert_eq!(order.payment_id.as_deref(), Some("PAY123"));
        assert_eq!(order.payment_details.unwrap()["external_reference"], "ORD1");
    }

    #[tokio::test]
    async fn test_duplicate_delivery_converges() {
        let gateway = Arc::new(MockGateway::new().with_payment("PAY123", "approved", "ORD1"));
        let store = store_with_order();
        let processor = WebhookProcessor::new(gateway, store.clone());
        let n = from_body(json!({"type": "payment", "data": {"id": "PAY123"}}));

        processor.process(&n).await.unwrap();
        let mut once = store.get("ORD1").await.unwrap().unwrap();
        processor.process(&n).await.unwrap();
        let mut twice = store.get("ORD1").await.unwrap().unwrap();

        once.last_webhook_update = None;
        twice.last_webhook_update = None;
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_status_follows_latest_payment() {
        let gateway = Arc::new(MockGateway::new().with_payment("PAY123", "pending", "ORD1"));
        let store = store_with_order();
        let processor = WebhookProcessor::new(gateway.clone(), store.clone());
        let n = from_body(json!({"type": "payment", "data": {"id": "PAY123"}}));

        processor.process(&n).await.unwrap();
        gateway.insert_payment(
            "PAY123",
            json!({"id": "PAY123", "status": "approved", "external_reference": "ORD1"}),
        );
        processor.process(&n).await.unwrap();

        let order = store.get("ORD1").await.unwrap().unwrap();
        assert_eq!(order.payment_status.as_deref(), Some("approved"));
    }

    #[tokio::test]
    async fn test_unknown_reference_is_an_error() {
        let gateway = Arc::new(MockGateway::new().with_payment("PAY9", "approved", "GHOST"));
        let store = store_with_order();
        let processor = WebhookProcessor::new(gateway, store.clone());

        let n = from_body(json!({"type": "payment", "data": {"id": "PAY9"}}));
        let result = processor.process(&n).await;

        assert!(matches!(result, Err(PaymentError::OrderNotFound(r)) if r == "GHOST"));
        assert!(store.get("GHOST").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_gateway_failure_propagates() {
        let gateway = Arc::new(MockGateway::new().with_payment("PAY123", "approved", "ORD1"));
        gateway.set_failing(true);
        let processor = WebhookProcessor::new(gateway, store_with_order());

        let n = from_body(json!({"type": "payment", "data": {"id": "PAY123"}}));
        assert!(processor.process(&n).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_payment_id_is_acknowledged() {
        let gateway = Arc::new(MockGateway::new());
        let processor = WebhookProcessor::new(gateway.clone(), store_with_order());

        let n = from_body(json!({"type": "payment", "data": {"id": "12/../34"}}));
        let outcome = processor.process(&n).await.unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Malformed {
                payment_id: "12/../34".into()
            }
        );
        assert!(outcome.is_ignored());
        assert!(gateway.payment_lookups().is_empty());
    }

    #[tokio::test]
    async fn test_payment_without_reference() {
        let gateway = Arc::new(MockGateway::new());
        gateway.insert_payment("PAY5", json!({"id": "PAY5", "status": "approved"}));
        let store = store_with_order();
        let processor = WebhookProcessor::new(gateway, store);

        let n = from_body(json!({"type": "payment", "data": {"id": "PAY5"}}));
        let outcome = processor.process(&n).await.unwrap();
        assert!(matches!(outcome, WebhookOutcome::Unreferenced { .. }));
    }
}
