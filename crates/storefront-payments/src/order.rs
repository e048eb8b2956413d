//! Order Documents
//!
//! Orders live in the `pedidos` collection, keyed by the external reference
//! the storefront passed when creating the preference. The checkout flow
//! creates them; this crate only applies webhook updates.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PaymentError, Result};

/// Collection holding order documents
pub const ORDERS_COLLECTION: &str = "pedidos";

/// Document field names written by the webhook
pub mod fields {
    pub const STATUS: &str = "statusPagamentoMP";
    pub const PAYMENT_ID: &str = "paymentIdMP";
    pub const PAYMENT_DETAILS: &str = "dadosCompletosPagamentoMP";
    pub const LAST_WEBHOOK_UPDATE: &str = "ultimaAtualizacaoWebhook";
}

/// An order document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(default)]
    pub items: Vec<OrderItem>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<Payer>,

    /// Gateway payment status, absent until the first webhook
    #[serde(rename = "statusPagamentoMP", default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,

    #[serde(rename = "paymentIdMP", default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,

    /// Raw payment payload from the last webhook
    #[serde(
        rename = "dadosCompletosPagamentoMP",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub payment_details: Option<Value>,

    #[serde(
        rename = "ultimaAtualizacaoWebhook",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_webhook_update: Option<DateTime<Utc>>,

    /// Fields written by the storefront that this service does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Order {
    pub fn new(items: Vec<OrderItem>, payer: Payer) -> Self {
        Self {
            items,
            payer: Some(payer),
            ..Default::default()
        }
    }

    /// Order total
    pub fn total(&self) -> Decimal {
        self.items
            .iter()
            .map(|item| item.unit_price * Decimal::from(item.quantity))
            .sum()
    }

    /// Overwrite the webhook-owned fields
    pub fn apply(&mut self, update: &PaymentUpdate, at: DateTime<Utc>) {
        self.payment_status = Some(update.status.clone());
        self.payment_id = Some(update.payment_id.clone());
        self.payment_details = Some(update.payment.clone());
        self.last_webhook_update = Some(at);
    }
}

/// A line in an order
///
/// The admin screens write `nome`/`precoUnitario`, so both spellings load.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(default)]
    pub id: String,

    #[serde(default, alias = "nome")]
    pub title: String,

    #[serde(default, alias = "quantidade")]
    pub quantity: u32,

    #[serde(default, alias = "precoUnitario")]
    pub unit_price: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    pub email: String,
}

/// Fields the webhook writes onto an order
#[derive(Clone, Debug, PartialEq)]
pub struct PaymentUpdate {
    pub status: String,
    pub payment_id: String,
    pub payment: Value,
}

impl PaymentUpdate {
    /// Document fields for this update, excluding the server timestamp
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(fields::STATUS.into(), Value::String(self.status.clone()));
        map.insert(fields::PAYMENT_ID.into(), Value::String(self.payment_id.clone()));
        map.insert(fields::PAYMENT_DETAILS.into(), self.payment.clone());
        map
    }
}

/// Order storage trait
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Get an order by external reference
    async fn get(&self, reference: &str) -> Result<Option<Order>>;

    /// Apply a webhook update to an existing order.
    ///
    /// Never creates a document: an unknown reference yields
    /// [`PaymentError::OrderNotFound`]. The update timestamp is assigned by
    /// the store, not the caller.
    async fn apply_payment_update(&self, reference: &str, update: &PaymentUpdate) -> Result<()>;

    /// Backend name
    fn name(&self) -> &str;
}

/// In-memory order store (for development)
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an order as the checkout flow would
    pub fn insert(&self, reference: impl Into<String>, order: Order) {
        self.orders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(reference.into(), order);
    }

    pub fn len(&self) -> usize {
        self.orders.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn get(&self, reference: &str) -> Result<Option<Order>> {
        let orders = self.orders.read().unwrap_or_else(PoisonError::into_inner);
        Ok(orders.get(reference).cloned())
    }

    async fn apply_payment_update(&self, reference: &str, update: &PaymentUpdate) -> Result<()> {
        let mut orders = self.orders.write().unwrap_or_else(PoisonError::into_inner);

        let order = orders
            .get_mut(reference)
            .ok_or_else(|| PaymentError::OrderNotFound(reference.to_string()))?;
        order.apply(update, Utc::now());

        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn sample_order() -> Order {
        Order::new(
            vec![OrderItem {
                id: "p1".into(),
                title: "Perfume".into(),
                quantity: 2,
                unit_price: dec!(50),
            }],
            Payer {
                name: "Ana".into(),
                surname: "Souza".into(),
                email: "a@b.com".into(),
            },
        )
    }

    fn approved() -> PaymentUpdate {
        PaymentUpdate {
            status: "approved".into(),
            payment_id: "PAY123".into(),
            payment: json!({"id": "PAY123", "status": "approved"}),
        }
    }

    #[test]
    fn test_order_total() {
        assert_eq!(sample_order().total(), dec!(100));
    }

    #[test]
    fn test_document_field_names() {
        let mut order = sample_order();
        order.apply(&approved(), Utc::now());

        let doc = serde_json::to_value(&order).unwrap();
        assert_eq!(doc["statusPagamentoMP"], "approved");
        assert_eq!(doc["paymentIdMP"], "PAY123");
        assert_eq!(doc["dadosCompletosPagamentoMP"]["id"], "PAY123");
        assert!(doc.get("ultimaAtualizacaoWebhook").is_some());
    }

    #[test]
    fn test_loads_storefront_document() {
        let order: Order = serde_json::from_value(json!({
            "cliente": {"nomeCompleto": "Ana Souza"},
            "items": [{"id": "p1", "nome": "Perfume", "quantidade": 1, "precoUnitario": 89.9}],
            "status": "Pendente"
        }))
        .unwrap();

        assert_eq!(order.items[0].title, "Perfume");
        assert_eq!(order.items[0].unit_price, dec!(89.9));
        assert!(order.payment_status.is_none());
        assert_eq!(order.extra["status"], "Pendente");
    }

    #[tokio::test]
    async fn test_update_existing_order() {
        let store = MemoryOrderStore::new();
        store.insert("ORD1", sample_order());

        store.apply_payment_update("ORD1", &approved()).await.unwrap();

        let order = store.get("ORD1").await.unwrap().unwrap();
        assert_eq!(order.payment_status.as_deref(), Some("approved"));
        assert_eq!(order.payment_id.as_deref(), Some("PAY123"));
        assert!(order.last_webhook_update.is_some());
        assert_eq!(order.items.len(), 1);
    }

    #[tokio::test]
    async fn test_update_never_creates() {
        let store = MemoryOrderStore::new();

        let result = store.apply_payment_update("MISSING", &approved()).await;
        assert!(matches!(result, Err(PaymentError::OrderNotFound(r)) if r == "MISSING"));
        assert!(store.is_empty());
    }
}
