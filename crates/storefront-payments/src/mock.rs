//! Mock Payment Gateway
//!
//! For tests and local demos. Issues sandbox-looking preferences and serves
//! payments registered up front.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{PaymentError, Result};
use crate::gateway::{PaymentDetails, PaymentGateway, Preference, PreferenceRequest};

const CHECKOUT_URL: &str = "https://www.mercadopago.com.br/checkout/v1/redirect";

/// Mock gateway with in-memory payments
#[derive(Default)]
pub struct MockGateway {
    payments: RwLock<HashMap<String, Value>>,
    preference_calls: Mutex<Vec<PreferenceRequest>>,
    payment_lookups: Mutex<Vec<String>>,
    preference: Mutex<Option<Preference>>,
    failing: AtomicBool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a payment the gateway will return
    pub fn with_payment(self, payment_id: &str, status: &str, external_reference: &str) -> Self {
        self.insert_payment(
            payment_id,
            json!({
                "id": payment_id,
                "status": status,
                "external_reference": external_reference,
            }),
        );
        self
    }

    /// Register a raw payment payload
    pub fn insert_payment(&self, payment_id: &str, payload: Value) {
        self.payments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(payment_id.to_string(), payload);
    }

    /// Answer every preference request with this preference
    pub fn set_preference(&self, preference: Preference) {
        *self.preference.lock().unwrap_or_else(PoisonError::into_inner) = Some(preference);
    }

    /// Make every call fail as if the gateway were down
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Preference requests received so far
    pub fn preference_calls(&self) -> Vec<PreferenceRequest> {
        self.preference_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Payment ids looked up so far
    pub fn payment_lookups(&self) -> Vec<String> {
        self.payment_lookups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PaymentError::Gateway("mock gateway unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_preference(&self, request: &PreferenceRequest) -> Result<Preference> {
        self.preference_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.check_available()?;

        if let Some(preference) = self
            .preference
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Ok(preference);
        }

        let id = format!("mock-{}", uuid::Uuid::new_v4().simple());
        Ok(Preference {
            init_point: format!("{CHECKOUT_URL}?pref_id={id}"),
            sandbox_init_point: Some(format!(
                "https://sandbox.mercadopago.com.br/checkout/v1/redirect?pref_id={id}"
            )),
            id,
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetails> {
        self.payment_lookups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payment_id.to_string());
        self.check_available()?;

        let payload = self
            .payments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(payment_id)
            .cloned()
            .ok_or_else(|| PaymentError::Gateway(format!("404 payment {payment_id} not found")))?;

        PaymentDetails::from_value(payload)
    }

    fn name(&self) -> &str {
        "MockGateway"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_payment_lookup() {
        let gateway = MockGateway::new().with_payment("PAY123", "approved", "ORD1");

        let payment = gateway.get_payment("PAY123").await.unwrap();
        assert_eq!(payment.status, "approved");
        assert_eq!(payment.external_reference.as_deref(), Some("ORD1"));
        assert_eq!(gateway.payment_lookups(), vec!["PAY123".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_payment() {
        let gateway = MockGateway::new();
        assert!(gateway.get_payment("NOPE").await.is_err());
    }

    #[tokio::test]
    async fn test_failing_gateway() {
        let gateway = MockGateway::new().with_payment("PAY123", "approved", "ORD1");
        gateway.set_failing(true);
        assert!(matches!(
            gateway.get_payment("PAY123").await,
            Err(PaymentError::Gateway(_))
        ));
    }
}
