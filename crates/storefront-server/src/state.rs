//! Application State

use std::sync::Arc;

use storefront_contact::ContactNotifier;
use storefront_payments::{
    Environment, OrderStore, PaymentGateway, PreferenceCreator, SignatureVerifier, WebhookProcessor,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Production or test credentials in use
    pub environment: Environment,

    /// Payment gateway (MercadoPago, or the mock in tests)
    pub gateway: Arc<dyn PaymentGateway>,

    /// Order documents
    pub orders: Arc<dyn OrderStore>,

    pub preferences: Arc<PreferenceCreator>,

    pub webhooks: Arc<WebhookProcessor>,

    /// Webhook signature verifier (None if no secret is configured)
    pub signatures: Option<Arc<SignatureVerifier>>,

    /// Contact notifier (None if no mail provider is configured)
    pub contact: Option<Arc<ContactNotifier>>,
}

impl AppState {
    pub fn new(
        environment: Environment,
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderStore>,
        notification_url: Option<String>,
    ) -> Self {
        Self {
            environment,
            preferences: Arc::new(PreferenceCreator::new(gateway.clone(), notification_url)),
            webhooks: Arc::new(WebhookProcessor::new(gateway.clone(), orders.clone())),
            gateway,
            orders,
            signatures: None,
            contact: None,
        }
    }

    #[must_use]
    pub fn with_signatures(mut self, verifier: SignatureVerifier) -> Self {
        self.signatures = Some(Arc::new(verifier));
        self
    }

    #[must_use]
    pub fn with_contact(mut self, notifier: ContactNotifier) -> Self {
        self.contact = Some(Arc::new(notifier));
        self
    }
}
