//! MercadoPago Gateway
//!
//! Implementation of `PaymentGateway` over the MercadoPago REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use storefront_payments::{
    GatewayCredentials, PaymentDetails, PaymentError, PaymentGateway, Preference,
    PreferenceRequest, Result, webhook::is_valid_payment_id,
};

use crate::DEFAULT_TIMEOUT_SECS;

/// MercadoPago client configuration
#[derive(Clone, Debug)]
pub struct MercadoPagoConfig {
    /// API base URL
    pub api_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for MercadoPagoConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.mercadopago.com".into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// MercadoPago REST client
pub struct MercadoPagoClient {
    http: Client,
    config: MercadoPagoConfig,
    credentials: GatewayCredentials,
}

impl MercadoPagoClient {
    pub fn new(credentials: GatewayCredentials, config: MercadoPagoConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaymentError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url.trim_end_matches('/'))
    }

    /// Turn a non-2xx response into a gateway error carrying status and body
    async fn check(response: Response, operation: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            operation,
            status = %status,
            body = %body,
            "MercadoPago returned an error"
        );
        Err(PaymentError::Gateway(format!("{operation}: {status} - {body}")))
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    async fn create_preference(&self, request: &PreferenceRequest) -> Result<Preference> {
        let response = self
            .http
            .post(self.url("/checkout/preferences"))
            .bearer_auth(self.credentials.access_token())
            .header("X-Idempotency-Key", uuid::Uuid::new_v4().to_string())
            .json(request)
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(format!("create preference: {e}")))?;

        Self::check(response, "create preference")
            .await?
            .json::<Preference>()
            .await
            .map_err(|e| PaymentError::Gateway(format!("preference response: {e}")))
    }

    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetails> {
        if !is_valid_payment_id(payment_id) {
            return Err(PaymentError::WebhookParse(format!(
                "malformed payment id {payment_id:?}"
            )));
        }

        let response = self
            .http
            .get(self.url(&format!("/v1/payments/{payment_id}")))
            .bearer_auth(self.credentials.access_token())
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(format!("get payment: {e}")))?;

        let payload = Self::check(response, "get payment")
            .await?
            .json::<Value>()
            .await
            .map_err(|e| PaymentError::Gateway(format!("payment response: {e}")))?;

        PaymentDetails::from_value(payload)
    }

    fn name(&self) -> &str {
        "MercadoPago"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Json, Router,
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
    };
    use serde_json::json;
    use storefront_payments::{BackUrls, Environment, PreferenceItem, PreferencePayer};

    use super::*;

    #[derive(Clone, Default)]
    struct Seen {
        auth: Arc<Mutex<Vec<String>>>,
        bodies: Arc<Mutex<Vec<Value>>>,
    }

    async fn create(
        State(seen): State<Seen>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let auth = headers["authorization"].to_str().unwrap_or_default().to_string();
        seen.auth.lock().unwrap().push(auth);
        seen.bodies.lock().unwrap().push(body);
        Json(json!({
            "id": "123-abc",
            "init_point": "https://www.mercadopago.com.br/checkout/v1/redirect?pref_id=123-abc",
            "sandbox_init_point":
                "https://sandbox.mercadopago.com.br/checkout/v1/redirect?pref_id=123-abc"
        }))
    }

    async fn payment(Path(id): Path<String>) -> std::result::Result<Json<Value>, StatusCode> {
        match id.as_str() {
            "123" => Ok(Json(json!({
                "id": 123,
                "status": "approved",
                "external_reference": "ORD1"
            }))),
            _ => Err(StatusCode::NOT_FOUND),
        }
    }

    async fn serve(seen: Seen) -> String {
        let app = Router::new()
            .route("/checkout/preferences", post(create))
            .route("/v1/payments/{id}", get(payment))
            .with_state(seen);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    fn client(api_url: String) -> MercadoPagoClient {
        MercadoPagoClient::new(
            GatewayCredentials::new(Environment::Test, "TEST-token"),
            MercadoPagoConfig {
                api_url,
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn request() -> PreferenceRequest {
        PreferenceRequest {
            items: vec![PreferenceItem {
                id: "p1".into(),
                title: "Perfume".into(),
                description: "Perfume".into(),
                quantity: 1,
                unit_price: 50.into(),
                currency_id: "BRL".into(),
            }],
            payer: PreferencePayer {
                email: "a@b.com".into(),
                ..Default::default()
            },
            back_urls: BackUrls {
                success: "https://x/s".into(),
                failure: "https://x/f".into(),
                pending: "https://x/s".into(),
            },
            auto_return: "approved".into(),
            external_reference: "ORD1".into(),
            notification_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_preference_over_http() {
        let seen = Seen::default();
        let client = client(serve(seen.clone()).await);

        let preference = client.create_preference(&request()).await.unwrap();

        assert_eq!(preference.id, "123-abc");
        assert!(preference.init_point.contains("pref_id=123-abc"));
        assert_eq!(seen.auth.lock().unwrap()[0], "Bearer TEST-token");
        let bodies = seen.bodies.lock().unwrap();
        let body = &bodies[0];
        assert_eq!(body["external_reference"], "ORD1");
        assert_eq!(body["items"][0]["unit_price"], json!(50.0));
        assert!(body.get("notification_url").is_none());
    }

    #[tokio::test]
    async fn test_get_payment_over_http() {
        let client = client(serve(Seen::default()).await);

        let payment = client.get_payment("123").await.unwrap();
        assert_eq!(payment.status, "approved");
        assert_eq!(payment.external_reference.as_deref(), Some("ORD1"));

        let missing = client.get_payment("999").await;
        assert!(matches!(missing, Err(PaymentError::Gateway(msg)) if msg.contains("404")));
    }

    #[tokio::test]
    async fn test_malformed_payment_id_never_sent() {
        let client = client("http://127.0.0.1:9".into());
        let result = client.get_payment("../admin").await;
        assert!(matches!(result, Err(PaymentError::WebhookParse(_))));
    }
}
