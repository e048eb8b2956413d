//! HTTP Handlers

use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State, rejection::JsonRejection},
    http::{HeaderMap, Method, StatusCode},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use storefront_contact::ContactError;
use storefront_payments::{Notification, PaymentError, PreferenceResult};

use crate::state::AppState;

const WEBHOOK_OK: &str = "OK.";
const WEBHOOK_NO_ACTION: &str = "Notificação recebida, mas não requer ação.";
const WEBHOOK_METHOD_NOT_ALLOWED: &str = "Method Not Allowed.";
const WEBHOOK_INVALID_SIGNATURE: &str = "Assinatura inválida.";
const WEBHOOK_FAILED: &str = "Erro interno ao processar pagamento.";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub environment: &'static str,
    pub gateway: String,
    pub order_store: String,
    pub signature_verification: bool,
    pub contact_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    fn new(status: StatusCode, error: &str, code: &str) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                error: error.into(),
                code: code.into(),
            }),
        )
    }
}

/// Callable-function success envelope
#[derive(Debug, Serialize)]
pub struct CallableResponse<T> {
    pub result: T,
}

/// Callable-function error envelope
#[derive(Debug, Serialize)]
pub struct CallableError {
    pub error: CallableErrorBody,
}

#[derive(Debug, Serialize)]
pub struct CallableErrorBody {
    pub status: &'static str,
    pub message: String,
}

impl CallableError {
    fn invalid_argument(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::BAD_REQUEST,
            Json(Self {
                error: CallableErrorBody {
                    status: "INVALID_ARGUMENT",
                    message: message.into(),
                },
            }),
        )
    }

    fn internal(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Self {
                error: CallableErrorBody {
                    status: "INTERNAL",
                    message: message.into(),
                },
            }),
        )
    }

    fn from_payment(err: &PaymentError) -> (StatusCode, Json<Self>) {
        if err.is_invalid_argument() {
            Self::invalid_argument(err.user_message())
        } else {
            Self::internal(err.user_message())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ContactNotificationRequest {
    /// Message document id; the fields are read from the stored document
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct ContactNotificationResponse {
    pub id: String,
    #[serde(rename = "statusEmail")]
    pub status: &'static str,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.environment.as_str(),
        gateway: state.gateway.name().to_string(),
        order_store: state.orders.name().to_string(),
        signature_verification: state.signatures.is_some(),
        contact_configured: state.contact.is_some(),
    })
}

/// Create a checkout preference (callable protocol)
pub async fn create_payment_preference(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CallableResponse<PreferenceResult>>, (StatusCode, Json<CallableError>)> {
    let request: Value = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Callable request is not valid JSON");
        CallableError::invalid_argument("Corpo da requisição inválido.")
    })?;
    let data = request.get("data").unwrap_or(&Value::Null);

    let result = state
        .preferences
        .create(data)
        .await
        .map_err(|e| CallableError::from_payment(&e))?;

    Ok(Json(CallableResponse { result }))
}

/// MercadoPago webhook
pub async fn process_payment_notification(
    State(state): State<AppState>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    if method != Method::POST {
        tracing::warn!(method = %method, "Webhook called with unsupported method");
        return (StatusCode::METHOD_NOT_ALLOWED, WEBHOOK_METHOD_NOT_ALLOWED);
    }

    let payload = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Webhook body is not valid JSON");
            Value::Null
        })
    };

    let notification = Notification::parse(&payload, &query);
    tracing::info!(
        kind = ?notification.kind,
        payment_id = ?notification.payment_id,
        legacy = notification.legacy,
        "Webhook received"
    );

    // IPN query notifications carry no signature
    match &state.signatures {
        Some(_) if notification.is_payment() && notification.legacy => {
            tracing::debug!(
                payment_id = ?notification.payment_id,
                "Legacy IPN notification, signature not checked"
            );
        }
        Some(verifier) if notification.is_payment() => {
            let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
            if let Err(e) = verifier.verify(
                header("x-signature"),
                header("x-request-id"),
                notification.payment_id.as_deref(),
            ) {
                tracing::warn!(
                    payment_id = ?notification.payment_id,
                    error = %e,
                    "Webhook signature rejected"
                );
                return (StatusCode::UNAUTHORIZED, WEBHOOK_INVALID_SIGNATURE);
            }
        }
        _ => {}
    }

    match state.webhooks.process(&notification).await {
        Ok(outcome) if outcome.is_ignored() => (StatusCode::OK, WEBHOOK_NO_ACTION),
        Ok(_) => (StatusCode::OK, WEBHOOK_OK),
        Err(e) => {
            tracing::error!(
                payment_id = ?notification.payment_id,
                retryable = e.is_retryable(),
                error = %e,
                "Webhook processing failed"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, WEBHOOK_FAILED)
        }
    }
}

/// Notify the store owner about a new contact message
pub async fn notify_contact_message(
    State(state): State<AppState>,
    payload: Result<Json<ContactNotificationRequest>, JsonRejection>,
) -> Result<Json<ContactNotificationResponse>, (StatusCode, Json<ErrorResponse>)> {
    let notifier = state.contact.as_ref().ok_or_else(|| {
        ErrorResponse::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Notificações de contato não configuradas.",
            "CONTACT_DISABLED",
        )
    })?;

    let Json(request) = payload.map_err(|e| {
        tracing::warn!(error = %e, "Invalid contact notification payload");
        ErrorResponse::new(StatusCode::BAD_REQUEST, "Mensagem inválida.", "INVALID_MESSAGE")
    })?;

    if request.id.trim().is_empty() {
        return Err(ErrorResponse::new(
            StatusCode::BAD_REQUEST,
            "O 'id' da mensagem é obrigatório.",
            "INVALID_MESSAGE",
        ));
    }

    let status = notifier
        .notify(&request.id)
        .await
        .map_err(|e| {
            let (status, code) = match &e {
                ContactError::InvalidMessage(_) => (StatusCode::BAD_REQUEST, "INVALID_MESSAGE"),
                ContactError::MessageNotFound(_) => (StatusCode::NOT_FOUND, "MESSAGE_NOT_FOUND"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "CONTACT_ERROR"),
            };
            tracing::error!(message_id = %request.id, error = %e, "Contact notification failed");
            ErrorResponse::new(status, e.user_message(), code)
        })?;

    Ok(Json(ContactNotificationResponse {
        id: request.id,
        status: status.label(),
    }))
}
