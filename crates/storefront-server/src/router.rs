//! Router and CORS

use axum::{
    Router,
    http::{HeaderValue, Method, request::Parts},
    routing::{any, get, post},
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    create_payment_preference, health_check, notify_contact_message, process_payment_notification,
};
use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Payments
        .route("/createPaymentPreference", post(create_payment_preference))
        .route("/processPaymentNotification", any(process_payment_notification))
        // Contact
        .route("/notifyContactMessage", post(notify_contact_message))
        .layer(cors(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Browser origins: any localhost port plus the configured storefront origins
fn cors(origins: &[String]) -> CorsLayer {
    let allowed: Vec<String> = origins.to_vec();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .is_ok_and(|origin| is_localhost(origin) || allowed.iter().any(|o| o == origin))
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

fn is_localhost(origin: &str) -> bool {
    let is_port = |port: &str| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit());

    ["http://localhost", "http://127.0.0.1"].iter().any(|host| {
        origin.strip_prefix(host).is_some_and(|rest| {
            rest.is_empty() || rest.strip_prefix(':').is_some_and(is_port)
        })
    })
}
