//! Storefront HTTP Server
//!
//! Axum-based server for MercadoPago checkout preferences, payment
//! webhooks and contact message notifications.

mod config;
mod handlers;
mod router;
mod state;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_contact::{ContactNotifier, MemoryMessageStore, MessageStore};
use storefront_payments::{MemoryOrderStore, OrderStore, SignatureVerifier};
use storefront_runtime::{
    FirestoreClient, FirestoreConfig, FirestoreStore, MercadoPagoClient, MercadoPagoConfig,
    SendGridConfig, SendGridMailer, TokenSource,
};

use crate::config::{ServerConfig, StoreConfig};
use crate::router::router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;
    tracing::info!(environment = %config.environment, "✓ MercadoPago credentials resolved");

    // Payment gateway
    let mut gateway_config = MercadoPagoConfig::default();
    if let Some(api_url) = &config.mercadopago_api_url {
        gateway_config.api_url.clone_from(api_url);
    }
    let gateway = Arc::new(MercadoPagoClient::new(config.credentials.clone(), gateway_config)?);

    // Document stores
    let (orders, messages): (Arc<dyn OrderStore>, Arc<dyn MessageStore>) = match &config.store {
        StoreConfig::Firestore {
            project_id,
            database,
            access_token,
            emulator_host,
        } => {
            let mut firestore = FirestoreConfig::new(project_id);
            if let Some(database) = database {
                firestore.database.clone_from(database);
            }
            let tokens = match (emulator_host, access_token) {
                (Some(host), _) => {
                    firestore.api_url = format!("http://{host}/v1");
                    TokenSource::Static(access_token.clone().unwrap_or_else(|| "owner".into()))
                }
                (None, Some(token)) => TokenSource::Static(token.clone()),
                (None, None) => TokenSource::metadata(),
            };
            tracing::info!(
                project_id = %project_id,
                database = %firestore.database,
                "✓ Firestore configured"
            );

            let client = Arc::new(FirestoreClient::new(firestore, tokens)?);
            let store = Arc::new(FirestoreStore::new(client));
            (store.clone() as Arc<dyn OrderStore>, store as Arc<dyn MessageStore>)
        }
        StoreConfig::Memory => {
            tracing::warn!("⚠ FIRESTORE_PROJECT_ID not set - using in-memory stores");
            (
                Arc::new(MemoryOrderStore::new()) as Arc<dyn OrderStore>,
                Arc::new(MemoryMessageStore::new()) as Arc<dyn MessageStore>,
            )
        }
    };

    let mut state = AppState::new(
        config.environment,
        gateway,
        orders,
        config.notification_url.clone(),
    );

    if let Some(secret) = &config.webhook_secret {
        state = state.with_signatures(SignatureVerifier::new(secret.clone()));
        tracing::info!("✓ Webhook signature verification enabled");
    } else {
        tracing::warn!("⚠ MERCADOPAGO_WEBHOOK_SECRET not set - webhook signatures not verified");
    }

    if let Some(contact) = &config.contact {
        let mailer = Arc::new(SendGridMailer::new(SendGridConfig::new(
            contact.sendgrid_api_key.clone(),
        ))?);
        state = state.with_contact(ContactNotifier::new(
            mailer,
            messages,
            contact.from_email.clone(),
            contact.to_email.clone(),
        ));
        tracing::info!(to = %contact.to_email, "✓ SendGrid configured");
    } else {
        tracing::warn!("⚠ SendGrid not configured - contact notifications disabled");
        tracing::warn!("  Set SENDGRID_API_KEY and CONTACT_TO_EMAIL in .env");
    }

    let app = router(state, &config.cors_origins);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 storefront server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                     - Health check");
    tracing::info!("  POST /createPaymentPreference    - Create checkout preference");
    tracing::info!("  POST /processPaymentNotification - MercadoPago webhook");
    tracing::info!("  POST /notifyContactMessage       - Contact message email");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
