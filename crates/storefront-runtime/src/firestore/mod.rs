//! Firestore Document Store
//!
//! Talks to the Firestore REST API. Updates go through `documents:commit`
//! with a `currentDocument.exists` precondition, so a write against an
//! unknown document fails instead of creating it, and timestamps are set by
//! the server (`REQUEST_TIME`).

mod token;
pub mod value;

pub use token::TokenSource;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::{Map, Value, json};
use storefront_contact::{
    ContactError, ContactMessage, EmailStatus, MessageStore, message::MESSAGES_COLLECTION,
};
use storefront_payments::{
    Order, OrderStore, PaymentError, PaymentUpdate,
    order::{ORDERS_COLLECTION, fields as order_fields},
};
use thiserror::Error;

use crate::DEFAULT_TIMEOUT_SECS;

#[derive(Error, Debug)]
pub enum FirestoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid document id: {0:?}")]
    InvalidDocumentId(String),

    #[error("Firestore returned {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Clone, Debug)]
pub struct FirestoreConfig {
    pub project_id: String,

    /// Database id, `(default)` unless configured
    pub database: String,

    /// API root, e.g. `https://firestore.googleapis.com/v1` or an emulator
    pub api_url: String,

    pub timeout_secs: u64,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: "(default)".into(),
            api_url: "https://firestore.googleapis.com/v1".into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Resource name of the documents root
    fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database
        )
    }
}

/// Thin Firestore REST client
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    tokens: TokenSource,
}

impl FirestoreClient {
    pub fn new(config: FirestoreConfig, tokens: TokenSource) -> Result<Self, FirestoreError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            config,
            tokens,
        })
    }

    fn document_name(&self, collection: &str, id: &str) -> Result<String, FirestoreError> {
        validate_document_id(id)?;
        Ok(format!("{}/{collection}/{id}", self.config.documents_root()))
    }

    fn document_url(&self, collection: &str, id: &str) -> Result<Url, FirestoreError> {
        validate_document_id(id)?;
        let mut url = self.root_url()?;
        url.path_segments_mut()
            .map_err(|()| FirestoreError::Decode("api_url cannot be a base".into()))?
            .extend(self.database_segments())
            .extend(["documents", collection, id]);
        Ok(url)
    }

    fn commit_url(&self) -> Result<Url, FirestoreError> {
        let mut url = self.root_url()?;
        url.path_segments_mut()
            .map_err(|()| FirestoreError::Decode("api_url cannot be a base".into()))?
            .extend(self.database_segments())
            .push("documents:commit");
        Ok(url)
    }

    fn database_segments(&self) -> [&str; 4] {
        [
            "projects",
            self.config.project_id.as_str(),
            "databases",
            self.config.database.as_str(),
        ]
    }

    fn root_url(&self) -> Result<Url, FirestoreError> {
        let root = self.config.api_url.trim_end_matches('/');
        Url::parse(root).map_err(|e| FirestoreError::Decode(format!("api_url: {e}")))
    }

    /// Fetch a document's fields as plain JSON
    pub async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Map<String, Value>>, FirestoreError> {
        let url = self.document_url(collection, id)?;
        let token = self.tokens.token(&self.http).await?;

        let response = self.http.get(url).bearer_auth(token).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FirestoreError::Api { status, body });
        }

        let document: Value = response.json().await?;
        Ok(Some(
            document
                .get("fields")
                .and_then(Value::as_object)
                .map(value::decode_fields)
                .unwrap_or_default(),
        ))
    }

    /// Overwrite `fields` on an existing document.
    ///
    /// `server_timestamp` names a field set to the commit time.
    pub async fn update_existing(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
        server_timestamp: Option<&str>,
    ) -> Result<(), FirestoreError> {
        let name = self.document_name(collection, id)?;
        let url = self.commit_url()?;
        let token = self.tokens.token(&self.http).await?;

        let mut write = json!({
            "update": { "name": name, "fields": value::encode_fields(fields) },
            "updateMask": {
                "fieldPaths": fields.keys().map(|k| value::field_path(k)).collect::<Vec<_>>()
            },
            "currentDocument": { "exists": true },
        });
        if let Some(field) = server_timestamp {
            write["updateTransforms"] = json!([
                { "fieldPath": value::field_path(field), "setToServerValue": "REQUEST_TIME" }
            ]);
        }

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "writes": [write] }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(FirestoreError::NotFound(name));
        }
        Err(FirestoreError::Api { status, body })
    }
}

fn validate_document_id(id: &str) -> Result<(), FirestoreError> {
    let valid = !id.is_empty()
        && id.len() <= 1500
        && !id.contains('/')
        && id != "."
        && id != ".."
        && !(id.starts_with("__") && id.ends_with("__"));

    if valid {
        Ok(())
    } else {
        Err(FirestoreError::InvalidDocumentId(id.to_string()))
    }
}

/// Order and message store backed by Firestore
pub struct FirestoreStore {
    client: Arc<FirestoreClient>,
}

impl FirestoreStore {
    pub const fn new(client: Arc<FirestoreClient>) -> Self {
        Self { client }
    }
}

fn order_error(reference: &str, error: FirestoreError) -> PaymentError {
    match error {
        FirestoreError::NotFound(_) | FirestoreError::InvalidDocumentId(_) => {
            PaymentError::OrderNotFound(reference.to_string())
        }
        other => PaymentError::Storage(other.to_string()),
    }
}

fn message_error(id: &str, error: FirestoreError) -> ContactError {
    match error {
        FirestoreError::NotFound(_) | FirestoreError::InvalidDocumentId(_) => {
            ContactError::MessageNotFound(id.to_string())
        }
        other => ContactError::Storage(other.to_string()),
    }
}

#[async_trait]
impl OrderStore for FirestoreStore {
    async fn get(&self, reference: &str) -> storefront_payments::Result<Option<Order>> {
        let document = match self.client.get_document(ORDERS_COLLECTION, reference).await {
            Ok(document) => document,
            Err(FirestoreError::InvalidDocumentId(_)) => return Ok(None),
            Err(e) => return Err(PaymentError::Storage(e.to_string())),
        };

        document
            .map(|fields| {
                serde_json::from_value(Value::Object(fields))
                    .map_err(|e| PaymentError::Storage(format!("order {reference}: {e}")))
            })
            .transpose()
    }

    async fn apply_payment_update(
        &self,
        reference: &str,
        update: &PaymentUpdate,
    ) -> storefront_payments::Result<()> {
        self.client
            .update_existing(
                ORDERS_COLLECTION,
                reference,
                &update.to_fields(),
                Some(order_fields::LAST_WEBHOOK_UPDATE),
            )
            .await
            .map_err(|e| order_error(reference, e))
    }

    fn name(&self) -> &str {
        "firestore"
    }
}

#[async_trait]
impl MessageStore for FirestoreStore {
    async fn get(&self, id: &str) -> storefront_contact::Result<Option<ContactMessage>> {
        let document = match self.client.get_document(MESSAGES_COLLECTION, id).await {
            Ok(document) => document,
            Err(FirestoreError::InvalidDocumentId(_)) => return Ok(None),
            Err(e) => return Err(ContactError::Storage(e.to_string())),
        };

        document
            .map(|fields| {
                serde_json::from_value(Value::Object(fields))
                    .map_err(|e| ContactError::Storage(format!("message {id}: {e}")))
            })
            .transpose()
    }

    async fn record_email_status(
        &self,
        id: &str,
        status: &EmailStatus,
    ) -> storefront_contact::Result<()> {
        self.client
            .update_existing(MESSAGES_COLLECTION, id, &status.to_fields(), None)
            .await
            .map_err(|e| message_error(id, e))
    }

    fn name(&self) -> &str {
        "firestore"
    }
}
