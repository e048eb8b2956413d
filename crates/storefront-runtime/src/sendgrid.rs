//! SendGrid Mailer
//!
//! Implementation of `Mailer` over the SendGrid v3 mail-send API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use storefront_contact::{ContactError, Mailer, OutgoingEmail, Result};

use crate::DEFAULT_TIMEOUT_SECS;

const SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Clone)]
pub struct SendGridConfig {
    pub api_key: String,
    pub api_url: String,
    pub timeout_secs: u64,
}

impl SendGridConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: SENDGRID_API_URL.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Debug for SendGridConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendGridConfig")
            .field("api_url", &self.api_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct MailSendRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<Address<'a>>,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

impl<'a> MailSendRequest<'a> {
    fn from_email(email: &'a OutgoingEmail) -> Self {
        Self {
            personalizations: vec![Personalization {
                to: vec![Address {
                    email: &email.to,
                    name: None,
                }],
            }],
            from: Address {
                email: &email.from_email,
                name: Some(&email.from_name),
            },
            reply_to: email.reply_to.as_deref().map(|reply_to| Address {
                email: reply_to,
                name: None,
            }),
            subject: &email.subject,
            content: vec![Content {
                kind: "text/html",
                value: &email.html,
            }],
        }
    }
}

/// SendGrid HTTP mailer
pub struct SendGridMailer {
    http: Client,
    config: SendGridConfig,
}

impl SendGridMailer {
    pub fn new(config: SendGridConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ContactError::Config(format!("HTTP client: {e}")))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&MailSendRequest::from_email(email))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to send request to SendGrid");
                ContactError::Mail(e.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, body = %body, "SendGrid rejected the email");
        Err(ContactError::Mail(format!("{status} - {body}")))
    }

    fn name(&self) -> &str {
        "sendgrid"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
    use serde_json::{Value, json};

    use super::*;

    type Seen = Arc<Mutex<Vec<Value>>>;

    async fn serve(status: StatusCode, seen: Seen) -> String {
        let app = Router::new()
            .route(
                "/v3/mail/send",
                post(move |State(seen): State<Seen>, Json(body): Json<Value>| async move {
                    seen.lock().unwrap().push(body);
                    status
                }),
            )
            .with_state(seen);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/v3/mail/send")
    }

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            from_name: "Formulário do Site".into(),
            from_email: "site@shop.com".into(),
            to: "owner@shop.com".into(),
            reply_to: Some("ana@example.com".into()),
            subject: "Nova mensagem de contato de: Ana".into(),
            html: "<p>oi</p>".into(),
        }
    }

    fn mailer(api_url: String) -> SendGridMailer {
        SendGridMailer::new(SendGridConfig {
            api_url,
            ..SendGridConfig::new("SG.key")
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_payload() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mailer = mailer(serve(StatusCode::ACCEPTED, seen.clone()).await);

        mailer.send(&email()).await.unwrap();

        let bodies = seen.lock().unwrap();
        assert_eq!(
            bodies[0],
            json!({
                "personalizations": [{"to": [{"email": "owner@shop.com"}]}],
                "from": {"email": "site@shop.com", "name": "Formulário do Site"},
                "reply_to": {"email": "ana@example.com"},
                "subject": "Nova mensagem de contato de: Ana",
                "content": [{"type": "text/html", "value": "<p>oi</p>"}]
            })
        );
    }

    #[tokio::test]
    async fn test_rejection_is_an_error() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mailer = mailer(serve(StatusCode::UNAUTHORIZED, seen).await);

        let result = mailer.send(&email()).await;
        assert!(matches!(result, Err(ContactError::Mail(msg)) if msg.contains("401")));
    }

    #[test]
    fn test_debug_hides_api_key() {
        assert!(!format!("{:?}", SendGridConfig::new("SG.secret")).contains("SG.secret"));
    }
}
