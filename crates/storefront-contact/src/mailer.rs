//! Outgoing mail

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{ContactError, Result};
use crate::message::ContactMessage;

/// Display name on notification emails
pub const FROM_NAME: &str = "Formulário do Site";

/// Mail delivery trait
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;

    fn name(&self) -> &str;
}

/// A rendered email ready for delivery
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub from_name: String,
    pub from_email: String,
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub html: String,
}

impl OutgoingEmail {
    /// Owner notification for a contact message
    pub fn contact_notification(message: &ContactMessage, from_email: &str, to: &str) -> Self {
        let nome = escape_html(&message.nome);
        let email = escape_html(&message.email);
        let mensagem = escape_html(&message.mensagem).replace('\n', "<br>");

        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; line-height: 1.6;">
    <h2>Nova Mensagem do Site</h2>
    <p>Você recebeu uma nova mensagem através do formulário de contato.</p>
    <hr>
    <p><strong>Nome:</strong> {nome}</p>
    <p><strong>E-mail do remetente:</strong> {email}</p>
    <p><strong>Mensagem:</strong></p>
    <blockquote style="border-left: 4px solid #ccc; padding-left: 16px; margin: 0;">
      <p>{mensagem}</p>
    </blockquote>
</div>"#
        );

        Self {
            from_name: FROM_NAME.to_string(),
            from_email: from_email.to_string(),
            to: to.to_string(),
            reply_to: Some(message.email.trim().to_string()).filter(|e| e.contains('@')),
            subject: format!("Nova mensagem de contato de: {}", message.nome.trim()),
            html,
        }
    }
}

/// Escape text for inclusion in HTML
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Mailer that keeps sent emails in memory (for tests and local runs)
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ContactError::Mail("recording mailer set to fail".into()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(email.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_escapes_user_input() {
        let message = ContactMessage {
            nome: "Ana <script>".into(),
            email: "ana@example.com".into(),
            mensagem: "Olá & <b>oi</b>\nsegunda linha".into(),
        };
        let email =
            OutgoingEmail::contact_notification(&message, "site@shop.com", "owner@shop.com");

        assert!(email.html.contains("Ana &lt;script&gt;"));
        assert!(email.html.contains("Olá &amp; &lt;b&gt;oi&lt;/b&gt;<br>segunda linha"));
        assert!(!email.html.contains("<script>"));
        assert_eq!(email.subject, "Nova mensagem de contato de: Ana <script>");
        assert_eq!(email.reply_to.as_deref(), Some("ana@example.com"));
        assert_eq!(email.from_name, "Formulário do Site");
    }

    #[test]
    fn test_reply_to_skipped_for_invalid_address() {
        let message = ContactMessage {
            nome: "Ana".into(),
            email: "não tenho".into(),
            mensagem: "oi".into(),
        };
        let email = OutgoingEmail::contact_notification(&message, "a@b.com", "c@d.com");
        assert!(email.reply_to.is_none());
    }
}
