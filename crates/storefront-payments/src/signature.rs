//! Webhook signature verification
//!
//! MercadoPago signs notifications with HMAC-SHA256. The `x-signature`
//! header carries `ts=<unix>,v1=<hex digest>`; the digest covers the manifest
//! `id:<data.id>;request-id:<x-request-id>;ts:<ts>;`, omitting absent parts.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Verifies `x-signature` headers against the webhook secret
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Check a notification's signature
    pub fn verify(
        &self,
        signature_header: Option<&str>,
        request_id: Option<&str>,
        data_id: Option<&str>,
    ) -> Result<()> {
        let header = signature_header
            .ok_or_else(|| PaymentError::WebhookSignature("missing x-signature header".into()))?;
        let (ts, v1) = parse_header(header)?;

        let expected = hex::decode(v1)
            .map_err(|_| PaymentError::WebhookSignature("v1 is not hex".into()))?;

        let mut mac = self.mac()?;
        mac.update(manifest(data_id, request_id, ts).as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| PaymentError::WebhookSignature("digest mismatch".into()))
    }

    /// Compute the `v1` digest for a manifest; used to sign test fixtures
    pub fn sign(
        &self,
        data_id: Option<&str>,
        request_id: Option<&str>,
        ts: &str,
    ) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(manifest(data_id, request_id, ts).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| PaymentError::Config(format!("invalid webhook secret: {e}")))
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

fn parse_header(header: &str) -> Result<(&str, &str)> {
    let mut ts = None;
    let mut v1 = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("ts", value)) => ts = Some(value.trim()),
            Some(("v1", value)) => v1 = Some(value.trim()),
            _ => {}
        }
    }

    match (ts, v1) {
        (Some(ts), Some(v1)) if !ts.is_empty() && !v1.is_empty() => Ok((ts, v1)),
        _ => Err(PaymentError::WebhookSignature(
            "x-signature must contain ts and v1".into(),
        )),
    }
}

fn manifest(data_id: Option<&str>, request_id: Option<&str>, ts: &str) -> String {
    let mut manifest = String::new();
    if let Some(id) = data_id.filter(|id| !id.is_empty()) {
        // Alphanumeric ids are signed lowercased
        manifest.push_str(&format!("id:{};", id.to_lowercase()));
    }
    if let Some(request_id) = request_id.filter(|r| !r.is_empty()) {
        manifest.push_str(&format!("request-id:{request_id};"));
    }
    manifest.push_str(&format!("ts:{ts};"));
    manifest
}
