//! OAuth access tokens for Firestore

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::FirestoreError;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the token expires
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

/// Where bearer tokens come from
pub enum TokenSource {
    /// Fixed token (emulator, or a token minted outside the process)
    Static(String),

    /// Service account token from the platform metadata server, cached
    /// until shortly before expiry
    Metadata {
        url: String,
        cached: RwLock<Option<(String, Instant)>>,
    },
}

impl TokenSource {
    pub fn metadata() -> Self {
        Self::Metadata {
            url: METADATA_TOKEN_URL.into(),
            cached: RwLock::new(None),
        }
    }

    pub async fn token(&self, http: &Client) -> Result<String, FirestoreError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::Metadata { url, cached } => {
                if let Some((token, expires)) = cached.read().await.as_ref() {
                    if Instant::now() < *expires {
                        return Ok(token.clone());
                    }
                }

                let mut cached = cached.write().await;
                if let Some((token, expires)) = cached.as_ref() {
                    if Instant::now() < *expires {
                        return Ok(token.clone());
                    }
                }

                let fetched = fetch_metadata_token(http, url).await?;
                let expires = Instant::now()
                    + Duration::from_secs(fetched.expires_in).saturating_sub(EXPIRY_MARGIN);
                *cached = Some((fetched.access_token.clone(), expires));
                tracing::debug!(
                    expires_in = fetched.expires_in,
                    "Refreshed Firestore access token"
                );

                Ok(fetched.access_token)
            }
        }
    }
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(_) => f.write_str("TokenSource::Static(<redacted>)"),
            Self::Metadata { url, .. } => write!(f, "TokenSource::Metadata({url})"),
        }
    }
}

async fn fetch_metadata_token(http: &Client, url: &str) -> Result<MetadataToken, FirestoreError> {
    let response = http
        .get(url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FirestoreError::Auth(format!("metadata server: {status} - {body}")));
    }

    response
        .json::<MetadataToken>()
        .await
        .map_err(|e| FirestoreError::Auth(format!("metadata token: {e}")))
}
