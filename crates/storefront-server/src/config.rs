//! Server Configuration
//!
//! Read once at startup and passed into the application state.

use storefront_payments::{Environment, GatewayCredentials};

/// Contact notification settings
#[derive(Clone)]
pub struct ContactConfig {
    pub sendgrid_api_key: String,
    pub from_email: String,
    pub to_email: String,
}

impl std::fmt::Debug for ContactConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactConfig")
            .field("from_email", &self.from_email)
            .field("to_email", &self.to_email)
            .finish_non_exhaustive()
    }
}

/// Where order and message documents live
#[derive(Clone, Debug)]
pub enum StoreConfig {
    Memory,
    Firestore {
        project_id: String,
        database: Option<String>,
        /// Static bearer token; the metadata server is used when absent
        access_token: Option<String>,
        /// Emulator `host:port`
        emulator_host: Option<String>,
    },
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub environment: Environment,
    pub credentials: GatewayCredentials,
    pub mercadopago_api_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub notification_url: Option<String>,
    pub cors_origins: Vec<String>,
    pub contact: Option<ContactConfig>,
    pub store: StoreConfig,
}

impl ServerConfig {
    /// Load from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup.
    ///
    /// Fails when running in production without a production access token,
    /// or when SendGrid is enabled without a recipient address.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let environment = Environment::detect(&lookup);
        let credentials = GatewayCredentials::resolve(environment, &lookup)?;

        let contact = match var("SENDGRID_API_KEY") {
            Some(sendgrid_api_key) => {
                let to_email = var("CONTACT_TO_EMAIL").ok_or_else(|| {
                    anyhow::anyhow!("CONTACT_TO_EMAIL is required when SENDGRID_API_KEY is set")
                })?;
                Some(ContactConfig {
                    sendgrid_api_key,
                    from_email: var("CONTACT_FROM_EMAIL")
                        .unwrap_or_else(|| "no-reply@localhost".into()),
                    to_email,
                })
            }
            None => None,
        };

        let store = match var("FIRESTORE_PROJECT_ID") {
            Some(project_id) => StoreConfig::Firestore {
                project_id,
                database: var("FIRESTORE_DATABASE"),
                access_token: var("FIRESTORE_ACCESS_TOKEN"),
                emulator_host: var("FIRESTORE_EMULATOR_HOST"),
            },
            None => StoreConfig::Memory,
        };

        let cors_origins = var("CORS_ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into()),
            environment,
            credentials,
            mercadopago_api_url: var("MERCADOPAGO_API_URL"),
            webhook_secret: var("MERCADOPAGO_WEBHOOK_SECRET"),
            notification_url: var("NOTIFICATION_URL"),
            cors_origins,
            contact,
            store,
        })
    }
}
