//! Runtime environment and gateway credential selection
//!
//! Credentials are resolved once at startup into [`GatewayCredentials`] and
//! handed to the gateway client; nothing re-reads the environment per request.

use crate::error::{PaymentError, Result};

/// Production access token variable
pub const PROD_TOKEN_VAR: &str = "MERCADOPAGO_ACCESS_TOKEN_PROD";

/// Test access token variable
pub const TEST_TOKEN_VAR: &str = "MERCADOPAGO_ACCESS_TOKEN_TEST";

/// Sandbox token used when no test token is configured.
///
/// Only ever applied outside production.
pub const SANDBOX_ACCESS_TOKEN: &str = "TEST-0000000000000000-000000-sandbox-storefront";

/// Where the service is running
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Production,
    Test,
}

impl Environment {
    /// Detect the environment from a variable lookup.
    ///
    /// `K_SERVICE` is set by the managed container platform; an explicit
    /// `STOREFRONT_ENV=production` also selects production.
    pub fn detect<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let on_platform = lookup("K_SERVICE").is_some_and(|v| !v.is_empty());
        let explicit = lookup("STOREFRONT_ENV")
            .is_some_and(|v| v.eq_ignore_ascii_case("production"));

        if on_platform || explicit {
            Self::Production
        } else {
            Self::Test
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Test => "test",
        }
    }

    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access token selected for the current environment
#[derive(Clone)]
pub struct GatewayCredentials {
    environment: Environment,
    access_token: String,
}

impl GatewayCredentials {
    pub fn new(environment: Environment, access_token: impl Into<String>) -> Self {
        Self {
            environment,
            access_token: access_token.into(),
        }
    }

    /// Select the access token for `environment`.
    ///
    /// A missing production token is a fatal configuration error. Outside
    /// production the test token falls back to [`SANDBOX_ACCESS_TOKEN`].
    pub fn resolve<F>(environment: Environment, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let configured = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let access_token = match environment {
            Environment::Production => configured(PROD_TOKEN_VAR).ok_or_else(|| {
                tracing::error!(
                    secret = PROD_TOKEN_VAR,
                    "Running in production without a payment access token"
                );
                PaymentError::Config(format!("{PROD_TOKEN_VAR} not set"))
            })?,
            Environment::Test => configured(TEST_TOKEN_VAR).unwrap_or_else(|| {
                tracing::warn!("No test access token configured, using sandbox token");
                SANDBOX_ACCESS_TOKEN.to_string()
            }),
        };

        Ok(Self::new(environment, access_token))
    }

    pub const fn environment(&self) -> Environment {
        self.environment
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl std::fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("environment", &self.environment)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_detect_environment() {
        let platform = vars(&[("K_SERVICE", "createpaymentpreference")]);
        assert_eq!(
            Environment::detect(|k| platform.get(k).cloned()),
            Environment::Production
        );

        let explicit = vars(&[("STOREFRONT_ENV", "Production")]);
        assert_eq!(
            Environment::detect(|k| explicit.get(k).cloned()),
            Environment::Production
        );

        let local = vars(&[]);
        assert_eq!(Environment::detect(|k| local.get(k).cloned()), Environment::Test);
    }

    #[test]
    fn test_production_requires_token() {
        let env = vars(&[(TEST_TOKEN_VAR, "TEST-abc")]);
        let result = GatewayCredentials::resolve(Environment::Production, |k| env.get(k).cloned());
        assert!(matches!(result, Err(PaymentError::Config(_))));
    }

    #[test]
    fn test_production_never_uses_sandbox() {
        let env = vars(&[(PROD_TOKEN_VAR, "  ")]);
        let result = GatewayCredentials::resolve(Environment::Production, |k| env.get(k).cloned());
        assert!(result.is_err());
    }

    #[test]
    fn test_production_token_selected() {
        let env = vars(&[(PROD_TOKEN_VAR, "APP_USR-prod"), (TEST_TOKEN_VAR, "TEST-abc")]);
        let creds =
            GatewayCredentials::resolve(Environment::Production, |k| env.get(k).cloned()).unwrap();
        assert_eq!(creds.access_token(), "APP_USR-prod");
        assert!(creds.environment().is_production());
    }

    #[test]
    fn test_test_token_and_sandbox_fallback() {
        let env = vars(&[(TEST_TOKEN_VAR, "TEST-abc")]);
        let creds =
            GatewayCredentials::resolve(Environment::Test, |k| env.get(k).cloned()).unwrap();
        assert_eq!(creds.access_token(), "TEST-abc");

        let empty = vars(&[]);
        let creds =
            GatewayCredentials::resolve(Environment::Test, |k| empty.get(k).cloned()).unwrap();
        assert_eq!(creds.access_token(), SANDBOX_ACCESS_TOKEN);
    }

    #[test]
    fn test_debug_redacts_token() {
        let creds = GatewayCredentials::new(Environment::Test, "TEST-secret");
        assert!(!format!("{creds:?}").contains("TEST-secret"));
    }
}
