//! Client configuration.
//!
//! The database credential is passed explicitly to client builders. Builders call
//! [`ClientConfig::validate`] so a missing secret fails when the client is built, not
//! on the first query.

use serde::Deserialize;

use crate::error::{ZooError, ZooResult};

/// Environment variable read by [`ClientConfig::from_env`].
pub const SECRET_ENV: &str = "FAUNADB_SECRET_KEY";

/// Environment variable holding an optional endpoint override.
pub const ENDPOINT_ENV: &str = "FAUNADB_ENDPOINT";

/// Connection settings for a database client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Credential sent with every query.
    pub secret: String,
    /// Overrides the client's default endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl ClientConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Reads the secret from `FAUNADB_SECRET_KEY` and the endpoint from
    /// `FAUNADB_ENDPOINT`.
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::Configuration`] if the secret is unset or empty.
    pub fn from_env() -> ZooResult<Self> {
        let secret = std::env::var(SECRET_ENV).unwrap_or_default();
        let config = Self {
            secret,
            endpoint: std::env::var(ENDPOINT_ENV).ok(),
        };

        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`ZooError::Configuration`] if the secret is empty.
    pub fn validate(&self) -> ZooResult<()> {
        if self.secret.trim().is_empty() {
            return Err(ZooError::Configuration(format!(
                "a database secret is required (set {SECRET_ENV})"
            )));
        }

        Ok(())
    }
}
