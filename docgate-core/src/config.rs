//! Connection settings consumed by the gateway.
//!
//! Only the connection URL is required. The struct derives `Deserialize` so it can be
//! embedded in an application's own configuration file, or it can be read from the
//! process environment with [`GatewayConfig::from_env`].

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};

/// Environment variable holding the connection URL.
pub const URL_ENV: &str = "DOCGATE_MONGO_URL";
/// Environment variable holding the optional database name.
pub const DATABASE_ENV: &str = "DOCGATE_MONGO_DATABASE";

/// Settings used to dial the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Transport address of the database, e.g. `mongodb://localhost:27017/app`.
    pub url: String,
    /// Database to use when the URL does not name one.
    #[serde(default)]
    pub database: Option<String>,
}

impl GatewayConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: None,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Reads the configuration from [`URL_ENV`] and [`DATABASE_ENV`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] if the URL variable is unset or empty.
    pub fn from_env() -> GatewayResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> GatewayResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(URL_ENV)
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| GatewayError::Configuration(format!("{URL_ENV} is not set")))?;

        Ok(Self {
            url,
            database: lookup(DATABASE_ENV).filter(|name| !name.trim().is_empty()),
        })
    }
}

impl From<&str> for GatewayConfig {
    fn from(url: &str) -> Self {
        GatewayConfig::new(url)
    }
}

impl From<String> for GatewayConfig {
    fn from(url: String) -> Self {
        GatewayConfig::new(url)
    }
}
