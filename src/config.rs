//! Admin configuration: the credentials and connection parameters used to
//! build the shared Nexus Repository client.
//!
//! Writes merge over the stored record. Providing a new `url` clears the
//! stored password first — a stale password pointed at a new endpoint is
//! unsafe, so the two must be supplied together. Every successful write or
//! delete invalidates the cached client.

use crate::backend::Backend;
use crate::error::EngineError;
use crate::request::{Operation, Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

pub const CONFIG_ADMIN_KEY: &str = "config/admin";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_INSECURE: bool = false;

/// Minimum configuration required to build a Nexus Repository client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
    pub url: String,
    #[serde(default)]
    pub insecure: bool,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl AdminConfig {
    /// Response data for a config read; never includes the password.
    fn response_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("username".to_string(), json!(self.username));
        data.insert("url".to_string(), json!(self.url));
        data.insert("insecure".to_string(), json!(self.insecure));
        data.insert("timeout".to_string(), json!(self.timeout));
        data
    }
}

impl Backend {
    #[instrument(skip(self))]
    pub(crate) async fn handle_config_read(&self) -> Result<Response, EngineError> {
        let _guard = self.client_cache.read().await;

        let config = self.require_admin_config().await?;
        Ok(Response::with_data(config.response_data()))
    }

    #[instrument(skip(self, request))]
    pub(crate) async fn handle_config_write(
        &self,
        request: &Request,
    ) -> Result<Response, EngineError> {
        let mut cache = self.client_cache.write().await;

        let mut config = self.fetch_admin_config().await?.unwrap_or_default();
        let create = request.operation == Operation::Create;

        if let Some(username) = request.str_field("username")? {
            config.username = username.to_string();
        }

        if let Some(url) = request.str_field("url")? {
            config.url = url.to_string();
            // A new endpoint invalidates the stored password; it must be
            // supplied in the same call.
            config.password.clear();
        }

        if let Some(password) = request.str_field("password")? {
            config.password = password.to_string();
        }

        if let Some(insecure) = request.bool_field("insecure")? {
            config.insecure = insecure;
        } else if create {
            config.insecure = DEFAULT_INSECURE;
        }

        if let Some(timeout) = request.u64_field("timeout")? {
            config.timeout = timeout;
        } else if create {
            config.timeout = DEFAULT_TIMEOUT_SECONDS;
        }

        if config.username.is_empty() {
            return Err(EngineError::MissingConfigField("username"));
        }
        if config.url.is_empty() {
            return Err(EngineError::MissingConfigField("url"));
        }
        if config.password.is_empty() {
            return Err(EngineError::MissingConfigField("password"));
        }

        self.store_admin_config(&config).await?;

        // The next acquisition rebuilds from the new configuration.
        *cache = None;

        debug!("admin configuration updated");
        Ok(Response::default())
    }

    #[instrument(skip(self))]
    pub(crate) async fn handle_config_delete(&self) -> Result<Response, EngineError> {
        let mut cache = self.client_cache.write().await;

        if self.fetch_admin_config().await?.is_none() {
            return Err(EngineError::ConfigurationMissing);
        }

        self.storage.delete(CONFIG_ADMIN_KEY).await?;
        *cache = None;

        debug!("admin configuration deleted");
        Ok(Response::default())
    }

    pub(crate) async fn fetch_admin_config(&self) -> Result<Option<AdminConfig>, EngineError> {
        match self.storage.get(CONFIG_ADMIN_KEY).await? {
            Some(record) => {
                let config = serde_json::from_value(record)
                    .map_err(|err| EngineError::Storage(err.into()))?;
                Ok(Some(config))
            }
            None => Ok(None),
        }
    }

    pub(crate) async fn require_admin_config(&self) -> Result<AdminConfig, EngineError> {
        self.fetch_admin_config()
            .await?
            .ok_or(EngineError::ConfigurationMissing)
    }

    pub(crate) async fn store_admin_config(
        &self,
        config: &AdminConfig,
    ) -> Result<(), EngineError> {
        let record =
            serde_json::to_value(config).map_err(|err| EngineError::Storage(err.into()))?;
        self.storage.put(CONFIG_ADMIN_KEY, record).await?;
        Ok(())
    }
}
