//! Admin password rotation.
//!
//! The remote change must succeed before any local state moves: a failed
//! remote call leaves the stored configuration and the cached client
//! untouched, so the engine keeps working with the old credential.

use crate::backend::Backend;
use crate::error::EngineError;
use crate::password;
use crate::request::Response;
use tracing::{debug, instrument};

impl Backend {
    #[instrument(skip(self))]
    pub(crate) async fn handle_rotate(&self) -> Result<Response, EngineError> {
        let config = self.require_admin_config().await?;

        let new_password = password::rotation_password();

        let client = self.client().await?;
        client
            .change_password(&config.username, &new_password)
            .await
            .map_err(EngineError::RemoteRotationFailed)?;

        // Remote change confirmed; now persist and drop the cached client so
        // the next acquisition authenticates with the new password.
        let mut cache = self.client_cache.write().await;
        let mut config = self.require_admin_config().await?;
        config.password = new_password;
        self.store_admin_config(&config).await?;
        *cache = None;

        debug!(username = %config.username, "admin password rotated");
        Ok(Response::default())
    }
}
