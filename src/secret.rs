//! Lifecycle callbacks for issued credentials.
//!
//! The host's lease machinery stores the internal data attached at issuance
//! and hands it back here when a lease expires (revoke) or is extended
//! (renew). Revoke is the only transition that touches the remote system.

use crate::backend::Backend;
use crate::error::EngineError;
use crate::request::LeaseBounds;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

/// Secret type identifier registered with the host for issued users.
pub const NEXUS_USER_SECRET_TYPE: &str = "nexus_repository_user";

impl Backend {
    /// Delete the remote user recorded on the lease.
    ///
    /// On failure the lease is presumed NOT revoked; the host is expected to
    /// retry revocation later.
    ///
    /// # Errors
    /// Returns an error if the lease lacks `user_id`, the client cannot be
    /// obtained, or the remote delete fails.
    #[instrument(skip(self, internal_data))]
    pub async fn revoke_user(
        &self,
        internal_data: &Map<String, Value>,
    ) -> Result<(), EngineError> {
        // Checked before any client work so a malformed lease never reaches
        // the remote system.
        let user_id = internal_data
            .get("user_id")
            .and_then(Value::as_str)
            .ok_or(EngineError::MissingLeaseData("user_id"))?;

        let client = self.client().await?;

        client
            .delete_user(user_id)
            .await
            .map_err(|source| EngineError::RemoteRevocationFailed {
                user_id: user_id.to_string(),
                source,
            })?;

        debug!(user_id, "revoked Nexus Repository user");
        Ok(())
    }

    /// Recompute the lease bounds from the role recorded on the lease.
    ///
    /// Renewal is rejected when the role has been deleted since issuance.
    /// Does not contact the remote system.
    ///
    /// # Errors
    /// Returns an error if the lease lacks `role` or the role no longer
    /// exists.
    #[instrument(skip(self, internal_data))]
    pub async fn renew_user(
        &self,
        internal_data: &Map<String, Value>,
    ) -> Result<LeaseBounds, EngineError> {
        let role_name = internal_data
            .get("role")
            .and_then(Value::as_str)
            .ok_or(EngineError::MissingLeaseData("role"))?;

        let role = {
            let _roles = self.roles_lock.read().await;
            self.fetch_role(role_name).await?
        }
        .ok_or_else(|| EngineError::RenewalRoleMissing(role_name.to_string()))?;

        Ok(role.lease_bounds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG_ADMIN_KEY;
    use crate::request::{Operation, Request};
    use crate::storage::{MemoryStorage, Storage};
    use anyhow::{Result, bail};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    async fn backend_with_role() -> Result<Backend> {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .put(
                CONFIG_ADMIN_KEY,
                json!({
                    "username": "admin",
                    "password": "hunter2",
                    "url": "http://localhost:8081"
                }),
            )
            .await?;
        let backend = Backend::new(storage);
        let data = json!({"nexus_roles": ["nx-deploy"], "ttl": 10, "max_ttl": 30})
            .as_object()
            .cloned()
            .unwrap_or_default();
        backend
            .handle_role_write(
                "ci",
                &Request::new(Operation::Create, "roles/ci").with_data(data),
            )
            .await?;
        Ok(backend)
    }

    #[tokio::test]
    async fn revoke_without_user_id_fails_before_any_client_work() -> Result<()> {
        // No admin config: if revoke consulted the client first it would
        // fail with a client error instead of the lease-data error.
        let backend = Backend::new(Arc::new(MemoryStorage::new()));
        let internal = json!({"role": "ci"}).as_object().cloned().unwrap_or_default();

        match backend.revoke_user(&internal).await {
            Err(EngineError::MissingLeaseData("user_id")) => Ok(()),
            other => bail!("expected missing lease data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn renew_without_role_fails() -> Result<()> {
        let backend = backend_with_role().await?;
        let internal = json!({"user_id": "v-ci-1"})
            .as_object()
            .cloned()
            .unwrap_or_default();

        match backend.renew_user(&internal).await {
            Err(EngineError::MissingLeaseData("role")) => Ok(()),
            other => bail!("expected missing lease data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn renew_recomputes_bounds_from_the_current_role() -> Result<()> {
        let backend = backend_with_role().await?;
        let internal = json!({"role": "ci", "user_id": "v-ci-1"})
            .as_object()
            .cloned()
            .unwrap_or_default();

        let bounds = backend.renew_user(&internal).await?;
        assert_eq!(bounds.ttl, Some(Duration::from_secs(10)));
        assert_eq!(bounds.max_ttl, Some(Duration::from_secs(30)));
        Ok(())
    }

    #[tokio::test]
    async fn renew_is_rejected_after_the_role_is_deleted() -> Result<()> {
        let backend = backend_with_role().await?;
        backend.handle_role_delete("ci").await?;

        let internal = json!({"role": "ci", "user_id": "v-ci-1"})
            .as_object()
            .cloned()
            .unwrap_or_default();

        match backend.renew_user(&internal).await {
            Err(EngineError::RenewalRoleMissing(name)) => {
                assert_eq!(name, "ci");
                Ok(())
            }
            other => bail!("expected renewal rejection, got {other:?}"),
        }
    }
}
