//! Engine object: owns the storage handle, the lock pair and the client
//! cache, and routes requests to the path handlers.
//!
//! Concurrency model:
//! 1. The config lock (`client_cache`) guards the cached [`NexusClient`]
//!    and serializes every admin-config mutation.
//! 2. The roles lock guards the `roles/*` storage region so role CRUD does
//!    not block credential issuance against other roles.
//! 3. Operations needing both always acquire the roles lock first, then the
//!    config lock.
//!
//! The engine spawns no background tasks; the cached client is rebuilt
//! lazily on the next acquisition after any configuration change.

use crate::client::NexusClient;
use crate::error::EngineError;
use crate::request::{Operation, Request, Response};
use crate::storage::Storage;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

pub struct Backend {
    pub(crate) storage: Arc<dyn Storage>,
    /// Shared client slot. `None` means "absent"; construction only happens
    /// while the exclusive guard is held, so readers never observe a
    /// half-built client.
    pub(crate) client_cache: RwLock<Option<Arc<NexusClient>>>,
    /// Guards the `roles/*` storage region, independent of the config lock.
    pub(crate) roles_lock: RwLock<()>,
}

impl Backend {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            client_cache: RwLock::new(None),
            roles_lock: RwLock::new(()),
        }
    }

    /// Route a request to its handler.
    ///
    /// # Errors
    /// Returns an error for unknown paths, operations a path does not
    /// support, and any error of the handler itself.
    #[instrument(skip(self, request), fields(path = %request.path, operation = %request.operation))]
    pub async fn handle(&self, request: Request) -> Result<Response, EngineError> {
        let path = request.path.trim_matches('/').to_string();

        match path.as_str() {
            "config/admin" => match request.operation {
                Operation::Read => self.handle_config_read().await,
                Operation::Create | Operation::Update => self.handle_config_write(&request).await,
                Operation::Delete => self.handle_config_delete().await,
                Operation::List => Err(unsupported(&path, &request)),
            },
            "config/rotate" => match request.operation {
                Operation::Update => self.handle_rotate().await,
                _ => Err(unsupported(&path, &request)),
            },
            "roles" => match request.operation {
                Operation::List => self.handle_role_list().await,
                _ => Err(unsupported(&path, &request)),
            },
            _ => {
                if let Some(name) = path.strip_prefix("roles/") {
                    return match request.operation {
                        Operation::Read => self.handle_role_read(name).await,
                        Operation::Create | Operation::Update => {
                            self.handle_role_write(name, &request).await
                        }
                        Operation::Delete => self.handle_role_delete(name).await,
                        Operation::List => Err(unsupported(&path, &request)),
                    };
                }
                if let Some(name) = path.strip_prefix("creds/") {
                    return match request.operation {
                        Operation::Read => self.handle_creds_read(name, &request).await,
                        _ => Err(unsupported(&path, &request)),
                    };
                }
                Err(EngineError::UnknownPath(path))
            }
        }
    }

    /// Shared client, built on first use and after every invalidation.
    ///
    /// Double-checked acquisition: a read-locked fast path, then an
    /// exclusive re-check before constructing, so concurrent first callers
    /// observe exactly one construction.
    ///
    /// # Errors
    /// Returns an error if the admin configuration is unusable or the client
    /// cannot be constructed.
    pub(crate) async fn client(&self) -> Result<Arc<NexusClient>, EngineError> {
        {
            let cached = self.client_cache.read().await;
            if let Some(client) = cached.as_ref() {
                return Ok(Arc::clone(client));
            }
        }

        let mut slot = self.client_cache.write().await;

        // Another caller may have built the client while we waited.
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }

        let config = self.fetch_admin_config().await?.unwrap_or_default();
        let client =
            Arc::new(NexusClient::new(&config).map_err(EngineError::InvalidClientConfig)?);

        debug!("constructed Nexus Repository client");

        *slot = Some(Arc::clone(&client));
        Ok(client)
    }
}

fn unsupported(path: &str, request: &Request) -> EngineError {
    EngineError::UnsupportedOperation {
        path: path.to_string(),
        operation: request.operation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG_ADMIN_KEY;
    use crate::storage::MemoryStorage;
    use anyhow::{Result, bail};
    use serde_json::json;

    async fn seeded_backend() -> Result<(Arc<Backend>, Arc<MemoryStorage>)> {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .put(
                CONFIG_ADMIN_KEY,
                json!({
                    "username": "admin",
                    "password": "hunter2",
                    "url": "http://localhost:8081",
                    "insecure": false,
                    "timeout": 30
                }),
            )
            .await?;
        Ok((Arc::new(Backend::new(storage.clone())), storage))
    }

    #[tokio::test]
    async fn concurrent_first_callers_build_the_client_once() -> Result<()> {
        let (backend, storage) = seeded_backend().await?;
        let baseline = storage.reads();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let backend = Arc::clone(&backend);
            tasks.push(tokio::spawn(async move { backend.client().await.is_ok() }));
        }
        for task in tasks {
            assert!(task.await?);
        }

        // One configuration fetch means one construction.
        assert_eq!(storage.reads() - baseline, 1);
        Ok(())
    }

    #[tokio::test]
    async fn repeated_acquisition_returns_the_cached_client() -> Result<()> {
        let (backend, storage) = seeded_backend().await?;

        let first = backend.client().await?;
        let baseline = storage.reads();
        let second = backend.client().await?;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(storage.reads(), baseline);
        Ok(())
    }

    #[tokio::test]
    async fn client_fails_without_configuration() -> Result<()> {
        let backend = Backend::new(Arc::new(MemoryStorage::new()));
        match backend.client().await {
            Err(EngineError::InvalidClientConfig(_)) => Ok(()),
            other => bail!("expected client config error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_paths_are_rejected() -> Result<()> {
        let (backend, _) = seeded_backend().await?;
        match backend
            .handle(Request::new(Operation::Read, "tokens/ci"))
            .await
        {
            Err(EngineError::UnknownPath(path)) => {
                assert_eq!(path, "tokens/ci");
                Ok(())
            }
            other => bail!("expected unknown path error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rotate_path_accepts_update_only() -> Result<()> {
        let (backend, _) = seeded_backend().await?;
        for operation in [
            Operation::Read,
            Operation::Create,
            Operation::Delete,
            Operation::List,
        ] {
            match backend
                .handle(Request::new(operation, "config/rotate"))
                .await
            {
                Err(EngineError::UnsupportedOperation { path, .. }) => {
                    assert_eq!(path, "config/rotate");
                }
                other => bail!("expected unsupported operation, got {other:?}"),
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn creds_path_is_read_only() -> Result<()> {
        let (backend, _) = seeded_backend().await?;
        match backend
            .handle(Request::new(Operation::Delete, "creds/ci"))
            .await
        {
            Err(EngineError::UnsupportedOperation { path, operation }) => {
                assert_eq!(path, "creds/ci");
                assert_eq!(operation, Operation::Delete);
                Ok(())
            }
            other => bail!("expected unsupported operation, got {other:?}"),
        }
    }
}
