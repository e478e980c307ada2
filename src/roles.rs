//! Role definitions: what kind of Nexus Repository user a credential
//! request provisions.
//!
//! A role names the Nexus security roles to grant, the template that
//! generates user ids, the email stamped on generated accounts and the
//! lease TTL bounds. Roles are meaningless without a target system, so
//! every role operation requires the admin configuration to exist.

use crate::backend::Backend;
use crate::error::EngineError;
use crate::request::{LeaseBounds, Operation, Request, Response};
use crate::template;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, instrument};

pub const ROLES_PREFIX: &str = "roles/";

/// Embeds a timestamp and 24 random characters so every issuance yields a
/// distinct user id.
pub const DEFAULT_USER_ID_TEMPLATE: &str = "v-{{role_name | truncate 64 | lowercase}}-{{display_name | truncate 64 | lowercase}}-{{unix_time}}-{{random 24}}";

/// The example.org domain is reserved and never deliverable.
pub const DEFAULT_USER_EMAIL: &str = "no-one@example.org";

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@([A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?\.)+[A-Za-z]{2,}$",
    )
    .expect("email regex compiles")
});

/// A stored role entry. TTLs are in seconds; zero means "platform default".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    pub name: String,
    pub nexus_roles: Vec<String>,
    pub user_id_template: String,
    pub user_email: String,
    #[serde(default)]
    pub ttl: u64,
    #[serde(default)]
    pub max_ttl: u64,
}

impl RoleEntry {
    fn with_defaults(name: &str) -> Self {
        Self {
            name: name.to_string(),
            nexus_roles: Vec::new(),
            user_id_template: DEFAULT_USER_ID_TEMPLATE.to_string(),
            user_email: DEFAULT_USER_EMAIL.to_string(),
            ttl: 0,
            max_ttl: 0,
        }
    }

    fn response_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("name".to_string(), json!(self.name));
        data.insert("nexus_roles".to_string(), json!(self.nexus_roles));
        data.insert("user_id_template".to_string(), json!(self.user_id_template));
        data.insert("user_email".to_string(), json!(self.user_email));
        data.insert("ttl".to_string(), json!(self.ttl));
        data.insert("max_ttl".to_string(), json!(self.max_ttl));
        data
    }

    pub(crate) fn lease_ttl(&self) -> Option<Duration> {
        (self.ttl > 0).then(|| Duration::from_secs(self.ttl))
    }

    pub(crate) fn lease_max_ttl(&self) -> Option<Duration> {
        (self.max_ttl > 0).then(|| Duration::from_secs(self.max_ttl))
    }

    pub(crate) fn lease_bounds(&self) -> LeaseBounds {
        LeaseBounds {
            ttl: self.lease_ttl(),
            max_ttl: self.lease_max_ttl(),
        }
    }
}

impl Backend {
    #[instrument(skip(self))]
    pub(crate) async fn handle_role_list(&self) -> Result<Response, EngineError> {
        let _roles = self.roles_lock.read().await;
        let _config = self.client_cache.read().await;

        self.require_admin_config().await?;

        let names = self.storage.list(ROLES_PREFIX).await?;
        let mut data = Map::new();
        data.insert("keys".to_string(), json!(names));
        Ok(Response::with_data(data))
    }

    #[instrument(skip(self))]
    pub(crate) async fn handle_role_read(&self, name: &str) -> Result<Response, EngineError> {
        let _roles = self.roles_lock.read().await;
        let _config = self.client_cache.read().await;

        self.require_admin_config().await?;

        let role = self
            .fetch_role(name)
            .await?
            .ok_or_else(|| EngineError::RoleNotFound(name.to_string()))?;
        Ok(Response::with_data(role.response_data()))
    }

    #[instrument(skip(self, request))]
    pub(crate) async fn handle_role_write(
        &self,
        name: &str,
        request: &Request,
    ) -> Result<Response, EngineError> {
        if name.is_empty() {
            return Err(EngineError::MissingRoleName);
        }

        let _roles = self.roles_lock.write().await;
        let _config = self.client_cache.read().await;

        self.require_admin_config().await?;

        let create = request.operation == Operation::Create;

        let mut role = match self.fetch_role(name).await? {
            Some(role) => role,
            None => RoleEntry::with_defaults(name),
        };

        if let Some(nexus_roles) = request.str_list_field("nexus_roles")? {
            role.nexus_roles = nexus_roles;
        }
        if create && role.nexus_roles.is_empty() {
            return Err(EngineError::MissingNexusRoles);
        }

        if let Some(user_id_template) = request.str_field("user_id_template")? {
            role.user_id_template = user_id_template.to_string();
        }

        if let Some(user_email) = request.str_field("user_email")? {
            role.user_email = user_email.to_string();
        }

        if let Some(ttl) = request.u64_field("ttl")? {
            role.ttl = ttl;
        }

        if let Some(max_ttl) = request.u64_field("max_ttl")? {
            role.max_ttl = max_ttl;
        }

        // Fail fast on the first violation; nothing is persisted on failure.
        template::compile(&role.user_id_template).map_err(EngineError::InvalidTemplate)?;

        if !EMAIL_REGEX.is_match(&role.user_email) {
            return Err(EngineError::InvalidEmail);
        }

        if role.ttl > 0 && role.max_ttl > 0 && role.ttl > role.max_ttl {
            return Err(EngineError::TtlExceedsMax);
        }

        self.store_role(&role).await?;

        debug!(role = %role.name, "role written");
        Ok(Response::default())
    }

    #[instrument(skip(self))]
    pub(crate) async fn handle_role_delete(&self, name: &str) -> Result<Response, EngineError> {
        let _roles = self.roles_lock.write().await;
        let _config = self.client_cache.read().await;

        self.require_admin_config().await?;

        self.storage.delete(&format!("{ROLES_PREFIX}{name}")).await?;

        debug!(role = %name, "role deleted");
        Ok(Response::default())
    }

    pub(crate) async fn fetch_role(&self, name: &str) -> Result<Option<RoleEntry>, EngineError> {
        if name.is_empty() {
            return Err(EngineError::MissingRoleName);
        }

        match self.storage.get(&format!("{ROLES_PREFIX}{name}")).await? {
            Some(record) => {
                let role = serde_json::from_value(record)
                    .map_err(|err| EngineError::Storage(err.into()))?;
                Ok(Some(role))
            }
            None => Ok(None),
        }
    }

    async fn store_role(&self, role: &RoleEntry) -> Result<(), EngineError> {
        let record = serde_json::to_value(role).map_err(|err| EngineError::Storage(err.into()))?;
        self.storage
            .put(&format!("{ROLES_PREFIX}{}", role.name), record)
            .await?;
        Ok(())
    }
}
