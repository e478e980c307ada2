//! Credential issuance: turn a role into a freshly provisioned remote user.
//!
//! Flow:
//! 1. Look up the role.
//! 2. Acquire the shared client.
//! 3. Sanitize the caller's display name and render the user-id template.
//! 4. Generate a random password and create the remote user.
//! 5. Hand back the credential plus the lease data revoke/renew will need.
//!
//! The remote account is the only state created here; nothing about the
//! issued user is persisted locally.

use crate::backend::Backend;
use crate::client::UserCreateRequest;
use crate::error::EngineError;
use crate::password;
use crate::request::{IssuedLease, Request, Response};
use crate::secret::NEXUS_USER_SECRET_TYPE;
use crate::template::{self, UserIdContext};
use regex::Regex;
use serde_json::{Map, json};
use std::sync::LazyLock;
use tracing::{debug, instrument};

static DISPLAY_NAME_SANITIZER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^[:alnum:]._-]").expect("sanitizer regex compiles"));

fn sanitize_display_name(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    DISPLAY_NAME_SANITIZER.replace_all(raw, "-").into_owned()
}

impl Backend {
    #[instrument(skip(self, request), fields(role = %name))]
    pub(crate) async fn handle_creds_read(
        &self,
        name: &str,
        request: &Request,
    ) -> Result<Response, EngineError> {
        let role = {
            let _roles = self.roles_lock.read().await;
            self.fetch_role(name).await?
        }
        .ok_or_else(|| EngineError::RoleNotFound(name.to_string()))?;

        let client = self.client().await?;

        let context = UserIdContext {
            display_name: sanitize_display_name(&request.display_name),
            role_name: role.name.clone(),
        };

        // The template was validated at role-write time; a failure here is
        // environmental.
        let user_id = template::compile(&role.user_id_template)
            .map_err(EngineError::InvalidTemplate)?
            .render(&context)
            .map_err(EngineError::TemplateRender)?;

        let user_password = password::user_password();

        client
            .create_user(&UserCreateRequest {
                user_id: &user_id,
                first_name: &user_id,
                last_name: &user_id,
                email_address: &role.user_email,
                password: &user_password,
                status: "active",
                roles: &role.nexus_roles,
            })
            .await
            .map_err(EngineError::RemoteProvisioningFailed)?;

        debug!(user_id = %user_id, "provisioned Nexus Repository user");

        let mut data = Map::new();
        data.insert("user_id".to_string(), json!(user_id));
        data.insert("password".to_string(), json!(user_password));
        data.insert("email_address".to_string(), json!(role.user_email));
        data.insert("nexus_roles".to_string(), json!(role.nexus_roles));

        let mut internal_data = Map::new();
        internal_data.insert("role".to_string(), json!(role.name));
        internal_data.insert("user_id".to_string(), json!(user_id));

        Ok(Response {
            data,
            lease: Some(IssuedLease {
                secret_type: NEXUS_USER_SECRET_TYPE,
                internal_data,
                ttl: role.lease_ttl(),
                max_ttl: role.lease_max_ttl(),
            }),
        })
    }
}
