//! Error taxonomy for the secrets engine.
//!
//! Every operation returns one of these to the host dispatcher; nothing is
//! retried or swallowed inside the engine. Validation and not-found variants
//! are caller-correctable, the `Remote*` variants wrap transport or HTTP
//! failures from Nexus Repository and require operator attention.

use crate::client::ClientError;
use crate::request::Operation;
use crate::template::TemplateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("admin configuration not found")]
    ConfigurationMissing,

    #[error(r#"missing "{0}" in admin configuration"#)]
    MissingConfigField(&'static str),

    #[error("missing role name")]
    MissingRoleName,

    #[error(r#"missing "nexus_roles" in role definition"#)]
    MissingNexusRoles,

    #[error(r#"unable to initialize "user_id_template""#)]
    InvalidTemplate(#[source] TemplateError),

    #[error(r#""user_email" is not valid"#)]
    InvalidEmail,

    #[error(r#""ttl" cannot be greater than "max_ttl""#)]
    TtlExceedsMax,

    #[error(r#"field "{0}" has an unexpected type"#)]
    InvalidFieldType(&'static str),

    #[error(r#"role "{0}" does not exist"#)]
    RoleNotFound(String),

    #[error(r#"role "{0}" no longer exists, lease cannot be renewed"#)]
    RenewalRoleMissing(String),

    /// The lease handed back by the host lacks a field this engine attaches
    /// at issuance. Indicates an integration fault, not a user error.
    #[error(r#""{0}" is missing on the lease"#)]
    MissingLeaseData(&'static str),

    #[error("cannot build Nexus Repository client")]
    InvalidClientConfig(#[source] ClientError),

    #[error(r#"rendering "user_id_template" failed"#)]
    TemplateRender(#[source] TemplateError),

    #[error("creating user on Nexus Repository failed")]
    RemoteProvisioningFailed(#[source] ClientError),

    #[error(r#"revoking Nexus Repository user "{user_id}" failed"#)]
    RemoteRevocationFailed {
        user_id: String,
        #[source]
        source: ClientError,
    },

    #[error("rotating the admin password on Nexus Repository failed")]
    RemoteRotationFailed(#[source] ClientError),

    #[error(r#"operation "{operation}" is not supported on "{path}""#)]
    UnsupportedOperation { path: String, operation: Operation },

    #[error(r#"no handler for path "{0}""#)]
    UnknownPath(String),

    #[error("storage operation failed")]
    Storage(#[from] anyhow::Error),
}
