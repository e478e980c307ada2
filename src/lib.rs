//! Dynamic Nexus Repository user credentials.
//!
//! This crate implements the credential lifecycle of a secrets engine for
//! Sonatype Nexus Repository: a host platform (the mount owner) routes
//! requests here, and the engine provisions a short-lived remote user per
//! credential read, revokes it when the lease expires, renews lease bounds
//! from the role definition and rotates the admin password on demand.
//!
//! The host owns persistent storage (the [`storage::Storage`] trait), lease
//! bookkeeping and request schemas; the engine owns the admin configuration,
//! role definitions, the shared authenticated client and its cache
//! invalidation.
//!
//! Paths handled by [`Backend::handle`]:
//! - `config/admin` — read, create, update, delete
//! - `config/rotate` — update
//! - `roles/` — list; `roles/<name>` — read, create, update, delete
//! - `creds/<name>` — read; issues a new credential each time
//!
//! Lease callbacks: [`Backend::revoke_user`] and [`Backend::renew_user`].

mod backend;
mod client;
mod config;
mod creds;
mod error;
pub mod password;
mod request;
mod roles;
mod rotate;
mod secret;
pub mod storage;
pub mod template;

pub use backend::Backend;
pub use client::{ClientError, NexusClient, UserCreateRequest};
pub use config::{AdminConfig, CONFIG_ADMIN_KEY, DEFAULT_INSECURE, DEFAULT_TIMEOUT_SECONDS};
pub use error::EngineError;
pub use request::{IssuedLease, LeaseBounds, Operation, Request, Response};
pub use roles::{DEFAULT_USER_EMAIL, DEFAULT_USER_ID_TEMPLATE, ROLES_PREFIX, RoleEntry};
pub use secret::NEXUS_USER_SECRET_TYPE;
pub use storage::{MemoryStorage, Storage};
