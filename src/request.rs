//! Logical operation surface between the host dispatcher and the engine.
//!
//! The host owns path routing at the mount level, request authentication and
//! lease bookkeeping; it hands the engine a [`Request`] and receives a
//! [`Response`]. Field presence drives partial-update semantics: a field
//! absent from `data` keeps its stored value, a present field overrides it.
//! Type coercion is the host schema layer's job — a present field with the
//! wrong JSON type is a validation error here.

use crate::error::EngineError;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
    List,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::List => "list",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub operation: Operation,
    pub path: String,
    /// Display name of the calling entity; folded into generated user ids
    /// after sanitizing.
    pub display_name: String,
    pub data: Map<String, Value>,
}

impl Request {
    #[must_use]
    pub fn new(operation: Operation, path: impl Into<String>) -> Self {
        Self {
            operation,
            path: path.into(),
            display_name: String::new(),
            data: Map::new(),
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Provided string field, if any.
    ///
    /// # Errors
    /// Returns an error if the field is present with a non-string type.
    pub fn str_field(&self, name: &'static str) -> Result<Option<&str>, EngineError> {
        match self.data.get(name) {
            None => Ok(None),
            Some(Value::String(value)) => Ok(Some(value)),
            Some(_) => Err(EngineError::InvalidFieldType(name)),
        }
    }

    /// Provided boolean field, if any.
    ///
    /// # Errors
    /// Returns an error if the field is present with a non-boolean type.
    pub fn bool_field(&self, name: &'static str) -> Result<Option<bool>, EngineError> {
        match self.data.get(name) {
            None => Ok(None),
            Some(Value::Bool(value)) => Ok(Some(*value)),
            Some(_) => Err(EngineError::InvalidFieldType(name)),
        }
    }

    /// Provided non-negative integer field, if any.
    ///
    /// # Errors
    /// Returns an error if the field is present and not a non-negative integer.
    pub fn u64_field(&self, name: &'static str) -> Result<Option<u64>, EngineError> {
        match self.data.get(name) {
            None => Ok(None),
            Some(Value::Number(value)) => value
                .as_u64()
                .map(Some)
                .ok_or(EngineError::InvalidFieldType(name)),
            Some(_) => Err(EngineError::InvalidFieldType(name)),
        }
    }

    /// Provided string-list field, if any. Accepts either a JSON array of
    /// strings or a comma-separated string, matching the host schema layer's
    /// list convention.
    ///
    /// # Errors
    /// Returns an error if the field is present with any other shape.
    pub fn str_list_field(&self, name: &'static str) -> Result<Option<Vec<String>>, EngineError> {
        match self.data.get(name) {
            None => Ok(None),
            Some(Value::Array(items)) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(value) => values.push(value.clone()),
                        _ => return Err(EngineError::InvalidFieldType(name)),
                    }
                }
                Ok(Some(values))
            }
            Some(Value::String(raw)) => Ok(Some(
                raw.split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            Some(_) => Err(EngineError::InvalidFieldType(name)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Response {
    pub data: Map<String, Value>,
    /// Present only when the operation issued a new credential.
    pub lease: Option<IssuedLease>,
}

impl Response {
    #[must_use]
    pub fn with_data(data: Map<String, Value>) -> Self {
        Self { data, lease: None }
    }
}

/// A freshly issued lease: the opaque internal data the host must hand back
/// on revoke and renew, plus TTL hints. `None` means the platform default
/// applies.
#[derive(Debug, Clone)]
pub struct IssuedLease {
    pub secret_type: &'static str,
    pub internal_data: Map<String, Value>,
    pub ttl: Option<Duration>,
    pub max_ttl: Option<Duration>,
}

/// TTL bounds recomputed on renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseBounds {
    pub ttl: Option<Duration>,
    pub max_ttl: Option<Duration>,
}
