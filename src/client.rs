//! HTTP client for the Nexus Repository security API.
//!
//! The engine needs exactly three capabilities against the remote system:
//! create a user, delete a user and change a user's password. All three hit
//! the `/service/rest/v1/security/users` surface with the configured admin
//! credentials over basic auth. Failures are surfaced immediately; retry
//! policy belongs to the caller.

use crate::config::AdminConfig;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const SECURITY_USERS_PATH: &str = "service/rest/v1/security/users";
const BODY_EXCERPT_LENGTH: usize = 200;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client {0} was not defined")]
    MissingConfig(&'static str),

    #[error("error parsing URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request to Nexus Repository failed")]
    Transport(#[from] reqwest::Error),

    #[error("Nexus Repository returned {status}: {message}")]
    UnexpectedStatus { status: StatusCode, message: String },
}

/// Payload for the create-user endpoint. First and last name mirror the
/// user id; generated accounts have no human identity behind them.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreateRequest<'a> {
    pub user_id: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email_address: &'a str,
    pub password: &'a str,
    pub status: &'a str,
    pub roles: &'a [String],
}

/// Authenticated connection to one Nexus Repository instance.
#[derive(Debug)]
pub struct NexusClient {
    http: Client,
    base_url: Url,
    username: String,
    password: SecretString,
}

impl NexusClient {
    /// Build a client from the admin configuration.
    ///
    /// # Errors
    /// Returns an error if `username`, `password` or `url` is empty, the URL
    /// does not parse, or the underlying HTTP client cannot be constructed.
    pub fn new(config: &AdminConfig) -> Result<Self, ClientError> {
        if config.username.is_empty() {
            return Err(ClientError::MissingConfig("username"));
        }
        if config.password.is_empty() {
            return Err(ClientError::MissingConfig("password"));
        }
        if config.url.is_empty() {
            return Err(ClientError::MissingConfig("url"));
        }

        // Url::join drops the last path segment unless the base ends in "/".
        let mut base = config.url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        let mut builder = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(config.timeout));

        if config.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            http: builder.build()?,
            base_url,
            username: config.username.clone(),
            password: SecretString::from(config.password.clone()),
        })
    }

    /// Create a remote user account.
    ///
    /// # Errors
    /// Returns an error on transport failure or a non-success status.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn create_user(&self, request: &UserCreateRequest<'_>) -> Result<(), ClientError> {
        let url = self.endpoint(SECURITY_USERS_PATH)?;

        debug!(url = %url, "creating Nexus Repository user");

        let response = self
            .http
            .post(url)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .json(request)
            .send()
            .await?;

        ensure_success(response).await
    }

    /// Delete a remote user account.
    ///
    /// # Errors
    /// Returns an error on transport failure or a non-success status.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&format!("{SECURITY_USERS_PATH}/{user_id}"))?;

        let response = self
            .http
            .delete(url)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .send()
            .await?;

        ensure_success(response).await
    }

    /// Change a remote user's password. The body is plain text per the
    /// Nexus Repository API.
    ///
    /// # Errors
    /// Returns an error on transport failure or a non-success status.
    #[instrument(skip(self, new_password))]
    pub async fn change_password(
        &self,
        user_id: &str,
        new_password: &str,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(&format!("{SECURITY_USERS_PATH}/{user_id}/change-password"))?;

        let response = self
            .http
            .put(url)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .header(CONTENT_TYPE, "text/plain")
            .body(new_password.to_string())
            .send()
            .await?;

        ensure_success(response).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<(), ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(ClientError::UnexpectedStatus {
        status,
        message: excerpt(&body),
    })
}

fn excerpt(body: &str) -> String {
    if body.trim().is_empty() {
        return "empty response body".to_string();
    }
    let truncated: String = body.chars().take(BODY_EXCERPT_LENGTH).collect();
    if truncated.len() == body.len() {
        truncated
    } else {
        format!("{truncated}...")
    }
}
