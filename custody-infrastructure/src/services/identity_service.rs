use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use custody_domain::ports::{IdentityProvider, RoleDirectory};
use custody_domain::{normalize_optional_text, ActorId, RuntimeConfig};

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Deserialize)]
struct SessionUser {
    id: String,
}

fn build_client(timeout_seconds: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_seconds.max(3)))
        .build()?)
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Resolves session tokens against the identity service's `/auth/v1/user`
/// endpoint.
#[derive(Clone)]
pub struct HttpIdentityProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpIdentityProvider {
    pub fn new(base_url: String, api_key: Option<String>, timeout_seconds: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_seconds)?,
            base_url,
            api_key,
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verify_session(&self, token: &str) -> Result<Option<ActorId>> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }
        let mut request = self
            .client
            .get(endpoint(&self.base_url, "/auth/v1/user"))
            .header(AUTHORIZATION, format!("Bearer {token}"));
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }
        let response = request.send().await?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => {
                let user: SessionUser = response.json().await?;
                Ok(normalize_optional_text(Some(user.id)).map(ActorId::new))
            }
            status => Err(anyhow!("identity service answered {}", status)),
        }
    }
}

/// Asks the identity service's `has_role` procedure whether a user is an
/// administrator.
#[derive(Clone)]
pub struct HttpRoleDirectory {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpRoleDirectory {
    pub fn new(base_url: String, api_key: Option<String>, timeout_seconds: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_seconds)?,
            base_url,
            api_key,
        })
    }
}

#[async_trait]
impl RoleDirectory for HttpRoleDirectory {
    async fn is_admin(&self, user: &ActorId) -> Result<bool> {
        let mut request = self
            .client
            .post(endpoint(&self.base_url, "/rest/v1/rpc/has_role"))
            .json(&json!({ "_user_id": user.as_str(), "_role": ADMIN_ROLE }));
        if let Some(key) = &self.api_key {
            request = request
                .header("apikey", key)
                .header(AUTHORIZATION, format!("Bearer {key}"));
        }
        let response = request.send().await?.error_for_status()?;
        Ok(response.json::<bool>().await?)
    }
}

/// Admin membership taken from `admin_user_ids` in config.
#[derive(Debug, Clone, Default)]
pub struct StaticRoleDirectory {
    admins: BTreeSet<String>,
}

impl StaticRoleDirectory {
    pub fn new<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            admins: admins.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl RoleDirectory for StaticRoleDirectory {
    async fn is_admin(&self, user: &ActorId) -> Result<bool> {
        Ok(self.admins.contains(user.as_str()))
    }
}

/// Used when no identity service is configured: every session is unknown,
/// so only the system credential gets through.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledIdentityProvider;

#[async_trait]
impl IdentityProvider for DisabledIdentityProvider {
    async fn verify_session(&self, _token: &str) -> Result<Option<ActorId>> {
        Ok(None)
    }
}

pub enum RoleSource {
    Static(StaticRoleDirectory),
    Http(HttpRoleDirectory),
}

/// Static ids win over the remote directory when both are configured.
pub fn select_role_directory(config: &RuntimeConfig) -> Result<RoleSource> {
    if !config.admin_user_ids.is_empty() {
        return Ok(RoleSource::Static(StaticRoleDirectory::new(
            config.admin_user_ids.iter().cloned(),
        )));
    }
    match &config.identity_url {
        Some(url) => Ok(RoleSource::Http(HttpRoleDirectory::new(
            url.clone(),
            config.identity_api_key.clone(),
            config.request_timeout_seconds,
        )?)),
        None => Ok(RoleSource::Static(StaticRoleDirectory::default())),
    }
}
