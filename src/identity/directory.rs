//! User directory seam: the authoritative, mutable role assignment per subject.

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::AuthConfig;

#[derive(Debug, Error)]
#[error("directory lookup failed: {0}")]
pub struct DirectoryError(pub String);

/// Role lookup by subject id. `Ok(None)` means the directory holds no row for
/// the subject; that is absence, not failure. Transport and status failures
/// are errors and the verifier fails closed on them.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn role_for(&self, subject_id: &str) -> Result<Option<String>, DirectoryError>;
}

/// In-memory directory for tests and deployments that run without one.
#[derive(Debug, Default)]
pub struct StaticRoleDirectory {
    roles: HashMap<String, String>,
}

impl StaticRoleDirectory {
    pub fn new() -> Self { Self::default() }

    pub fn with_role<S: Into<String>, R: Into<String>>(mut self, subject_id: S, role: R) -> Self {
        self.roles.insert(subject_id.into(), role.into());
        self
    }
}

#[async_trait]
impl RoleDirectory for StaticRoleDirectory {
    async fn role_for(&self, subject_id: &str) -> Result<Option<String>, DirectoryError> {
        Ok(self.roles.get(subject_id).cloned())
    }
}

#[derive(Debug, Deserialize)]
struct RoleRow {
    #[serde(default)]
    role: Option<String>,
}

/// REST-backed directory: selects the `role` column for one subject id from
/// the configured table.
pub struct HttpRoleDirectory {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl HttpRoleDirectory {
    pub fn from_config(cfg: &AuthConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.provider_timeout)
            .build()
            .context("building directory http client")?;
        Ok(Self {
            client,
            base_url: cfg.provider_url.clone(),
            api_key: cfg.provider_key.clone(),
            table: cfg.directory_table.clone(),
        })
    }
}

#[async_trait]
impl RoleDirectory for HttpRoleDirectory {
    async fn role_for(&self, subject_id: &str) -> Result<Option<String>, DirectoryError> {
        let url = format!(
            "{}/rest/v1/{}?id=eq.{}&select=role&limit=1",
            self.base_url,
            self.table,
            urlencoding::encode(subject_id)
        );
        let resp = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DirectoryError("directory lookup timed out".to_string())
                } else {
                    DirectoryError(format!("directory unreachable: {e}"))
                }
            })?;
        if !resp.status().is_success() {
            return Err(DirectoryError(format!("directory answered {}", resp.status())));
        }
        let rows: Vec<RoleRow> = resp
            .json()
            .await
            .map_err(|e| DirectoryError(format!("directory payload unreadable: {e}")))?;
        Ok(rows.into_iter().next().and_then(|r| r.role))
    }
}
