//! Identity provider seam: the refresh-token exchange.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;

/// One access/refresh credential set as issued by the provider.
/// `refresh_token` is absent on the silent path where only the access
/// credential rotated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider refused the grant. Terminal for this session; retrying
    /// cannot make a rejected refresh token valid again.
    #[error("refresh rejected: {0}")]
    Rejected(String),
    /// Transport failure, timeout or provider-side outage.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange a refresh token for a new credential pair.
    async fn refresh_credentials(&self, refresh_token: &str) -> Result<CredentialPair, ProviderError>;
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// HTTP provider client. The timeout is baked into the client so every call
/// fails closed instead of hanging on a silent provider.
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpIdentityProvider {
    pub fn from_config(cfg: &AuthConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.provider_timeout)
            .build()
            .context("building provider http client")?;
        Ok(Self {
            client,
            base_url: cfg.provider_url.clone(),
            api_key: cfg.provider_key.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn refresh_credentials(&self, refresh_token: &str) -> Result<CredentialPair, ProviderError> {
        let url = format!("{}/auth/v1/token?grant_type=refresh_token", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Unavailable("refresh exchange timed out".to_string())
                } else {
                    ProviderError::Unavailable(format!("refresh exchange failed: {e}"))
                }
            })?;
        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<CredentialPair>()
                .await
                .map_err(|e| ProviderError::Unavailable(format!("refresh payload unreadable: {e}")));
        }
        // 4xx grant errors mean the token itself is dead; anything else is an outage.
        match status.as_u16() {
            400 | 401 | 403 | 422 => {
                Err(ProviderError::Rejected(format!("provider refused the refresh grant ({status})")))
            }
            _ => Err(ProviderError::Unavailable(format!("provider answered {status}"))),
        }
    }
}
