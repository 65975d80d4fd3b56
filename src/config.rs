//! Process configuration assembled once at startup from `AUTHGATE_*` env vars.
//! Components receive it by reference; nothing reads the environment after boot.

use std::time::Duration;

use anyhow::{bail, Context};
use jsonwebtoken::Algorithm;

/// Immutable gateway settings. Built once in `main` and shared via `Arc`.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub http_port: u16,
    /// HMAC secret for access-token verification. May be stored raw or base64-encoded.
    pub jwt_secret: String,
    /// Signing algorithms accepted for access tokens.
    pub allowed_algs: Vec<Algorithm>,
    /// Identity provider base URL (no trailing slash).
    pub provider_url: String,
    /// Service key sent to the provider on refresh and directory calls.
    pub provider_key: String,
    pub provider_timeout: Duration,
    /// Consult the user directory for the authoritative role on every verify.
    pub directory_enabled: bool,
    /// Directory table holding the per-user `role` column.
    pub directory_table: String,
    /// Origins treated as first-party; any other origin is cross-site.
    pub first_party_origins: Vec<String>,
    pub cookie_domain: Option<String>,
    /// Secure attribute for same-site cookies; cross-site cookies are always Secure.
    pub secure_cookies: bool,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    pub refresh_min_interval: Duration,
}

impl AuthConfig {
    /// Read and validate the full configuration. Fails fast: a missing secret or a
    /// malformed provider key aborts startup instead of surfacing per-request.
    pub fn from_env() -> anyhow::Result<AuthConfig> {
        let jwt_secret = std::env::var("AUTHGATE_JWT_SECRET")
            .context("AUTHGATE_JWT_SECRET must be set (HMAC secret for access tokens)")?;
        if jwt_secret.trim().is_empty() {
            bail!("AUTHGATE_JWT_SECRET is set but empty");
        }
        let provider_url = std::env::var("AUTHGATE_PROVIDER_URL")
            .context("AUTHGATE_PROVIDER_URL must be set (identity provider base URL)")?;
        let provider_key = std::env::var("AUTHGATE_PROVIDER_KEY")
            .context("AUTHGATE_PROVIDER_KEY must be set (provider service key)")?;
        check_provider_key_shape(&provider_key)?;

        let allowed_algs = parse_algorithms(&env_or("AUTHGATE_JWT_ALGS", "HS256,HS384,HS512"))?;
        let http_port: u16 = env_or("AUTHGATE_HTTP_PORT", "4000")
            .parse()
            .context("AUTHGATE_HTTP_PORT is not a valid port")?;
        let provider_timeout = Duration::from_secs(
            env_or("AUTHGATE_PROVIDER_TIMEOUT_SECS", "10")
                .parse()
                .context("AUTHGATE_PROVIDER_TIMEOUT_SECS is not a number")?,
        );
        let directory_enabled = parse_flag(&env_or("AUTHGATE_DIRECTORY_ENABLED", "true"));
        let directory_table = env_or("AUTHGATE_DIRECTORY_TABLE", "users");
        let first_party_origins = parse_origins(&env_or("AUTHGATE_FIRST_PARTY_ORIGINS", ""));
        let cookie_domain = std::env::var("AUTHGATE_COOKIE_DOMAIN").ok().filter(|d| !d.is_empty());
        let secure_cookies = parse_flag(&env_or("AUTHGATE_SECURE_COOKIES", "true"));
        let access_ttl_secs: i64 = env_or("AUTHGATE_ACCESS_TTL_SECS", "3600")
            .parse()
            .context("AUTHGATE_ACCESS_TTL_SECS is not a number")?;
        let refresh_ttl_secs: i64 = env_or("AUTHGATE_REFRESH_TTL_SECS", "604800")
            .parse()
            .context("AUTHGATE_REFRESH_TTL_SECS is not a number")?;
        let refresh_min_interval = Duration::from_secs(
            env_or("AUTHGATE_REFRESH_MIN_INTERVAL_SECS", "60")
                .parse()
                .context("AUTHGATE_REFRESH_MIN_INTERVAL_SECS is not a number")?,
        );

        Ok(AuthConfig {
            http_port,
            jwt_secret,
            allowed_algs,
            provider_url: provider_url.trim_end_matches('/').to_string(),
            provider_key,
            provider_timeout,
            directory_enabled,
            directory_table,
            first_party_origins,
            cookie_domain,
            secure_cookies,
            access_ttl_secs,
            refresh_ttl_secs,
            refresh_min_interval,
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim(), "true" | "1" | "yes")
}

/// Provider service keys are themselves JWTs; a key that is not three
/// dot-separated segments is a paste error worth refusing at boot.
fn check_provider_key_shape(key: &str) -> anyhow::Result<()> {
    if key.split('.').count() != 3 {
        bail!("AUTHGATE_PROVIDER_KEY does not look like a provider key (expected 3 dot-separated segments)");
    }
    Ok(())
}

fn parse_algorithms(raw: &str) -> anyhow::Result<Vec<Algorithm>> {
    let mut algs = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let alg = match name {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => bail!("unsupported signing algorithm in AUTHGATE_JWT_ALGS: {}", other),
        };
        algs.push(alg);
    }
    if algs.is_empty() {
        bail!("AUTHGATE_JWT_ALGS resolved to an empty algorithm list");
    }
    Ok(algs)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}
