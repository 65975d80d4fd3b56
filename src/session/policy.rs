//! Cookie transport policy, recomputed on every write from the calling origin.
//! One deployment may simultaneously serve a local development origin and a
//! cross-site production origin, so nothing here is global or cached.

use axum_extra::extract::cookie::SameSite;
use time::Duration;

use crate::config::AuthConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieKind {
    Access,
    Refresh,
}

/// Per-request facts the policy depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieContext {
    pub is_cross_site: bool,
}

impl CookieContext {
    /// Derive cross-siteness from the request Origin header. Localhost and
    /// configured first-party origins are same-site; an absent Origin
    /// (same-origin navigation, curl) is same-site; everything else crosses
    /// site boundaries.
    pub fn from_origin(origin: Option<&str>, first_party: &[String]) -> Self {
        let is_cross_site = match origin {
            None => false,
            Some(o) => {
                let o = o.trim_end_matches('/');
                let local = o.contains("localhost") || o.contains("127.0.0.1");
                !(local || first_party.iter().any(|fp| fp == o))
            }
        };
        CookieContext { is_cross_site }
    }
}

/// Transport attributes for one Set-Cookie write.
#[derive(Debug, Clone, PartialEq)]
pub struct CookieAttributes {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: &'static str,
    pub domain: Option<String>,
    pub max_age: Duration,
}

#[derive(Debug, Clone)]
pub struct CookiePolicy {
    access_ttl: Duration,
    refresh_ttl: Duration,
    domain: Option<String>,
    secure_same_site: bool,
}

impl CookiePolicy {
    pub fn new(
        access_ttl: Duration,
        refresh_ttl: Duration,
        domain: Option<String>,
        secure_same_site: bool,
    ) -> Self {
        Self { access_ttl, refresh_ttl, domain, secure_same_site }
    }

    pub fn from_config(cfg: &AuthConfig) -> Self {
        Self::new(
            Duration::seconds(cfg.access_ttl_secs),
            Duration::seconds(cfg.refresh_ttl_secs),
            cfg.cookie_domain.clone(),
            cfg.secure_cookies,
        )
    }

    /// Attributes for one cookie write. HttpOnly is unconditional; a
    /// cross-site context forces SameSite=None with Secure (browsers drop
    /// None without it), same-site requests get Lax with Secure following
    /// the deployment posture.
    pub fn policy_for(&self, kind: CookieKind, ctx: CookieContext) -> CookieAttributes {
        let same_site = if ctx.is_cross_site { SameSite::None } else { SameSite::Lax };
        let secure = ctx.is_cross_site || self.secure_same_site;
        let max_age = match kind {
            CookieKind::Access => self.access_ttl,
            CookieKind::Refresh => self.refresh_ttl,
        };
        CookieAttributes {
            http_only: true,
            secure,
            same_site,
            path: "/",
            domain: self.domain.clone(),
            max_age,
        }
    }
}
