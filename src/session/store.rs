//! Session store adapter: the two session artifacts as cookies on the
//! request and response jars.

use axum_extra::extract::cookie::{Cookie, CookieJar};
use time::Duration;

use crate::identity::CredentialPair;
use crate::tprintln;

use super::policy::{CookieAttributes, CookieContext, CookieKind, CookiePolicy};

/// Fixed cookie names shared with every client of this gateway.
pub const ACCESS_COOKIE: &str = "authToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// A missing cookie is `None`, never an error; the pipeline turns it into
/// "unauthenticated".
pub fn read_access_token(jar: &CookieJar) -> Option<String> {
    jar.get(ACCESS_COOKIE).map(|c| c.value().to_string())
}

pub fn read_refresh_token(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH_COOKIE).map(|c| c.value().to_string())
}

fn build_cookie(name: &'static str, value: String, attrs: CookieAttributes) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, value))
        .http_only(attrs.http_only)
        .secure(attrs.secure)
        .same_site(attrs.same_site)
        .path(attrs.path)
        .max_age(attrs.max_age);
    if let Some(domain) = attrs.domain {
        cookie = cookie.domain(domain);
    }
    cookie.build()
}

/// Write the pair under a freshly computed policy: both cookies when a
/// refresh token is present, access only on the silent path (the refresh
/// cookie is left untouched).
pub fn write_session(
    jar: CookieJar,
    pair: &CredentialPair,
    policy: &CookiePolicy,
    ctx: CookieContext,
) -> CookieJar {
    let mut jar = jar.add(build_cookie(
        ACCESS_COOKIE,
        pair.access_token.clone(),
        policy.policy_for(CookieKind::Access, ctx),
    ));
    if let Some(refresh) = &pair.refresh_token {
        jar = jar.add(build_cookie(
            REFRESH_COOKIE,
            refresh.clone(),
            policy.policy_for(CookieKind::Refresh, ctx),
        ));
    }
    tprintln!(
        "session.write cookies={}",
        if pair.refresh_token.is_some() { "access+refresh" } else { "access" }
    );
    jar
}

/// Clear both cookies under the same attribute policy they were written
/// with; a mismatch (different domain, path or SameSite) makes browsers
/// silently keep the cookie. Safe to call on an already-cleared session.
pub fn clear_session(jar: CookieJar, policy: &CookiePolicy, ctx: CookieContext) -> CookieJar {
    let mut access = policy.policy_for(CookieKind::Access, ctx);
    access.max_age = Duration::ZERO;
    let mut refresh = policy.policy_for(CookieKind::Refresh, ctx);
    refresh.max_age = Duration::ZERO;
    tprintln!("session.clear");
    jar.add(build_cookie(ACCESS_COOKIE, String::new(), access))
        .add(build_cookie(REFRESH_COOKIE, String::new(), refresh))
}
