//!
//! authgate HTTP server
//! --------------------
//! This module defines the Axum-based HTTP surface of the session gateway.
//!
//! Responsibilities:
//! - Session establishment from a provider token pair (`/set-cookie`).
//! - Session rotation through the refresh synchronizer (`/refresh-session`).
//! - Unconditional session teardown (`/logout`).
//! - An `authenticate` middleware turning the access cookie into a typed
//!   [`RequestContext`], and an `authorize` layer gating routes by role.
//! - Protected routes: `/me`, `/validate-token` (any session) and `/admin`
//!   (Admin and up).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::identity::{
    CredentialPair, HttpIdentityProvider, HttpRoleDirectory, IdentityProvider, RequestContext,
    Role, RoleDirectory, StaticRoleDirectory, TokenVerifier,
};
use crate::session::{
    clear_session, read_access_token, read_refresh_token, write_session, CookieContext,
    CookiePolicy, RefreshOutcome, RefreshSynchronizer,
};

/// Shared server state injected into all handlers.
///
/// Holds the immutable configuration plus the three long-lived components:
/// the token verifier, the refresh synchronizer and the cookie policy.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AuthConfig>,
    pub verifier: Arc<TokenVerifier>,
    pub refresh: Arc<RefreshSynchronizer>,
    pub policy: Arc<CookiePolicy>,
}

impl AppState {
    /// Assemble the state from a config and the two collaborator seams.
    /// Tests inject in-memory fakes here; `run` wires the HTTP-backed ones.
    pub fn new(
        config: AuthConfig,
        directory: Arc<dyn RoleDirectory>,
        provider: Arc<dyn IdentityProvider>,
    ) -> AppState {
        let verifier = Arc::new(TokenVerifier::new(
            config.jwt_secret.clone(),
            config.allowed_algs.clone(),
            directory,
        ));
        let refresh = Arc::new(RefreshSynchronizer::new(provider, config.refresh_min_interval));
        let policy = Arc::new(CookiePolicy::from_config(&config));
        AppState { config: Arc::new(config), verifier, refresh, policy }
    }
}

/// Start the gateway bound to the configured port.
pub async fn run(config: AuthConfig) -> anyhow::Result<()> {
    let directory: Arc<dyn RoleDirectory> = if config.directory_enabled {
        Arc::new(HttpRoleDirectory::from_config(&config)?)
    } else {
        info!("user directory disabled; roles come from token metadata only");
        Arc::new(StaticRoleDirectory::new())
    };
    let provider: Arc<dyn IdentityProvider> = Arc::new(HttpIdentityProvider::from_config(&config)?);
    let http_port = config.http_port;
    let state = AppState::new(config, directory, provider);

    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Mount all routes. Split out of `run` so tests can drive the router
/// directly with injected state.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/me", get(me))
        .route("/validate-token", post(validate_token))
        .merge(
            Router::new()
                .route("/admin", get(admin_overview))
                .route_layer(middleware::from_fn(move |req: Request, next: Next| {
                    authorize(Role::Admin, req, next)
                })),
        )
        // added last so it runs first: authenticate, then any authorize layer
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .route("/", get(|| async { "authgate ok" }))
        .route("/set-cookie", post(set_cookie))
        .route("/refresh-session", post(refresh_session))
        .route("/logout", post(logout))
        .merge(protected)
        .with_state(state)
}

/// Derive the cookie context from the request `Origin` header.
fn origin_context(headers: &HeaderMap, config: &AuthConfig) -> CookieContext {
    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
    CookieContext::from_origin(origin, &config.first_party_origins)
}

/// Turn the access cookie into a [`RequestContext`] or fail the request.
///
/// A missing cookie and a failed verification both end as 401, but only the
/// failed verification clears the session. A directory outage is surfaced as
/// 503 with cookies untouched: the session may still be perfectly valid.
async fn authenticate(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = read_access_token(&jar) else {
        return AuthError::unauthenticated("no access token cookie on the request").into_response();
    };
    match state.verifier.verify(&token).await {
        Ok(principal) => {
            req.extensions_mut().insert(RequestContext::new(principal));
            next.run(req).await
        }
        Err(err @ AuthError::ProviderUnavailable { .. }) => err.into_response(),
        Err(err) => {
            info!("authenticate rejected a session: {}", err.code_str());
            let ctx = origin_context(req.headers(), &state.config);
            let jar = clear_session(jar, &state.policy, ctx);
            let err = AuthError::unauthenticated(err.message().to_string());
            (jar, err).into_response()
        }
    }
}

/// Require a minimum role on an already-authenticated request.
async fn authorize(required: Role, req: Request, next: Next) -> Response {
    // a missing context means the authenticate layer never ran on this route
    let Some(ctx) = req.extensions().get::<RequestContext>() else {
        return AuthError::unauthenticated("no session attached to a role-gated route")
            .into_response();
    };
    if !ctx.principal.role.satisfies(required) {
        return AuthError::forbidden(format!(
            "requires role {} or higher, session holds {}",
            required, ctx.principal.role
        ))
        .into_response();
    }
    next.run(req).await
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| AuthError::unauthenticated("route is missing the authenticate layer"))
    }
}

#[derive(Debug, Deserialize)]
struct SetCookiePayload {
    access_token: String,
    /// Absent on the silent path: the client refreshed its access token
    /// in-place and the stored refresh cookie stays valid.
    #[serde(default)]
    refresh_token: Option<String>,
}

async fn set_cookie(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<SetCookiePayload>,
) -> Response {
    let principal = match state.verifier.verify(&payload.access_token).await {
        Ok(p) => p,
        Err(err) => return err.into_response(),
    };
    let body = json!({
        "success": true,
        "email": principal.email,
        "role": principal.role,
    });
    match state.refresh.accept_rotation() {
        Ok(()) => {
            let pair = CredentialPair {
                access_token: payload.access_token,
                refresh_token: payload.refresh_token,
            };
            let ctx = origin_context(&headers, &state.config);
            let jar = write_session(jar, &pair, &state.policy, ctx);
            (jar, Json(body)).into_response()
        }
        Err(reason) => {
            // the token is fine, the rotation is just too soon; keep the
            // stored cookies and report success
            info!("set-cookie left session unchanged: {}", reason);
            Json(body).into_response()
        }
    }
}

async fn refresh_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let Some(refresh_token) = read_refresh_token(&jar) else {
        return AuthError::unauthenticated("no refresh token cookie on the request")
            .into_response();
    };
    let ctx = origin_context(&headers, &state.config);
    match state.refresh.exchange(&refresh_token).await {
        Ok(RefreshOutcome::Refreshed(pair)) => {
            let jar = write_session(jar, &pair, &state.policy, ctx);
            (jar, Json(json!({"success": true, "refreshed": true}))).into_response()
        }
        Ok(RefreshOutcome::Skipped(reason)) => {
            Json(json!({"success": true, "refreshed": false, "reason": reason.to_string()}))
                .into_response()
        }
        Err(err @ AuthError::SessionExpired { .. }) => {
            info!("refresh rejected, ending session");
            let jar = clear_session(jar, &state.policy, ctx);
            (jar, err).into_response()
        }
        // outage: leave the cookies alone, the pair may still be good
        Err(err) => err.into_response(),
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap, jar: CookieJar) -> Response {
    let ctx = origin_context(&headers, &state.config);
    let jar = clear_session(jar, &state.policy, ctx);
    (jar, Json(json!({"success": true, "message": "session closed"}))).into_response()
}

async fn me(ctx: RequestContext) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "user": {
            "id": ctx.principal.subject_id,
            "email": ctx.principal.email,
            "role": ctx.principal.role,
        }
    }))
}

/// Validation echo for sibling services fronting their own checks with this
/// gateway. The session cookie is the credential; nothing is read from the body.
async fn validate_token(ctx: RequestContext) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "valid": true,
        "id": ctx.principal.subject_id,
        "role": ctx.principal.role,
        "email": ctx.principal.email,
    }))
}

async fn admin_overview(ctx: RequestContext) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "message": "admin access granted",
        "user": {
            "id": ctx.principal.subject_id,
            "role": ctx.principal.role,
        }
    }))
}
