//! Unified auth error model and HTTP mapping.
//! Every failure the gateway can surface is one of these variants; provider and
//! directory errors are normalized into this set before reaching a handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthError {
    /// Malformed, badly signed or expired access token. Recoverable by re-login.
    InvalidToken { message: String },
    /// Identity provider or user directory unreachable. Transient; the caller
    /// may retry with backoff, the pipeline itself never retries.
    ProviderUnavailable { message: String },
    /// Refresh token rejected by the provider. Terminal; forces re-login.
    SessionExpired { message: String },
    /// Authenticated but the role does not satisfy the required one.
    Forbidden { message: String },
    /// No usable session on the request.
    Unauthenticated { message: String },
}

impl AuthError {
    pub fn code_str(&self) -> &'static str {
        match self {
            AuthError::InvalidToken { .. } => "invalid_token",
            AuthError::ProviderUnavailable { .. } => "provider_unavailable",
            AuthError::SessionExpired { .. } => "session_expired",
            AuthError::Forbidden { .. } => "forbidden",
            AuthError::Unauthenticated { .. } => "unauthenticated",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AuthError::InvalidToken { message }
            | AuthError::ProviderUnavailable { message }
            | AuthError::SessionExpired { message }
            | AuthError::Forbidden { message }
            | AuthError::Unauthenticated { message } => message.as_str(),
        }
    }

    pub fn invalid_token<S: Into<String>>(msg: S) -> Self { AuthError::InvalidToken { message: msg.into() } }
    pub fn provider_unavailable<S: Into<String>>(msg: S) -> Self { AuthError::ProviderUnavailable { message: msg.into() } }
    pub fn session_expired<S: Into<String>>(msg: S) -> Self { AuthError::SessionExpired { message: msg.into() } }
    pub fn forbidden<S: Into<String>>(msg: S) -> Self { AuthError::Forbidden { message: msg.into() } }
    pub fn unauthenticated<S: Into<String>>(msg: S) -> Self { AuthError::Unauthenticated { message: msg.into() } }

    /// Map to HTTP status code. Unauthenticated and under-privileged are
    /// deliberately distinct (401 vs 403) so clients can tell "log in again"
    /// from "ask for more rights".
    pub fn http_status(&self) -> StatusCode {
        match self {
            AuthError::InvalidToken { .. } => StatusCode::UNAUTHORIZED,
            AuthError::ProviderUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::SessionExpired { .. } => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AuthError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
        }
    }

    /// Whether the client should restart the login flow to recover.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidToken { .. }
                | AuthError::SessionExpired { .. }
                | AuthError::Unauthenticated { .. }
        )
    }
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AuthError {}

pub type AuthResult<T> = Result<T, AuthError>;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "code": self.code_str(),
            "message": self.message(),
            "requiresLogin": self.requires_login(),
        });
        (self.http_status(), Json(body)).into_response()
    }
}
