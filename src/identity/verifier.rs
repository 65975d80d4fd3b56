//! Access-token verification and principal resolution.
//!
//! Verification is local (HMAC signature + claims); the only network hop is
//! the optional user-directory role lookup, which fails closed. The signing
//! secret may be stored raw or base64-encoded, so decoding runs as two
//! ordered attempts: raw first, decoded second.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

use super::directory::RoleDirectory;
use super::hierarchy::Role;
use super::principal::Principal;

/// Subjects with no role anywhere resolve to the least privileged role.
const DEFAULT_ROLE: Role = Role::Viewer;

/// Claims carried by the access token. Extra provider claims are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub app_metadata: Option<MetadataClaims>,
}

/// Provider-managed metadata block; the only claim read from it is the role hint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataClaims {
    #[serde(default)]
    pub role: Option<String>,
}

pub struct TokenVerifier {
    secret: String,
    allowed_algs: Vec<Algorithm>,
    directory: Arc<dyn RoleDirectory>,
}

impl TokenVerifier {
    pub fn new(secret: String, allowed_algs: Vec<Algorithm>, directory: Arc<dyn RoleDirectory>) -> Self {
        Self { secret, allowed_algs, directory }
    }

    /// Validate a bearer token and resolve its principal.
    ///
    /// Role priority: directory row, then token metadata hint, then the
    /// minimal default. A directory value outside the hierarchy counts as
    /// absent; it must never grant anything.
    pub async fn verify(&self, token: &str) -> AuthResult<Principal> {
        let token = token.trim();
        if token.is_empty() {
            // rejected before any lookup
            return Err(AuthError::invalid_token("empty bearer token"));
        }
        let claims = self.decode_claims(token)?;

        let directory_role = match self.directory.role_for(&claims.sub).await {
            Ok(role) => role,
            Err(e) => return Err(AuthError::provider_unavailable(e.to_string())),
        };

        let role = directory_role
            .as_deref()
            .and_then(Role::parse)
            .or_else(|| {
                claims
                    .app_metadata
                    .as_ref()
                    .and_then(|m| m.role.as_deref())
                    .and_then(Role::parse)
            })
            .unwrap_or(DEFAULT_ROLE);

        Ok(Principal { subject_id: claims.sub, email: claims.email, role })
    }

    fn decode_claims(&self, token: &str) -> AuthResult<AccessClaims> {
        let algs = match decode_header(token) {
            Ok(header) if self.allowed_algs.contains(&header.alg) => vec![header.alg],
            // Header unreadable or naming an untrusted algorithm: fall back to
            // the fixed allow-list. "none" does not parse into the HS set, so
            // unsigned tokens can never reach a successful decode.
            _ => self.allowed_algs.clone(),
        };
        let mut validation = Validation::default();
        validation.algorithms = algs;
        // provider-defined audiences are not meaningful to this gateway
        validation.validate_aud = false;

        let mut last: Option<jsonwebtoken::errors::Error> = None;
        for key in self.candidate_keys() {
            match decode::<AccessClaims>(token, &key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) => {
                    // expiry means the signature already checked out; another
                    // secret encoding cannot fix that
                    let expired = matches!(e.kind(), ErrorKind::ExpiredSignature);
                    last = Some(e);
                    if expired {
                        break;
                    }
                }
            }
        }
        Err(normalize_decode_error(last))
    }

    /// Raw-bytes key first, base64-decoded key second when the secret decodes.
    fn candidate_keys(&self) -> Vec<DecodingKey> {
        let mut keys = vec![DecodingKey::from_secret(self.secret.as_bytes())];
        if let Ok(decoded) = BASE64_STANDARD.decode(self.secret.trim()) {
            keys.push(DecodingKey::from_secret(&decoded));
        }
        keys
    }
}

fn normalize_decode_error(err: Option<jsonwebtoken::errors::Error>) -> AuthError {
    let Some(err) = err else {
        return AuthError::invalid_token("token could not be decoded");
    };
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::invalid_token("token expired"),
        ErrorKind::InvalidSignature => AuthError::invalid_token("token signature mismatch"),
        ErrorKind::InvalidAlgorithm => AuthError::invalid_token("token algorithm not allowed"),
        _ => AuthError::invalid_token(format!("token rejected: {err}")),
    }
}
