//! Identity resolution for the gateway: token verification, the role
//! hierarchy and the collaborator seams (identity provider, user directory).
//! Keep the public surface thin and split implementation across sub-modules.

mod hierarchy;
mod principal;
mod request_context;
mod verifier;
mod directory;
mod provider;

pub use hierarchy::{Role, ROLE_HIERARCHY};
pub use principal::Principal;
pub use request_context::RequestContext;
pub use verifier::{AccessClaims, MetadataClaims, TokenVerifier};
pub use directory::{DirectoryError, HttpRoleDirectory, RoleDirectory, StaticRoleDirectory};
pub use provider::{CredentialPair, HttpIdentityProvider, IdentityProvider, ProviderError};
