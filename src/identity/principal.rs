use serde::{Deserialize, Serialize};

use super::Role;

/// Verified identity for one request. Recomputed from the access cookie on
/// every request; never persisted server-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
}
