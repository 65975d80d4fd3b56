use super::Principal;

/// Typed per-request context attached by the authenticate middleware and read
/// by authorize layers and handlers downstream.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub principal: Principal,
}

impl RequestContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }
}
