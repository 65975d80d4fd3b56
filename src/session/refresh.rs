//! Refresh synchronizer: one exchange in flight at a time, losers dropped,
//! and successful rotations spaced a minimum interval apart.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{AuthError, AuthResult};
use crate::identity::{CredentialPair, IdentityProvider, ProviderError};
use crate::tprintln;

/// Why a trigger was dropped instead of reaching the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another exchange currently holds the gate.
    InFlight,
    /// A rotation succeeded less than the minimum interval ago.
    Throttled,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InFlight => write!(f, "in-flight"),
            SkipReason::Throttled => write!(f, "throttled"),
        }
    }
}

/// Non-error result of a refresh trigger. A dropped trigger is a normal
/// outcome here; the session it would have refreshed is still intact.
#[derive(Debug, PartialEq)]
pub enum RefreshOutcome {
    Refreshed(CredentialPair),
    Skipped(SkipReason),
}

#[derive(Debug, Default)]
struct GateState {
    refreshing: bool,
    last_success: Option<Instant>,
}

/// Serializes rotation traffic toward the identity provider. Concurrent
/// triggers are dropped, never queued, and a failed exchange is never
/// retried from here.
pub struct RefreshSynchronizer {
    provider: Arc<dyn IdentityProvider>,
    state: Mutex<GateState>,
    min_interval: Duration,
}

struct InFlightGuard<'a> {
    state: &'a Mutex<GateState>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        // reopens the gate even when the exchange future is cancelled mid-await
        self.state.lock().refreshing = false;
    }
}

impl RefreshSynchronizer {
    pub fn new(provider: Arc<dyn IdentityProvider>, min_interval: Duration) -> Self {
        RefreshSynchronizer {
            provider,
            state: Mutex::new(GateState::default()),
            min_interval,
        }
    }

    /// Take the gate or report why not. The in-flight check runs before the
    /// throttle check so a concurrent caller learns the actual reason.
    fn claim(&self) -> Result<InFlightGuard<'_>, SkipReason> {
        let mut state = self.state.lock();
        if state.refreshing {
            return Err(SkipReason::InFlight);
        }
        if let Some(at) = state.last_success {
            if at.elapsed() < self.min_interval {
                return Err(SkipReason::Throttled);
            }
        }
        state.refreshing = true;
        Ok(InFlightGuard { state: &self.state })
    }

    fn mark_success(&self) {
        self.state.lock().last_success = Some(Instant::now());
    }

    /// Record a rotation that arrived from outside (a login handing the
    /// gateway a fresh pair). Arms the rate limit without provider traffic.
    pub fn accept_rotation(&self) -> Result<(), SkipReason> {
        let _guard = self.claim()?;
        self.mark_success();
        tprintln!("refresh.accept_rotation");
        Ok(())
    }

    /// Ask the provider to rotate the pair. Rejection and outage map to
    /// distinct errors: the first ends the session, the second leaves it
    /// untouched. Only a successful rotation arms the rate limit.
    pub async fn exchange(&self, refresh_token: &str) -> AuthResult<RefreshOutcome> {
        let _guard = match self.claim() {
            Ok(guard) => guard,
            Err(reason) => {
                tprintln!("refresh.skip reason={}", reason);
                return Ok(RefreshOutcome::Skipped(reason));
            }
        };
        match self.provider.refresh_credentials(refresh_token).await {
            Ok(pair) => {
                // arm the throttle before _guard reopens the gate
                self.mark_success();
                tprintln!("refresh.rotated");
                Ok(RefreshOutcome::Refreshed(pair))
            }
            Err(ProviderError::Rejected(msg)) => Err(AuthError::session_expired(msg)),
            Err(ProviderError::Unavailable(msg)) => Err(AuthError::provider_unavailable(msg)),
        }
    }
}
