//! Cookie-bound session handling: per-write transport policy, the cookie
//! store adapter and the refresh synchronizer.

mod policy;
mod store;
mod refresh;

pub use policy::{CookieAttributes, CookieContext, CookieKind, CookiePolicy};
pub use store::{
    clear_session, read_access_token, read_refresh_token, write_session, ACCESS_COOKIE,
    REFRESH_COOKIE,
};
pub use refresh::{RefreshOutcome, RefreshSynchronizer, SkipReason};
