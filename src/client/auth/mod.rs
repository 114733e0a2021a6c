//! Session renewal: the raw renew call and the single-flight coordinator
//! every authenticated request goes through after an authorization failure.

/// Renew-token HTTP call
pub mod renew;

/// Single-flight refresh coordinator
pub mod refresh;

pub use refresh::{RefreshCoordinator, RefreshOutcome, SessionTeardown};
pub use renew::{HttpTokenRenewer, RenewedTokens, TokenRenewer};
