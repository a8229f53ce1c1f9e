//! Error types for the catalog and connection core.
//!
//! `ClassificationError` never leaves the catalog module (bad records are
//! skipped), `ServiceError` is what the external VPN service reports, and
//! `CoreError` is returned by the few fallible public entry points.

use thiserror::Error;

// ── Classification ──────────────────────────────────────────────────────────

/// A raw server record that could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("server record has no name")]
    MissingName,

    #[error("server {server} has no exit country code")]
    MissingExitCountry { server: String },

    #[error("server {server} has no entry country code")]
    MissingEntryCountry { server: String },

    #[error("server {server} has unknown tier {tier}")]
    UnknownTier { server: String, tier: i64 },

    #[error("server {server} reports load {load}, expected 0-100")]
    LoadOutOfRange { server: String, load: i64 },
}

// ── External service ────────────────────────────────────────────────────────

/// Account conditions that trigger an automatic fallback instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountCondition {
    Delinquent,
    Downgraded,
}

/// Failures reported by the external VPN service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("server cache not found")]
    CacheMissing,

    #[error("request timed out")]
    Timeout,

    #[error("API unreachable")]
    Unreachable,

    #[error("authentication failed")]
    AuthFailure,

    #[error("too many requests")]
    RateLimited,

    #[error("account is delinquent")]
    AccountDelinquent,

    #[error("account was downgraded")]
    AccountDowngraded,

    #[error("connection not found")]
    ConnectionNotFound,

    #[error("server not found: {0}")]
    ServerNotFound(String),

    #[error("activation failed: {0}")]
    ActivationFailed(String),

    #[error("{0}")]
    Unknown(String),
}

impl ServiceError {
    /// Failures caused by infrastructure rather than by something the user
    /// can act on. The UI offers troubleshooting for these.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            ServiceError::Timeout | ServiceError::Unreachable | ServiceError::CacheMissing
        )
    }

    pub fn account_condition(&self) -> Option<AccountCondition> {
        match self {
            ServiceError::AccountDelinquent => Some(AccountCondition::Delinquent),
            ServiceError::AccountDowngraded => Some(AccountCondition::Downgraded),
            _ => None,
        }
    }
}

// ── Crate-level ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("VPN service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("UI loop is closed")]
    UiLoopClosed,

    #[error("UI queue is full")]
    UiQueueFull,
}

pub type CoreResult<T> = Result<T, CoreError>;
