//! Error types for fundwatch.
//!
//! All errors are strongly typed using thiserror. Configuration errors are
//! surfaced synchronously to administrative callers; transient ledger and
//! gateway failures inside the worker are logged per item and never abort
//! the drain loop.

use thiserror::Error;

use crate::account::AccountId;
use crate::ledger::LedgerError;
use crate::tx::GatewayError;

/// Configuration and validation errors surfaced to administrative callers.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Fund amount below the configured minimum.
    #[error("Fund amount {amount} is below the minimum of {min}")]
    AmountBelowMinimum {
        /// Requested amount.
        amount: u64,
        /// Minimum allowed amount.
        min: u64,
    },

    /// Fund threshold below the configured minimum.
    #[error("Fund threshold {threshold} is below the minimum of {min}")]
    ThresholdBelowMinimum {
        /// Requested threshold.
        threshold: u64,
        /// Minimum allowed threshold.
        min: u64,
    },

    /// Fund interval below the configured minimum.
    #[error("Fund interval {interval} is below the minimum of {min} blocks")]
    IntervalBelowMinimum {
        /// Requested interval in blocks.
        interval: u64,
        /// Minimum allowed interval in blocks.
        min: u64,
    },

    /// A property value override string failed validation.
    #[error("Account {account}, property '{property}', value '{value}' is not valid: {reason}")]
    InvalidOverride {
        /// The monitored account carrying the property.
        account: AccountId,
        /// Property name.
        property: String,
        /// The full override string as supplied.
        value: String,
        /// Why the string was rejected.
        reason: String,
    },

    /// The configured maximum number of active monitors is exceeded.
    #[error("Maximum of {max} monitors already started")]
    MonitorCapacity {
        /// Configured maximum.
        max: usize,
    },

    /// The subsystem has been shut down; monitors can no longer be started.
    #[error("Funding monitor processing has been stopped")]
    Stopped,

    /// Worker initialization failed; the subsystem is permanently stopped.
    #[error("Funding monitor initialization failed: {reason}")]
    StartupFailed {
        /// Underlying failure.
        reason: String,
    },
}

/// Top-level error type for fundwatch.
#[derive(Debug, Error)]
pub enum FundingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Ledger collaborator error.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Transfer gateway error.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Internal invariant failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl FundingError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a ledger error.
    #[must_use]
    pub const fn is_ledger(&self) -> bool {
        matches!(self, Self::Ledger(_))
    }

    /// Returns true if this is a gateway error.
    #[must_use]
    pub const fn is_gateway(&self) -> bool {
        matches!(self, Self::Gateway(_))
    }
}

/// Result type alias for fundwatch operations.
pub type FundingResult<T> = Result<T, FundingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_error_carries_context() {
        let err = ConfigError::InvalidOverride {
            account: AccountId::new(17),
            property: "fund".to_string(),
            value: "amount".to_string(),
            reason: "segment 'amount' is missing '='".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("17"));
        assert!(msg.contains("fund"));
        assert!(msg.contains("missing '='"));
    }

    #[test]
    fn config_error_converts_to_funding_error() {
        let err: FundingError = ConfigError::Stopped.into();
        assert!(err.is_config());
        assert!(err.to_string().contains("stopped"));
    }

    #[test]
    fn internal_error_helper() {
        let err = FundingError::internal("wake receiver already taken");
        assert!(!err.is_config());
        assert!(err.to_string().contains("wake receiver"));
    }
}
