//! Transaction fabrication and broadcast boundary.
//!
//! The funding monitor never constructs or signs transactions itself; it
//! hands a [`TransferDraft`] to a [`TransferGateway`]. `build` computes the
//! fee so callers can run affordability checks before committing to
//! `broadcast`. Broadcast is fire-and-forget: success means the transfer was
//! accepted into the submission path, not settled.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::account::{AccountId, HoldingId};

/// Validity window for funding transfers, in blocks.
pub const TRANSFER_DEADLINE_BLOCKS: u32 = 1440;

/// Errors that can occur during transfer construction or broadcast.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The draft could not be turned into a valid transaction.
    #[error("Invalid transfer: {reason}")]
    InvalidTransfer {
        /// Why the draft was rejected.
        reason: String,
    },

    /// Signing with the funding credential failed.
    #[error("Signing failed: {reason}")]
    Signing {
        /// Underlying signing failure.
        reason: String,
    },

    /// The submission path refused the signed transfer.
    #[error("Broadcast rejected: {reason}")]
    Rejected {
        /// Rejection cause.
        reason: String,
    },
}

/// Unique identifier assigned to a signed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Create a new random transaction id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Signing credential for a funding account.
///
/// The secret is opaque to the monitor core; only the gateway interprets it.
/// `Debug` output redacts it.
#[derive(Clone)]
pub struct FundingCredential {
    account: AccountId,
    secret: String,
}

impl FundingCredential {
    /// Create a credential for the given funding account.
    pub fn new(account: AccountId, secret: impl Into<String>) -> Self {
        Self {
            account,
            secret: secret.into(),
        }
    }

    /// The funding account this credential signs for.
    #[must_use]
    pub const fn account(&self) -> AccountId {
        self.account
    }

    /// The raw secret, for gateway implementations only.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for FundingCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FundingCredential")
            .field("account", &self.account)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// What a funding transfer moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferPayload {
    /// Plain native-coin payment; the amount rides in the envelope.
    Coin,

    /// Asset transfer.
    Asset {
        /// Asset identifier.
        asset: HoldingId,
        /// Units moved.
        quantity: u64,
    },

    /// Currency transfer.
    Currency {
        /// Currency identifier.
        currency: HoldingId,
        /// Units moved.
        units: u64,
    },
}

/// An unsigned funding transfer request.
#[derive(Debug, Clone)]
pub struct TransferDraft {
    /// Recipient account.
    pub recipient: AccountId,
    /// Native-coin amount; zero for holding transfers.
    pub amount: u64,
    /// Transfer payload.
    pub payload: TransferPayload,
    /// Timestamp anchoring the transfer, the chain's last block time.
    pub timestamp: DateTime<Utc>,
    /// Validity window in blocks.
    pub deadline_blocks: u32,
}

/// A fabricated, signed transfer with its computed fee.
#[derive(Debug, Clone)]
pub struct SignedTransfer {
    /// Assigned transaction id.
    pub id: TransactionId,
    /// Funding (sender) account.
    pub sender: AccountId,
    /// Recipient account.
    pub recipient: AccountId,
    /// Native-coin amount carried in the envelope.
    pub amount: u64,
    /// Computed fee in native coin.
    pub fee: u64,
    /// Transfer payload.
    pub payload: TransferPayload,
    /// Timestamp anchoring the transfer.
    pub timestamp: DateTime<Utc>,
    /// Validity window in blocks.
    pub deadline_blocks: u32,
}

/// Fabricates and broadcasts funding transfers.
pub trait TransferGateway: Send + Sync {
    /// Construct and sign a transfer, computing its fee.
    fn build(
        &self,
        credential: &FundingCredential,
        draft: TransferDraft,
    ) -> Result<SignedTransfer, GatewayError>;

    /// Accept a signed transfer for network propagation.
    fn broadcast(&self, transfer: SignedTransfer) -> Result<(), GatewayError>;
}

/// Recording in-memory gateway.
///
/// Charges a fixed fee, assigns random ids, and records broadcast transfers.
/// Reference implementation for embedded usage and tests.
#[derive(Debug)]
pub struct MemoryGateway {
    fee: u64,
    sent: Mutex<Vec<SignedTransfer>>,
}

impl MemoryGateway {
    /// Create a gateway charging `fee` per transfer.
    #[must_use]
    pub fn new(fee: u64) -> Self {
        Self {
            fee,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Transfers accepted for broadcast so far, in submission order.
    #[must_use]
    pub fn broadcasts(&self) -> Vec<SignedTransfer> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TransferGateway for MemoryGateway {
    fn build(
        &self,
        credential: &FundingCredential,
        draft: TransferDraft,
    ) -> Result<SignedTransfer, GatewayError> {
        match draft.payload {
            TransferPayload::Coin if draft.amount == 0 => {
                return Err(GatewayError::InvalidTransfer {
                    reason: "coin transfer amount must be non-zero".to_string(),
                });
            }
            TransferPayload::Asset { .. } | TransferPayload::Currency { .. }
                if draft.amount != 0 =>
            {
                return Err(GatewayError::InvalidTransfer {
                    reason: "holding transfers carry no envelope amount".to_string(),
                });
            }
            _ => {}
        }
        if credential.secret().is_empty() {
            return Err(GatewayError::Signing {
                reason: "empty signing secret".to_string(),
            });
        }
        Ok(SignedTransfer {
            id: TransactionId::new(),
            sender: credential.account(),
            recipient: draft.recipient,
            amount: draft.amount,
            fee: self.fee,
            payload: draft.payload,
            timestamp: draft.timestamp,
            deadline_blocks: draft.deadline_blocks,
        })
    }

    fn broadcast(&self, transfer: SignedTransfer) -> Result<(), GatewayError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(transfer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure the trait is object-safe
    fn _assert_gateway_object_safe(_: &dyn TransferGateway) {}

    fn draft(amount: u64, payload: TransferPayload) -> TransferDraft {
        TransferDraft {
            recipient: AccountId::new(2),
            amount,
            payload,
            timestamp: Utc::now(),
            deadline_blocks: TRANSFER_DEADLINE_BLOCKS,
        }
    }

    #[test]
    fn memory_gateway_builds_and_records() {
        let gateway = MemoryGateway::new(3);
        let credential = FundingCredential::new(AccountId::new(1), "secret phrase");

        let transfer = gateway
            .build(&credential, draft(10, TransferPayload::Coin))
            .unwrap();
        assert_eq!(transfer.fee, 3);
        assert_eq!(transfer.sender, AccountId::new(1));

        gateway.broadcast(transfer.clone()).unwrap();
        let sent = gateway.broadcasts();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, transfer.id);
    }

    #[test]
    fn holding_transfer_rejects_envelope_amount() {
        let gateway = MemoryGateway::new(1);
        let credential = FundingCredential::new(AccountId::new(1), "secret phrase");
        let payload = TransferPayload::Asset {
            asset: HoldingId::new(7),
            quantity: 5,
        };

        let err = gateway.build(&credential, draft(5, payload)).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidTransfer { .. }));
    }

    #[test]
    fn zero_amount_coin_transfer_is_invalid() {
        let gateway = MemoryGateway::new(1);
        let credential = FundingCredential::new(AccountId::new(1), "secret phrase");

        let err = gateway
            .build(&credential, draft(0, TransferPayload::Coin))
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidTransfer { .. }));
    }

    #[test]
    fn credential_debug_redacts_secret() {
        let credential = FundingCredential::new(AccountId::new(1), "very secret");
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("very secret"));
        assert!(rendered.contains("redacted"));
    }
}
