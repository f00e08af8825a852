//! Account and holding identifiers.
//!
//! Accounts and holdings are identified by opaque 64-bit numbers assigned by
//! the ledger. The [`Address`] encoding renders an account id as a
//! human-readable checksummed string for diagnostics only; it is never parsed
//! back.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a ledger account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(u64);

impl AccountId {
    /// Wrap a raw account identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Diagnostic address string for this account.
    #[must_use]
    pub fn address(self) -> Address {
        Address::from_account(self)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for an asset or currency holding.
///
/// Native coin has no separate identifier; coin monitors carry
/// [`HoldingId::NONE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HoldingId(u64);

impl HoldingId {
    /// The null holding identifier used for native-coin monitors.
    pub const NONE: Self = Self(0);

    /// Wrap a raw holding identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// True for the null holding identifier.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for HoldingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of holding a monitor watches.
///
/// Determines which balance accessor and transfer payload are used when a
/// funding check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingKind {
    /// The chain's native coin.
    Coin,
    /// An issued asset, identified by a [`HoldingId`].
    Asset,
    /// A monetary-system currency, identified by a [`HoldingId`].
    Currency,
}

impl HoldingKind {
    /// Upper-case label used in diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Coin => "COIN",
            Self::Asset => "ASSET",
            Self::Currency => "CURRENCY",
        }
    }
}

impl fmt::Display for HoldingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Base32 alphabet without the easily confused I, O, Y and Z.
const ADDRESS_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKLMNPQRSTUVWX";

/// Human-readable account address used in diagnostics.
///
/// The encoding is deterministic and injective: the big-endian account id
/// followed by a two-byte blake3 checksum, rendered as 16 base32 digits in
/// groups of four under an `FW-` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Encode an account identifier.
    #[must_use]
    pub fn from_account(id: AccountId) -> Self {
        let raw = id.as_u64().to_be_bytes();
        let check = blake3::hash(&raw);

        let mut payload = [0u8; 10];
        payload[..8].copy_from_slice(&raw);
        payload[8..].copy_from_slice(&check.as_bytes()[..2]);

        // 10 bytes = 80 bits = exactly 16 base32 digits.
        let mut out = String::with_capacity(22);
        out.push_str("FW-");
        let mut acc: u32 = 0;
        let mut bits: u32 = 0;
        let mut emitted = 0;
        for &byte in &payload {
            acc = (acc << 8) | u32::from(byte);
            bits += 8;
            while bits >= 5 {
                bits -= 5;
                if emitted > 0 && emitted % 4 == 0 {
                    out.push('-');
                }
                out.push(ADDRESS_ALPHABET[((acc >> bits) & 0x1f) as usize] as char);
                emitted += 1;
            }
        }
        Self(out)
    }

    /// The encoded string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_encoding_is_deterministic() {
        let a = Address::from_account(AccountId::new(42));
        let b = Address::from_account(AccountId::new(42));
        assert_eq!(a, b);
    }

    #[test]
    fn address_encoding_is_injective_over_sample() {
        let mut seen = std::collections::HashSet::new();
        for id in [0u64, 1, 2, 41, 42, u64::MAX, u64::MAX - 1, 1 << 63] {
            assert!(seen.insert(Address::from_account(AccountId::new(id))));
        }
    }

    #[test]
    fn address_has_expected_shape() {
        let addr = Address::from_account(AccountId::new(7));
        let s = addr.as_str();
        assert!(s.starts_with("FW-"));
        // FW- prefix plus four groups of four digits.
        assert_eq!(s.len(), 3 + 16 + 3);
        assert_eq!(s.matches('-').count(), 4);
    }

    #[test]
    fn coin_holding_is_none() {
        assert!(HoldingId::NONE.is_none());
        assert!(!HoldingId::new(9).is_none());
    }

    #[test]
    fn holding_kind_labels() {
        assert_eq!(HoldingKind::Coin.to_string(), "COIN");
        assert_eq!(HoldingKind::Asset.to_string(), "ASSET");
        assert_eq!(HoldingKind::Currency.to_string(), "CURRENCY");
    }
}
