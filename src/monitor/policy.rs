//! Monitor definitions and funding-parameter override parsing.
//!
//! A monitor is an operator-registered funding policy identified by the
//! tuple (holding kind, holding id, property name, funding account). Each
//! account carrying the property becomes a monitored account whose
//! parameters default to the monitor's and may be overridden through the
//! property value string.

use serde::{Deserialize, Serialize};

use crate::account::{AccountId, Address, HoldingId, HoldingKind};
use crate::error::ConfigError;
use crate::tx::FundingCredential;

/// Minimum fund amount.
pub const MIN_FUND_AMOUNT: u64 = 1;

/// Minimum fund threshold.
pub const MIN_FUND_THRESHOLD: u64 = 1;

/// Minimum fund interval in blocks.
pub const MIN_FUND_INTERVAL: u64 = 10;

/// Funding parameters: transfer amount, trigger threshold, cooldown interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingParams {
    /// Units transferred per funding.
    pub amount: u64,
    /// Balance below which funding triggers.
    pub threshold: u64,
    /// Minimum number of committed blocks between fundings of the same
    /// account.
    pub interval: u64,
}

impl FundingParams {
    /// Validate against the configured minimums.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.amount < MIN_FUND_AMOUNT {
            return Err(ConfigError::AmountBelowMinimum {
                amount: self.amount,
                min: MIN_FUND_AMOUNT,
            });
        }
        if self.threshold < MIN_FUND_THRESHOLD {
            return Err(ConfigError::ThresholdBelowMinimum {
                threshold: self.threshold,
                min: MIN_FUND_THRESHOLD,
            });
        }
        if self.interval < MIN_FUND_INTERVAL {
            return Err(ConfigError::IntervalBelowMinimum {
                interval: self.interval,
                min: MIN_FUND_INTERVAL,
            });
        }
        Ok(())
    }

    /// Apply `name=value` overrides from a property value string.
    ///
    /// Overrides are comma-separated; recognized names are `amount`,
    /// `threshold` and `interval`, case-insensitive, with whitespace trimmed
    /// on both sides of `=`. Any invalid segment rejects the whole string:
    /// a segment without `=` at position one or later, an unrecognized name,
    /// a non-numeric value, or a value below its minimum. An empty or absent
    /// value string returns the defaults unchanged.
    ///
    /// This routine is used both by the start-scan over existing property
    /// holders and by the property-set notification path, so identical input
    /// yields identical parameters in both.
    pub fn with_overrides(
        self,
        account: AccountId,
        property: &str,
        value: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let Some(value) = value else {
            return Ok(self);
        };
        if value.is_empty() {
            return Ok(self);
        }

        let invalid = |reason: String| ConfigError::InvalidOverride {
            account,
            property: property.to_string(),
            value: value.to_string(),
            reason,
        };

        let mut params = self;
        for segment in value.split(',') {
            let Some(pos) = segment.find('=') else {
                return Err(invalid(format!(
                    "segment '{}' is missing '='",
                    segment.trim()
                )));
            };
            if pos == 0 {
                return Err(invalid("override name is empty".to_string()));
            }
            let name = segment[..pos].trim().to_ascii_lowercase();
            let raw = segment[pos + 1..].trim();
            let parsed: u64 = raw
                .parse()
                .map_err(|_| invalid(format!("'{raw}' is not a valid number")))?;
            match name.as_str() {
                "amount" => {
                    if parsed < MIN_FUND_AMOUNT {
                        return Err(invalid(format!("minimum fund amount is {MIN_FUND_AMOUNT}")));
                    }
                    params.amount = parsed;
                }
                "threshold" => {
                    if parsed < MIN_FUND_THRESHOLD {
                        return Err(invalid(format!(
                            "minimum fund threshold is {MIN_FUND_THRESHOLD}"
                        )));
                    }
                    params.threshold = parsed;
                }
                "interval" => {
                    if parsed < MIN_FUND_INTERVAL {
                        return Err(invalid(format!(
                            "minimum fund interval is {MIN_FUND_INTERVAL}"
                        )));
                    }
                    params.interval = parsed;
                }
                other => {
                    return Err(invalid(format!("unrecognized override name '{other}'")));
                }
            }
        }
        Ok(params)
    }
}

/// Identity of a monitor.
///
/// No two active monitors share the same key. The holding id is forced to
/// [`HoldingId::NONE`] for coin monitors, so coin keys compare equal
/// regardless of the caller-supplied holding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorKey {
    kind: HoldingKind,
    holding: HoldingId,
    property: String,
    funding_account: AccountId,
}

impl MonitorKey {
    /// Create a key.
    #[must_use]
    pub fn new(
        kind: HoldingKind,
        holding: HoldingId,
        property: impl Into<String>,
        funding_account: AccountId,
    ) -> Self {
        let holding = match kind {
            HoldingKind::Coin => HoldingId::NONE,
            HoldingKind::Asset | HoldingKind::Currency => holding,
        };
        Self {
            kind,
            holding,
            property: property.into(),
            funding_account,
        }
    }

    /// The holding kind this monitor watches.
    #[must_use]
    pub const fn kind(&self) -> HoldingKind {
        self.kind
    }

    /// The asset or currency identifier; `NONE` for coin monitors.
    #[must_use]
    pub const fn holding(&self) -> HoldingId {
        self.holding
    }

    /// The account property name the monitor is tied to.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    /// The funding account identifier.
    #[must_use]
    pub const fn funding_account(&self) -> AccountId {
        self.funding_account
    }
}

/// Request to start a monitor.
#[derive(Debug, Clone)]
pub struct MonitorSpec {
    /// Monitor identity.
    pub key: MonitorKey,
    /// Default funding parameters for accounts carrying the property.
    pub defaults: FundingParams,
    /// Funding account signing credential.
    pub credential: FundingCredential,
}

impl MonitorSpec {
    /// Build a spec; the monitor identity takes its funding account from the
    /// credential.
    pub fn new(
        kind: HoldingKind,
        holding: HoldingId,
        property: impl Into<String>,
        defaults: FundingParams,
        credential: FundingCredential,
    ) -> Self {
        let key = MonitorKey::new(kind, holding, property, credential.account());
        Self {
            key,
            defaults,
            credential,
        }
    }
}

/// An operator-registered funding policy. Immutable once started.
#[derive(Debug)]
pub struct MonitorDefinition {
    key: MonitorKey,
    defaults: FundingParams,
    credential: FundingCredential,
}

impl MonitorDefinition {
    pub(crate) fn new(spec: MonitorSpec) -> Self {
        Self {
            key: spec.key,
            defaults: spec.defaults,
            credential: spec.credential,
        }
    }

    /// Monitor identity.
    #[must_use]
    pub const fn key(&self) -> &MonitorKey {
        &self.key
    }

    /// Default funding parameters.
    #[must_use]
    pub const fn defaults(&self) -> FundingParams {
        self.defaults
    }

    pub(crate) const fn credential(&self) -> &FundingCredential {
        &self.credential
    }

    /// Diagnostic address of the funding account.
    #[must_use]
    pub fn funding_address(&self) -> Address {
        self.key.funding_account.address()
    }

    /// Defensive copy for lookups and admin display.
    #[must_use]
    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            key: self.key.clone(),
            defaults: self.defaults,
            funding_address: self.funding_address().as_str().to_string(),
        }
    }
}

/// Defensive snapshot of an active monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorSnapshot {
    /// Monitor identity.
    pub key: MonitorKey,
    /// Default funding parameters.
    pub defaults: FundingParams,
    /// Funding account address for display.
    pub funding_address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULTS: FundingParams = FundingParams {
        amount: 10,
        threshold: 20,
        interval: 30,
    };

    fn apply(value: Option<&str>) -> Result<FundingParams, ConfigError> {
        DEFAULTS.with_overrides(AccountId::new(1), "fund", value)
    }

    #[test]
    fn absent_or_empty_value_inherits_defaults() {
        assert_eq!(apply(None).unwrap(), DEFAULTS);
        assert_eq!(apply(Some("")).unwrap(), DEFAULTS);
    }

    #[test]
    fn partial_override_keeps_remaining_defaults() {
        let params = apply(Some("amount=50,threshold=5")).unwrap();
        assert_eq!(params.amount, 50);
        assert_eq!(params.threshold, 5);
        assert_eq!(params.interval, 30);
    }

    #[test]
    fn override_names_are_case_insensitive_and_trimmed() {
        let params = apply(Some(" AMOUNT = 7 , Interval = 15 ")).unwrap();
        assert_eq!(params.amount, 7);
        assert_eq!(params.interval, 15);
        assert_eq!(params.threshold, 20);
    }

    #[test]
    fn missing_equals_rejects_whole_string() {
        let err = apply(Some("amount=50,12")).unwrap_err();
        assert!(err.to_string().contains("missing '='"));
    }

    #[test]
    fn leading_equals_is_invalid() {
        let err = apply(Some("=50")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { .. }));
    }

    #[test]
    fn unrecognized_name_is_invalid() {
        let err = apply(Some("amont=50")).unwrap_err();
        assert!(err.to_string().contains("unrecognized"));
    }

    #[test]
    fn below_minimum_values_are_rejected() {
        assert!(apply(Some("amount=0")).is_err());
        assert!(apply(Some("threshold=0")).is_err());
        assert!(apply(Some("interval=9")).is_err());
        assert!(apply(Some("interval=10")).is_ok());
    }

    #[test]
    fn non_numeric_value_is_rejected() {
        let err = apply(Some("amount=ten")).unwrap_err();
        assert!(err.to_string().contains("not a valid number"));
    }

    #[test]
    fn invalid_segment_applies_nothing() {
        // The earlier valid segment must not leak through.
        let err = apply(Some("amount=50,bogus=1")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { .. }));
    }

    #[test]
    fn parsing_is_deterministic() {
        let a = apply(Some("amount=50,threshold=5")).unwrap();
        let b = apply(Some("amount=50,threshold=5")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn validate_enforces_minimums() {
        assert!(DEFAULTS.validate().is_ok());
        let bad = FundingParams {
            amount: 0,
            ..DEFAULTS
        };
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::AmountBelowMinimum { .. })
        ));
        let bad = FundingParams {
            interval: 5,
            ..DEFAULTS
        };
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::IntervalBelowMinimum { .. })
        ));
    }

    #[test]
    fn coin_key_forces_null_holding() {
        let coin = MonitorKey::new(
            HoldingKind::Coin,
            HoldingId::new(99),
            "fund",
            AccountId::new(1),
        );
        assert_eq!(coin.holding(), HoldingId::NONE);

        let asset = MonitorKey::new(
            HoldingKind::Asset,
            HoldingId::new(99),
            "fund",
            AccountId::new(1),
        );
        assert_eq!(asset.holding(), HoldingId::new(99));

        // Coin keys compare equal regardless of the supplied holding id.
        let other = MonitorKey::new(
            HoldingKind::Coin,
            HoldingId::new(7),
            "fund",
            AccountId::new(1),
        );
        assert_eq!(coin, other);
    }

    #[test]
    fn snapshot_serializes_for_admin_display() {
        let spec = MonitorSpec::new(
            HoldingKind::Asset,
            HoldingId::new(5),
            "fund",
            DEFAULTS,
            FundingCredential::new(AccountId::new(9), "secret phrase"),
        );
        let snapshot = MonitorDefinition::new(spec).snapshot();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["key"]["kind"], "asset");
        assert_eq!(json["defaults"]["amount"], 10);
        assert!(json["funding_address"]
            .as_str()
            .unwrap()
            .starts_with("FW-"));
    }
}
