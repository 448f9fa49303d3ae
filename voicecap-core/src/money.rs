//! Cost rate table and the rounding rule shared by the Ledger and every
//! caller that needs to preview a charge before committing it.
//!
//! Spec §4.F requires `round_half_even(quantity * rate, 6 decimals)` and
//! that rounding be "consistent across components (tests depend on it)".
//! `rust_decimal` gives us exact base-10 arithmetic so the half-even rule
//! means what it says; a binary float would drift on exactly the inputs
//! the testable properties in spec §8 exercise.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The billable services named in spec §4.F's rate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Speech,
    ObjectStorage,
    KvStore,
    Email,
    KeyVault,
    Summary,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Service::Speech => "speech",
            Service::ObjectStorage => "object_storage",
            Service::KvStore => "kv_store",
            Service::Email => "email",
            Service::KeyVault => "key_vault",
            Service::Summary => "summary",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Service {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "speech" => Ok(Service::Speech),
            "object_storage" => Ok(Service::ObjectStorage),
            "kv_store" => Ok(Service::KvStore),
            "email" => Ok(Service::Email),
            "key_vault" => Ok(Service::KeyVault),
            "summary" => Ok(Service::Summary),
            other => Err(crate::error::CoreError::new(
                crate::error::ErrorCategory::InvalidInput,
                format!("unknown service tag: {other}"),
            )),
        }
    }
}

/// The operation+unit pairs that appear in the rate table. Each variant
/// carries the unit name verbatim so it round-trips onto a `UsageRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Speech: minute of audio — 0.006/minute
    Minute,
    /// ObjectStorage upload: GB — 0.023/GB
    Gb,
    /// ObjectStorage stored: GB·month — 0.023/GB·month
    GbMonth,
    /// KVStore read: 1,000,000 units — 0.25 per million
    MillionReads,
    /// KVStore write: 1,000,000 units — 1.25 per million
    MillionWrites,
    /// Email: 1,000 messages — 0.10 per thousand
    ThousandMessages,
    /// KeyVault stored: secret·month — 0.40/secret-month
    SecretMonth,
    /// KeyVault retrieve: secret — 0.05/secret
    Secret,
    /// Summary LLM input: 1,000 tokens — 0.003/thousand
    ThousandInputTokens,
    /// Summary LLM output: 1,000 tokens — 0.006/thousand
    ThousandOutputTokens,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Unit::Minute => "minute",
            Unit::Gb => "gb",
            Unit::GbMonth => "gb_month",
            Unit::MillionReads => "million_reads",
            Unit::MillionWrites => "million_writes",
            Unit::ThousandMessages => "thousand_messages",
            Unit::SecretMonth => "secret_month",
            Unit::Secret => "secret",
            Unit::ThousandInputTokens => "thousand_input_tokens",
            Unit::ThousandOutputTokens => "thousand_output_tokens",
        };
        write!(f, "{s}")
    }
}

/// A `(service, unit)` pair resolves to exactly one rate.
#[derive(Debug, Clone, Copy)]
pub struct Rate {
    pub service: Service,
    pub unit: Unit,
    pub rate_usd: Decimal,
}

/// Look up the fixed rate for a `(service, unit)` pair from spec §4.F's
/// table. Returns `None` for combinations the table doesn't define —
/// callers treat that as a programming error, not a runtime one, since
/// the set of (service, unit) pairs used by this codebase is closed.
pub fn lookup_rate(service: Service, unit: Unit) -> Option<Rate> {
    use Service::*;
    use Unit::*;

    let rate_usd = match (service, unit) {
        (Speech, Minute) => Decimal::new(6, 3),                    // 0.006
        (ObjectStorage, Gb) => Decimal::new(23, 3),                // 0.023
        (ObjectStorage, GbMonth) => Decimal::new(23, 3),           // 0.023
        (KvStore, MillionReads) => Decimal::new(25, 2),            // 0.25
        (KvStore, MillionWrites) => Decimal::new(125, 2),          // 1.25
        (Email, ThousandMessages) => Decimal::new(10, 2),          // 0.10
        (KeyVault, SecretMonth) => Decimal::new(40, 2),            // 0.40
        (KeyVault, Secret) => Decimal::new(5, 2),                  // 0.05
        (Summary, ThousandInputTokens) => Decimal::new(3, 3),      // 0.003
        (Summary, ThousandOutputTokens) => Decimal::new(6, 3),     // 0.006
        _ => return None,
    };

    Some(Rate {
        service,
        unit,
        rate_usd,
    })
}

/// `round_half_even(quantity * rate, 6 decimals)` — the one rounding rule
/// used by every cost computation in this codebase.
pub fn round_half_even(quantity: Decimal, rate: Decimal) -> Decimal {
    (quantity * rate).round_dp_with_strategy(6, RoundingStrategy::MidpointNearestEven)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speech_transcription_matches_spec_example() {
        // spec §8 S1: 15s / 60 * 0.006 = 0.0015
        let rate = lookup_rate(Service::Speech, Unit::Minute).unwrap();
        let minutes = Decimal::new(15, 0) / Decimal::new(60, 0);
        let cost = round_half_even(minutes, rate.rate_usd);
        assert_eq!(cost, Decimal::new(1500, 6));
    }

    #[test]
    fn keyvault_retrieve_is_five_cents() {
        let rate = lookup_rate(Service::KeyVault, Unit::Secret).unwrap();
        let cost = round_half_even(Decimal::ONE, rate.rate_usd);
        assert_eq!(cost, Decimal::new(50000, 6));
    }

    #[test]
    fn half_even_rounds_to_nearest_even_on_tie() {
        // 0.0000005 rounded to 6dp: midpoint between 0.000000 and 0.000001,
        // nearest-even picks 0.000000.
        let cost =
            (Decimal::new(5, 7)).round_dp_with_strategy(6, RoundingStrategy::MidpointNearestEven);
        assert_eq!(cost, Decimal::new(0, 6));
    }

    #[test]
    fn unknown_combination_is_none() {
        assert!(lookup_rate(Service::Speech, Unit::Gb).is_none());
    }
}
