//! Настройки фонда: ставка, политика начисления, длина цикла, валюта.

use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Политика начисления процентов.
///
/// В хранилище пишется строкой; всё, что не `"daily"`, читается как
/// `FlatCycle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccrualPolicy {
    #[default]
    Daily,
    FlatCycle,
}

impl From<String> for AccrualPolicy {
    fn from(s: String) -> Self {
        AccrualPolicy::from(s.as_str())
    }
}

impl From<&str> for AccrualPolicy {
    fn from(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("daily") {
            AccrualPolicy::Daily
        } else {
            AccrualPolicy::FlatCycle
        }
    }
}

impl From<AccrualPolicy> for String {
    fn from(p: AccrualPolicy) -> Self {
        p.to_string()
    }
}

impl fmt::Display for AccrualPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccrualPolicy::Daily => f.write_str("daily"),
            AccrualPolicy::FlatCycle => f.write_str("flat-cycle"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Ставка за цикл, доля (0.175 = 17.5%).
    pub interest_rate: Decimal,
    pub accrual_policy: AccrualPolicy,
    pub cycle_length_days: u32,
    /// Только подпись для вывода, конвертации валют нет.
    pub currency: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            interest_rate: Decimal::new(175, 3),
            accrual_policy: AccrualPolicy::Daily,
            cycle_length_days: 30,
            currency: "USD".into(),
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interest_rate.is_sign_negative() {
            return Err(LedgerError::Validation(format!(
                "interest rate must not be negative, got {}",
                self.interest_rate
            )));
        }
        if self.cycle_length_days == 0 {
            return Err(LedgerError::Validation("cycle length must be at least 1 day".into()));
        }
        if self.currency.trim().is_empty() {
            return Err(LedgerError::Validation("currency label is empty".into()));
        }
        Ok(())
    }
}
