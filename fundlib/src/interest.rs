//! Начисление процентов по одному лоту. Без сложного процента.

use crate::{
    config::{AccrualPolicy, LedgerConfig},
    error::{LedgerError, Result},
};
use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterestCalculator {
    rate: Decimal,
    cycle_length_days: u32,
    policy: AccrualPolicy,
}

impl InterestCalculator {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            rate: config.interest_rate,
            cycle_length_days: config.cycle_length_days,
            policy: config.accrual_policy,
        }
    }

    /// Проценты на сегодняшнюю дату, если даты не заданы.
    pub fn accrued(
        &self,
        amount: Decimal,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Decimal> {
        let today = Local::now().date_naive();
        self.accrued_between(amount, start.unwrap_or(today), end.unwrap_or(today))
    }

    /// Переполнение Decimal — `Validation`, а не паника.
    pub fn accrued_between(
        &self,
        amount: Decimal,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
        let accrued = match self.policy {
            AccrualPolicy::Daily => {
                // cycle_length_days == 0 отсекается LedgerConfig::validate
                let cycle = Decimal::from(self.cycle_length_days.max(1));
                amount
                    .checked_mul(self.rate)
                    .and_then(|v| v.checked_mul(Decimal::from(days_inclusive(start, end))))
                    .and_then(|v| v.checked_div(cycle))
            }
            AccrualPolicy::FlatCycle => amount.checked_mul(self.rate),
        };
        accrued.ok_or_else(|| overflow(format!("interest on {amount}")))
    }
}

/// Сумма без паники при переполнении.
pub fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Result<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
        .ok_or_else(|| overflow("sum".into()))
}

pub(crate) fn overflow(what: String) -> LedgerError {
    LedgerError::Validation(format!("amount overflow: {what}"))
}

/// Включительно: лот, открытый и оцениваемый в один день, — это 1 день.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> i64 {
    ((end - start).num_days() + 1).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn calc(policy: AccrualPolicy) -> InterestCalculator {
        InterestCalculator::new(&LedgerConfig { accrual_policy: policy, ..LedgerConfig::default() })
    }

    #[test]
    fn same_day_counts_as_one_day() {
        let c = calc(AccrualPolicy::Daily);
        let day0 = d(2025, 1, 1);
        let got = c.accrued_between(Decimal::new(50_000, 0), day0, day0).unwrap();
        assert_eq!(got.round_dp(2), Decimal::new(29167, 2));
    }

    #[test]
    fn full_cycle_under_daily_equals_rate() {
        let c = calc(AccrualPolicy::Daily);
        // 1..=30 января — 30 дней
        let got = c.accrued_between(Decimal::new(1000, 0), d(2025, 1, 1), d(2025, 1, 30)).unwrap();
        assert_eq!(got, Decimal::new(175, 0));
    }

    #[test]
    fn flat_cycle_ignores_elapsed_days() {
        let c = calc(AccrualPolicy::FlatCycle);
        let a = c.accrued_between(Decimal::new(1000, 0), d(2025, 1, 1), d(2025, 1, 1)).unwrap();
        let b = c.accrued_between(Decimal::new(1000, 0), d(2025, 1, 1), d(2025, 6, 1)).unwrap();
        assert_eq!(a, Decimal::new(175, 0));
        assert_eq!(a, b);
    }

    #[test]
    fn non_positive_amount_accrues_nothing() {
        let c = calc(AccrualPolicy::Daily);
        let (from, to) = (d(2025, 1, 1), d(2025, 2, 1));
        assert_eq!(c.accrued_between(Decimal::ZERO, from, to).unwrap(), Decimal::ZERO);
        assert_eq!(c.accrued_between(Decimal::new(-5, 0), from, to).unwrap(), Decimal::ZERO);
        let flat = calc(AccrualPolicy::FlatCycle);
        assert_eq!(flat.accrued(Decimal::ZERO, None, None).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn end_before_start_is_clamped() {
        assert_eq!(days_inclusive(d(2025, 1, 10), d(2025, 1, 1)), 0);
        let c = calc(AccrualPolicy::Daily);
        let got = c.accrued_between(Decimal::new(1000, 0), d(2025, 1, 10), d(2025, 1, 1)).unwrap();
        assert_eq!(got, Decimal::ZERO);
    }

    #[test]
    fn missing_dates_default_to_today() {
        let c = calc(AccrualPolicy::Daily);
        let today = Local::now().date_naive();
        let amount = Decimal::new(3000, 0);
        // start и end — сегодня: ровно один день
        let expected = c.accrued_between(amount, today, today).unwrap();
        assert_eq!(c.accrued(amount, None, None).unwrap(), expected);
    }

    #[test]
    fn huge_amount_is_an_error_not_a_panic() {
        let huge = Decimal::from_str_exact("50000000000000000000000000000").unwrap();
        let err = calc(AccrualPolicy::Daily)
            .accrued_between(huge, d(2025, 1, 1), d(2025, 1, 31))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(checked_sum([Decimal::MAX, Decimal::ONE]).is_err());
        assert_eq!(checked_sum([Decimal::ONE, Decimal::TWO]).unwrap(), Decimal::new(3, 0));
    }
}
