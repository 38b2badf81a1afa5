//! Сверка балансов с журналом транзакций.
//!
//! Ожидаемый баланс инвестора = Σ депозитов − Σ выводов (выплаты прибыли
//! принципал не двигают). Если сохранённый баланс расходится больше чем на
//! допуск, баланс и `balance_after` последней транзакции инвестора
//! перезаписываются ожидаемым значением. Повторный прогон ничего не меняет.

use crate::model::{Investor, Transaction, TxKind};
use log::{info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Correction {
    pub investor_id: Uuid,
    pub investor_name: String,
    pub stored_balance: Decimal,
    pub expected_balance: Decimal,
    /// Транзакция, у которой переписан `balance_after`.
    pub patched_transaction: Option<Uuid>,
}

impl Correction {
    pub fn drift(&self) -> Decimal {
        self.stored_balance.saturating_sub(self.expected_balance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconciliationAuditor {
    tolerance: Decimal,
}

impl Default for ReconciliationAuditor {
    fn default() -> Self {
        Self { tolerance: Decimal::ONE }
    }
}

impl ReconciliationAuditor {
    pub fn new(tolerance: Decimal) -> Self {
        Self { tolerance: tolerance.abs() }
    }

    pub fn tolerance(&self) -> Decimal {
        self.tolerance
    }

    /// Никогда не падает: некорректные данные инвестора пропускаются.
    pub fn audit(
        &self,
        investors: &mut [Investor],
        transactions: &mut [Transaction],
    ) -> Vec<Correction> {
        let mut corrections = Vec::new();

        for inv in investors.iter_mut() {
            let Some(expected) = expected_balance(inv.id, transactions) else {
                continue;
            };
            // разница, не помещающаяся в Decimal, — тоже расхождение
            let within = inv
                .balance
                .checked_sub(expected)
                .is_some_and(|d| d.abs() <= self.tolerance);
            if within {
                continue;
            }

            let patched = latest_index(inv.id, transactions).map(|i| {
                transactions[i].balance_after = expected;
                transactions[i].id
            });

            warn!(
                "balance drift for {} ({}): stored {}, expected {}",
                inv.profile.name, inv.id, inv.balance, expected
            );
            corrections.push(Correction {
                investor_id: inv.id,
                investor_name: inv.profile.name.clone(),
                stored_balance: inv.balance,
                expected_balance: expected,
                patched_transaction: patched,
            });
            inv.balance = expected;
        }

        info!("audit finished: {} correction(s)", corrections.len());
        corrections
    }
}

/// `None` — нечего сверять: нет транзакций, они некорректны или сумма
/// не помещается в Decimal.
fn expected_balance(investor_id: Uuid, transactions: &[Transaction]) -> Option<Decimal> {
    let mut seen = false;
    let mut expected = Decimal::ZERO;
    for tx in transactions.iter().filter(|t| t.investor_id == investor_id) {
        if tx.amount.is_sign_negative() {
            warn!("skipping investor {investor_id}: transaction {} has negative amount", tx.id);
            return None;
        }
        seen = true;
        let next = match tx.kind {
            TxKind::Deposit => expected.checked_add(tx.amount),
            TxKind::Withdrawal => expected.checked_sub(tx.amount),
            TxKind::ProfitPayment => Some(expected),
        };
        let Some(next) = next else {
            warn!("skipping investor {investor_id}: transaction sum overflows");
            return None;
        };
        expected = next;
    }
    seen.then_some(expected)
}

/// Последняя по (date, created_at); при полном совпадении — последняя в журнале.
fn latest_index(investor_id: Uuid, transactions: &[Transaction]) -> Option<usize> {
    transactions
        .iter()
        .enumerate()
        .filter(|(_, t)| t.investor_id == investor_id)
        .max_by_key(|(i, t)| (t.date, t.created_at, *i))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InvestorProfile;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn investor(balance: i64) -> Investor {
        Investor {
            id: Uuid::new_v4(),
            profile: InvestorProfile::named("Test"),
            joined: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            balance: Decimal::new(balance, 0),
            investments: vec![],
            withdrawn_investments: vec![],
            profits: vec![],
            withdrawals: vec![],
        }
    }

    fn tx(inv: Uuid, kind: TxKind, amount: i64, day: u32, secs: i64) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            kind,
            investor_id: inv,
            amount: Decimal::new(amount, 0),
            balance_after: Decimal::ZERO,
            note: None,
        }
    }

    #[test]
    fn drift_within_tolerance_is_left_alone() {
        let mut invs = vec![investor(1000)];
        invs[0].balance = Decimal::new(10005, 1); // 1000.5
        let mut txs = vec![tx(invs[0].id, TxKind::Deposit, 1000, 1, 0)];
        let c = ReconciliationAuditor::default().audit(&mut invs, &mut txs);
        assert!(c.is_empty());
        assert_eq!(invs[0].balance, Decimal::new(10005, 1));
    }

    #[test]
    fn profit_payments_do_not_count() {
        let mut invs = vec![investor(1000)];
        let id = invs[0].id;
        let mut txs = vec![
            tx(id, TxKind::Deposit, 1000, 1, 0),
            tx(id, TxKind::ProfitPayment, 175, 2, 0),
        ];
        assert!(ReconciliationAuditor::default().audit(&mut invs, &mut txs).is_empty());
    }

    #[test]
    fn created_at_breaks_date_ties() {
        let mut invs = vec![investor(50)];
        let id = invs[0].id;
        let mut txs = vec![
            tx(id, TxKind::Deposit, 1000, 5, 10),
            tx(id, TxKind::Withdrawal, 100, 5, 0),
        ];
        let c = ReconciliationAuditor::default().audit(&mut invs, &mut txs);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].patched_transaction, Some(txs[0].id));
        assert_eq!(txs[0].balance_after, Decimal::new(900, 0));
        assert_eq!(txs[1].balance_after, Decimal::ZERO);
    }

    #[test]
    fn investor_without_transactions_is_skipped() {
        let mut invs = vec![investor(123)];
        let mut txs: Vec<Transaction> = vec![];
        assert!(ReconciliationAuditor::default().audit(&mut invs, &mut txs).is_empty());
        assert_eq!(invs[0].balance, Decimal::new(123, 0));
    }

    #[test]
    fn malformed_investor_does_not_abort_the_pass() {
        let mut invs = vec![investor(5), investor(5)];
        let (bad, good) = (invs[0].id, invs[1].id);
        let mut txs = vec![
            tx(bad, TxKind::Deposit, -10, 1, 0),
            tx(good, TxKind::Deposit, 700, 1, 0),
        ];
        let c = ReconciliationAuditor::default().audit(&mut invs, &mut txs);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].investor_id, good);
        assert_eq!(invs[0].balance, Decimal::new(5, 0));
        assert_eq!(invs[1].balance, Decimal::new(700, 0));
    }

    #[test]
    fn overflowing_history_is_skipped_without_panic() {
        let mut invs = vec![investor(1), investor(5)];
        let (big, good) = (invs[0].id, invs[1].id);
        let mut txs = vec![
            Transaction { amount: Decimal::MAX, ..tx(big, TxKind::Deposit, 0, 1, 0) },
            Transaction { amount: Decimal::MAX, ..tx(big, TxKind::Deposit, 0, 2, 0) },
            tx(good, TxKind::Deposit, 700, 1, 0),
        ];
        let c = ReconciliationAuditor::default().audit(&mut invs, &mut txs);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].investor_id, good);
        assert_eq!(invs[0].balance, Decimal::ONE);
    }

    #[test]
    fn unrepresentable_difference_counts_as_drift() {
        let mut invs = vec![investor(0)];
        invs[0].balance = Decimal::MIN;
        let id = invs[0].id;
        let mut txs = vec![Transaction {
            amount: Decimal::MAX,
            ..tx(id, TxKind::Deposit, 0, 1, 0)
        }];
        let c = ReconciliationAuditor::default().audit(&mut invs, &mut txs);
        assert_eq!(c.len(), 1);
        assert_eq!(invs[0].balance, Decimal::MAX);
        assert_eq!(txs[0].balance_after, Decimal::MAX);
    }
}
