//! Доменные модели: инвестор, лоты, транзакции.

use crate::{error::Result, interest::checked_sum};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InvestorProfile {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

impl InvestorProfile {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn patched(self, patch: ProfilePatch) -> Self {
        Self {
            name: patch.name.unwrap_or(self.name),
            phone: merge_field(patch.phone, self.phone),
            email: merge_field(patch.email, self.email),
            address: merge_field(patch.address, self.address),
            notes: merge_field(patch.notes, self.notes),
        }
    }
}

/// Частичное изменение профиля: `None` — оставить как есть,
/// пустая строка — очистить поле.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

fn merge_field(new: Option<String>, old: Option<String>) -> Option<String> {
    match new {
        Some(v) if v.trim().is_empty() => None,
        Some(v) => Some(v),
        None => old,
    }
}

/// Открытый транш: принципал, который продолжает приносить проценты.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lot {
    pub amount: Decimal,
    pub start_date: NaiveDate,
    /// Кэш для отображения, для расчёта баланса не используется.
    #[serde(default)]
    pub last_computed_interest: Decimal,
    pub note: Option<String>,
}

impl Lot {
    pub fn new(amount: Decimal, start_date: NaiveDate) -> Self {
        Self {
            amount,
            start_date,
            last_computed_interest: Decimal::ZERO,
            note: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.amount > Decimal::ZERO
    }
}

/// Снимок выведенной части лота. Проценты по нему больше не начисляются.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClosedLot {
    pub amount: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub interest: Decimal,
}

impl ClosedLot {
    pub fn cut(amount: Decimal, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            amount,
            start_date,
            end_date,
            interest: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WithdrawalRecord {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfitPayment {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Investor {
    pub id: Uuid,
    #[serde(flatten)]
    pub profile: InvestorProfile,
    pub joined: NaiveDate,
    pub balance: Decimal,
    #[serde(default)]
    pub investments: Vec<Lot>,
    #[serde(default)]
    pub withdrawn_investments: Vec<ClosedLot>,
    #[serde(default)]
    pub profits: Vec<ProfitPayment>,
    #[serde(default)]
    pub withdrawals: Vec<WithdrawalRecord>,
}

impl Investor {
    pub fn open_lots(&self) -> impl Iterator<Item = &Lot> {
        self.investments.iter().filter(|l| l.is_open())
    }

    pub fn open_principal(&self) -> Result<Decimal> {
        checked_sum(self.open_lots().map(|l| l.amount))
    }

    pub fn profit_paid(&self) -> Result<Decimal> {
        checked_sum(self.profits.iter().map(|p| p.amount))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TxKind {
    Deposit,
    Withdrawal,
    ProfitPayment,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxKind::Deposit => "deposit",
            TxKind::Withdrawal => "withdrawal",
            TxKind::ProfitPayment => "profit",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub kind: TxKind,
    pub investor_id: Uuid,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub note: Option<String>,
}

/// Фильтр для выборки транзакций; пустой фильтр пропускает всё.
#[derive(Debug, Clone, Default)]
pub struct TxFilter {
    pub investor_id: Option<Uuid>,
    pub kind: Option<TxKind>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl TxFilter {
    pub fn investor(id: Uuid) -> Self {
        Self { investor_id: Some(id), ..Self::default() }
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        self.investor_id.map_or(true, |id| tx.investor_id == id)
            && self.kind.map_or(true, |k| tx.kind == k)
            && self.from.map_or(true, |d| tx.date >= d)
            && self.to.map_or(true, |d| tx.date <= d)
    }
}

/// Сводка по фонду на дату.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerSummary {
    pub as_of: NaiveDate,
    pub investors: usize,
    pub total_balance: Decimal,
    pub pending_interest: Decimal,
    pub profit_paid: Decimal,
    pub total_deposited: Decimal,
    pub total_withdrawn: Decimal,
}
