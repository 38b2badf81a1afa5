//! Журнал фонда: инвесторы, транзакции, настройки и операции над ними.
//!
//! Каждая изменяющая операция сначала проверяет входные данные, затем
//! меняет состояние в памяти и только потом сохраняет его через [`Store`].
//! Ошибка сохранения возвращается в [`Applied`], но изменение не
//! откатывается: память — источник истины до конца сессии.

use crate::{
    allocator::allocate_withdrawal,
    audit::{Correction, ReconciliationAuditor},
    config::LedgerConfig,
    error::{LedgerError, Result},
    interest::{checked_sum, overflow, InterestCalculator},
    model::{
        Investor, InvestorProfile, LedgerSummary, Lot, ProfitPayment, Transaction, TxFilter, TxKind,
        WithdrawalRecord,
    },
    traits::Store,
};
use chrono::{NaiveDate, Utc};
use log::{info, warn};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use uuid::Uuid;

pub const INVESTORS_KEY: &str = "investors";
pub const TRANSACTIONS_KEY: &str = "transactions";
pub const CONFIG_KEY: &str = "config";

/// Результат применённой операции и, возможно, ошибка сохранения.
#[derive(Debug)]
pub struct Applied<T> {
    pub value: T,
    pub persist_error: Option<LedgerError>,
}

impl<T> Applied<T> {
    pub fn is_persisted(&self) -> bool {
        self.persist_error.is_none()
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    /// Превращает ошибку сохранения в `Err` (для вызывающих, которым она важна).
    pub fn persisted(self) -> Result<T> {
        match self.persist_error {
            Some(e) => Err(e),
            None => Ok(self.value),
        }
    }
}

#[derive(Debug)]
pub struct Ledger<S: Store> {
    investors: Vec<Investor>,
    transactions: Vec<Transaction>,
    config: LedgerConfig,
    store: S,
}

impl<S: Store> Ledger<S> {
    /// Загружает коллекции из хранилища; отсутствующий ключ — пустая коллекция.
    pub fn open(store: S) -> Result<Self> {
        let investors: Vec<Investor> = load(&store, INVESTORS_KEY)?.unwrap_or_default();
        let transactions: Vec<Transaction> = load(&store, TRANSACTIONS_KEY)?.unwrap_or_default();
        let config: LedgerConfig = load(&store, CONFIG_KEY)?.unwrap_or_default();
        config.validate()?;
        info!(
            "ledger loaded: {} investor(s), {} transaction(s)",
            investors.len(),
            transactions.len()
        );
        Ok(Self { investors, transactions, config, store })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn calculator(&self) -> InterestCalculator {
        InterestCalculator::new(&self.config)
    }

    /* ------------------------------ READ ---------------------------------- */

    pub fn get_investor(&self, id: Uuid) -> Result<&Investor> {
        self.investors
            .iter()
            .find(|i| i.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("investor {id}")))
    }

    pub fn list_investors(&self) -> &[Investor] {
        &self.investors
    }

    /// По возрастанию (date, created_at).
    pub fn list_transactions(&self, filter: &TxFilter) -> Vec<&Transaction> {
        let mut out: Vec<&Transaction> =
            self.transactions.iter().filter(|t| filter.matches(t)).collect();
        out.sort_by_key(|t| (t.date, t.created_at));
        out
    }

    pub fn get_transaction(&self, id: Uuid) -> Result<&Transaction> {
        self.transactions
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))
    }

    /// Предпросмотр следующей выплаты: сумма по открытым лотам на дату.
    pub fn accrued_interest(&self, investor_id: Uuid, as_of: NaiveDate) -> Result<Decimal> {
        let inv = self.get_investor(investor_id)?;
        accrued_for(inv, &self.calculator(), as_of)
    }

    pub fn summary(&self, as_of: NaiveDate) -> Result<LedgerSummary> {
        let calc = self.calculator();
        let sum_kind = |kind: TxKind| {
            checked_sum(self.transactions.iter().filter(|t| t.kind == kind).map(|t| t.amount))
        };
        let pending = self
            .investors
            .iter()
            .map(|i| accrued_for(i, &calc, as_of))
            .collect::<Result<Vec<_>>>()?;
        let paid = self
            .investors
            .iter()
            .map(Investor::profit_paid)
            .collect::<Result<Vec<_>>>()?;
        Ok(LedgerSummary {
            as_of,
            investors: self.investors.len(),
            total_balance: checked_sum(self.investors.iter().map(|i| i.balance))?,
            pending_interest: checked_sum(pending)?,
            profit_paid: checked_sum(paid)?,
            total_deposited: sum_kind(TxKind::Deposit)?,
            total_withdrawn: sum_kind(TxKind::Withdrawal)?,
        })
    }

    /* ----------------------------- MUTATE --------------------------------- */

    pub fn create_investor(
        &mut self,
        profile: InvestorProfile,
        initial_amount: Decimal,
        initial_date: NaiveDate,
    ) -> Result<Applied<Investor>> {
        validate_profile(&profile)?;
        validate_amount(initial_amount)?;

        let investor = Investor {
            id: Uuid::new_v4(),
            profile,
            joined: initial_date,
            // баланс берётся из лота; запись транзакции его не трогает
            balance: initial_amount,
            investments: vec![Lot::new(initial_amount, initial_date)],
            withdrawn_investments: Vec::new(),
            profits: Vec::new(),
            withdrawals: Vec::new(),
        };
        let id = investor.id;
        self.investors.push(investor);
        self.record(
            TxKind::Deposit,
            id,
            initial_amount,
            initial_date,
            initial_amount,
            Some("initial deposit".into()),
        );

        let inv = self.get_investor(id)?.clone();
        info!("investor {} ({id}) created with {initial_amount}", inv.profile.name);
        Ok(self.commit(&[INVESTORS_KEY, TRANSACTIONS_KEY], inv))
    }

    pub fn deposit(
        &mut self,
        investor_id: Uuid,
        amount: Decimal,
        date: NaiveDate,
        note: Option<String>,
    ) -> Result<Applied<Transaction>> {
        validate_amount(amount)?;
        let inv = self.investor_mut(investor_id)?;
        let balance = inv
            .balance
            .checked_add(amount)
            .ok_or_else(|| overflow(format!("balance {} + {amount}", inv.balance)))?;

        inv.investments.push(Lot { note: note.clone(), ..Lot::new(amount, date) });
        inv.balance = balance;

        let tx = self.record(TxKind::Deposit, investor_id, amount, date, balance, note);
        info!("deposit {amount} for {investor_id}, balance {balance}");
        Ok(self.commit(&[INVESTORS_KEY, TRANSACTIONS_KEY], tx))
    }

    pub fn withdraw(
        &mut self,
        investor_id: Uuid,
        amount: Decimal,
        date: NaiveDate,
        note: Option<String>,
    ) -> Result<Applied<Transaction>> {
        validate_amount(amount)?;
        let calc = self.calculator();
        let inv = self.investor_mut(investor_id)?;
        if amount > inv.balance {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available: inv.balance,
            });
        }
        let balance = inv
            .balance
            .checked_sub(amount)
            .ok_or_else(|| overflow(format!("balance {} - {amount}", inv.balance)))?;

        // распределение считается на копии; ошибка здесь ничего не меняет
        let allocation = allocate_withdrawal(&inv.investments, amount, date, &calc)?;

        inv.investments = allocation.updated_lots;
        inv.withdrawn_investments.extend(allocation.closed_lots);
        inv.withdrawals.push(WithdrawalRecord { date, amount, note: note.clone() });
        inv.balance = balance;

        let tx = self.record(TxKind::Withdrawal, investor_id, amount, date, balance, note);
        info!("withdrawal {amount} for {investor_id}, balance {balance}");
        Ok(self.commit(&[INVESTORS_KEY, TRANSACTIONS_KEY], tx))
    }

    /// Выплата прибыли: баланс (принципал) не меняется.
    pub fn pay_profit(
        &mut self,
        investor_id: Uuid,
        as_of: NaiveDate,
    ) -> Result<Applied<Transaction>> {
        let calc = self.calculator();
        let inv = self.investor_mut(investor_id)?;
        if inv.investments.is_empty() {
            return Err(LedgerError::NotFound(format!(
                "no investments for investor {investor_id}"
            )));
        }

        // всё считается до первой записи, чтобы переполнение ничего не меняло
        let per_lot = inv
            .open_lots()
            .map(|l| calc.accrued_between(l.amount, l.start_date, as_of))
            .collect::<Result<Vec<_>>>()?;
        let amount = checked_sum(per_lot.iter().copied())?;

        for (lot, interest) in inv.investments.iter_mut().filter(|l| l.is_open()).zip(per_lot) {
            lot.last_computed_interest = interest;
        }
        inv.profits.push(ProfitPayment { date: as_of, amount, note: None });
        let balance = inv.balance;

        let tx = self.record(TxKind::ProfitPayment, investor_id, amount, as_of, balance, None);
        info!("profit {amount} paid to {investor_id}");
        Ok(self.commit(&[INVESTORS_KEY, TRANSACTIONS_KEY], tx))
    }

    pub fn update_investor_profile(
        &mut self,
        investor_id: Uuid,
        profile: InvestorProfile,
    ) -> Result<Applied<Investor>> {
        validate_profile(&profile)?;
        let inv = self.investor_mut(investor_id)?;
        inv.profile = profile;
        let inv = inv.clone();
        info!("profile updated for {investor_id}");
        Ok(self.commit(&[INVESTORS_KEY], inv))
    }

    /// Удаляет инвестора вместе со всеми его транзакциями. Необратимо.
    pub fn delete_investor(&mut self, investor_id: Uuid) -> Result<Applied<Investor>> {
        let pos = self
            .investors
            .iter()
            .position(|i| i.id == investor_id)
            .ok_or_else(|| LedgerError::NotFound(format!("investor {investor_id}")))?;
        let removed = self.investors.remove(pos);
        let before = self.transactions.len();
        self.transactions.retain(|t| t.investor_id != investor_id);
        info!(
            "investor {investor_id} deleted with {} transaction(s)",
            before - self.transactions.len()
        );
        Ok(self.commit(&[INVESTORS_KEY, TRANSACTIONS_KEY], removed))
    }

    /// Новая ставка применяется ко всем открытым лотам задним числом.
    pub fn set_config(&mut self, config: LedgerConfig) -> Result<Applied<LedgerConfig>> {
        config.validate()?;
        self.config = config.clone();
        info!(
            "config updated: rate {}, policy {}, cycle {} day(s)",
            config.interest_rate, config.accrual_policy, config.cycle_length_days
        );
        Ok(self.commit(&[CONFIG_KEY], config))
    }

    /// Сверка балансов; сохраняет только если что-то исправлено.
    pub fn audit(&mut self, tolerance: Decimal) -> Applied<Vec<Correction>> {
        let auditor = ReconciliationAuditor::new(tolerance);
        let corrections = auditor.audit(&mut self.investors, &mut self.transactions);
        if corrections.is_empty() {
            return Applied { value: corrections, persist_error: None };
        }
        self.commit(&[INVESTORS_KEY, TRANSACTIONS_KEY], corrections)
    }

    /* ----------------------------- HELPERS -------------------------------- */

    fn investor_mut(&mut self, id: Uuid) -> Result<&mut Investor> {
        self.investors
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("investor {id}")))
    }

    /// Единственное место, где создаются транзакции. Баланс здесь не меняется:
    /// `balance_after` — снимок, посчитанный вызывающей операцией.
    fn record(
        &mut self,
        kind: TxKind,
        investor_id: Uuid,
        amount: Decimal,
        date: NaiveDate,
        balance_after: Decimal,
        note: Option<String>,
    ) -> Transaction {
        let tx = Transaction {
            id: Uuid::new_v4(),
            date,
            created_at: Utc::now(),
            kind,
            investor_id,
            amount,
            balance_after,
            note,
        };
        self.transactions.push(tx.clone());
        tx
    }

    fn commit<T>(&mut self, keys: &[&str], value: T) -> Applied<T> {
        let persist_error = self.persist(keys).err();
        if let Some(e) = &persist_error {
            warn!("changes kept in memory but not saved: {e}");
        }
        Applied { value, persist_error }
    }

    fn persist(&mut self, keys: &[&str]) -> Result<()> {
        for &key in keys {
            let value = match key {
                INVESTORS_KEY => serde_json::to_value(&self.investors)?,
                TRANSACTIONS_KEY => serde_json::to_value(&self.transactions)?,
                CONFIG_KEY => serde_json::to_value(&self.config)?,
                other => {
                    return Err(LedgerError::Persistence(format!("unknown collection {other}")))
                }
            };
            self.store.set(key, &value)?;
        }
        Ok(())
    }
}

fn load<T: DeserializeOwned>(store: &impl Store, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(v) => Ok(Some(serde_json::from_value(v)?)),
        None => Ok(None),
    }
}

fn accrued_for(inv: &Investor, calc: &InterestCalculator, as_of: NaiveDate) -> Result<Decimal> {
    let per_lot = inv
        .open_lots()
        .map(|l| calc.accrued_between(l.amount, l.start_date, as_of))
        .collect::<Result<Vec<_>>>()?;
    checked_sum(per_lot)
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::Validation(format!("amount must be positive, got {amount}")));
    }
    Ok(())
}

fn validate_profile(profile: &InvestorProfile) -> Result<()> {
    if profile.name.trim().is_empty() {
        return Err(LedgerError::Validation("investor name is empty".into()));
    }
    Ok(())
}
