//! FIFO-распределение вывода по лотам инвестора.

use crate::{
    error::{LedgerError, Result},
    interest::{checked_sum, InterestCalculator},
    model::{ClosedLot, Lot},
};
use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    /// Лоты в исходном порядке; полностью выведенные остаются на месте с нулём.
    pub updated_lots: Vec<Lot>,
    pub closed_lots: Vec<ClosedLot>,
}

impl Allocation {
    pub fn closed_total(&self) -> Decimal {
        self.closed_lots.iter().map(|c| c.amount).sum()
    }
}

/// Списывает `amount` со старейших лотов (по `start_date`).
///
/// Работает на копии: при ошибке входные лоты не тронуты. Если открытых
/// лотов не хватает, возвращает `InsufficientBalance`, а не частичное
/// распределение.
pub fn allocate_withdrawal(
    lots: &[Lot],
    amount: Decimal,
    date: NaiveDate,
    calc: &InterestCalculator,
) -> Result<Allocation> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "withdrawal amount must be positive, got {amount}"
        )));
    }

    let available = checked_sum(lots.iter().filter(|l| l.is_open()).map(|l| l.amount))?;
    if amount > available {
        return Err(LedgerError::InsufficientBalance { requested: amount, available });
    }

    let mut updated = lots.to_vec();
    let mut order: Vec<usize> = (0..updated.len()).collect();
    // sort_by_key стабилен: при равных датах сохраняется порядок вкладов
    order.sort_by_key(|&i| updated[i].start_date);

    let mut closed = Vec::new();
    let mut remaining = amount;

    for i in order {
        if remaining.is_zero() {
            break;
        }
        let lot = &mut updated[i];
        if !lot.is_open() {
            continue;
        }

        if lot.amount >= remaining {
            closed.push(ClosedLot::cut(remaining, lot.start_date, date));
            lot.amount -= remaining;
            lot.last_computed_interest = calc.accrued_between(lot.amount, lot.start_date, date)?;
            debug!("lot {i}: took {remaining}, {} left", lot.amount);
            remaining = Decimal::ZERO;
        } else {
            closed.push(ClosedLot::cut(lot.amount, lot.start_date, date));
            debug!("lot {i}: closed fully ({})", lot.amount);
            remaining -= lot.amount;
            lot.amount = Decimal::ZERO;
            lot.last_computed_interest = Decimal::ZERO;
        }
    }

    Ok(Allocation { updated_lots: updated, closed_lots: closed })
}
