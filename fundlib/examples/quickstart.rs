use chrono::NaiveDate;
use fundlib::{model::InvestorProfile, storage::memory::MemoryStore, Ledger};
use rust_decimal::Decimal;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Пример: вклад, довклад, вывод и выплата прибыли в памяти
    let d = |m, day| NaiveDate::from_ymd_opt(2025, m, day).ok_or("bad date");

    let mut ledger = Ledger::open(MemoryStore::new())?;
    let id = ledger
        .create_investor(InvestorProfile::named("Alice"), Decimal::new(1000, 0), d(1, 1)?)?
        .into_inner()
        .id;
    ledger.deposit(id, Decimal::new(500, 0), d(1, 6)?, None)?;
    ledger.withdraw(id, Decimal::new(1200, 0), d(1, 11)?, None)?;
    let profit = ledger.pay_profit(id, d(1, 31)?)?.into_inner();

    let inv = ledger.get_investor(id)?;
    println!("balance {}, profit paid {}", inv.balance, profit.amount.round_dp(2));
    for c in &inv.withdrawn_investments {
        println!("closed {} from {} to {}", c.amount, c.start_date, c.end_date);
    }
    Ok(())
}
