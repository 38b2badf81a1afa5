use chrono::NaiveDate;
use fundlib::{
    ledger::INVESTORS_KEY,
    model::{InvestorProfile, TxFilter},
    storage::memory::MemoryStore,
    traits::Store,
    Ledger,
};
use rust_decimal::Decimal;
use serde_json::json;

fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, m, day).unwrap()
}

#[test]
fn corrupted_balance_is_repaired_once() {
    let mut l = Ledger::open(MemoryStore::new()).expect("open");
    let id = l
        .create_investor(InvestorProfile::named("Drift"), Decimal::new(5000, 0), d(1, 1))
        .expect("create")
        .into_inner()
        .id;
    l.deposit(id, Decimal::new(3000, 0), d(2, 1), None).expect("deposit");
    l.withdraw(id, Decimal::new(1000, 0), d(3, 1), None).expect("withdraw");

    // портим сохранённый баланс, как это делал бы чужой merge
    let mut store = l.into_store();
    let mut investors = store.get(INVESTORS_KEY).expect("get").expect("investors saved");
    investors[0]["balance"] = json!("9999");
    store.set(INVESTORS_KEY, &investors).expect("set");

    let mut l = Ledger::open(store).expect("reopen");
    assert_eq!(l.get_investor(id).expect("investor").balance, Decimal::new(9999, 0));

    let corrections = l.audit(Decimal::ONE).persisted().expect("audit");
    assert_eq!(corrections.len(), 1);
    let c = &corrections[0];
    assert_eq!(c.stored_balance, Decimal::new(9999, 0));
    assert_eq!(c.expected_balance, Decimal::new(7000, 0));
    assert_eq!(c.drift(), Decimal::new(2999, 0));

    assert_eq!(l.get_investor(id).expect("investor").balance, Decimal::new(7000, 0));
    let txs = l.list_transactions(&TxFilter::investor(id));
    let last = txs.last().expect("has transactions");
    assert_eq!(Some(last.id), c.patched_transaction);
    assert_eq!(last.balance_after, Decimal::new(7000, 0));
    // история не тронута
    assert_eq!(last.amount, Decimal::new(1000, 0));
    assert_eq!(txs[0].balance_after, Decimal::new(5000, 0));

    assert!(l.audit(Decimal::ONE).into_inner().is_empty());
}

#[test]
fn profit_payment_is_not_the_patched_principal_source() {
    let mut l = Ledger::open(MemoryStore::new()).expect("open");
    let id = l
        .create_investor(InvestorProfile::named("P"), Decimal::new(1000, 0), d(1, 1))
        .expect("create")
        .into_inner()
        .id;
    l.pay_profit(id, d(1, 30)).expect("pay");

    let mut store = l.into_store();
    let mut investors = store.get(INVESTORS_KEY).expect("get").expect("saved");
    investors[0]["balance"] = json!("1500");
    store.set(INVESTORS_KEY, &investors).expect("set");

    let mut l = Ledger::open(store).expect("reopen");
    let corrections = l.audit(Decimal::ONE).into_inner();
    assert_eq!(corrections.len(), 1);
    assert_eq!(corrections[0].expected_balance, Decimal::new(1000, 0));

    // последняя транзакция — выплата прибыли; её balance_after тоже выравнивается
    let txs = l.list_transactions(&TxFilter::investor(id));
    assert_eq!(txs.last().expect("tx").balance_after, Decimal::new(1000, 0));
    assert_eq!(txs.last().expect("tx").amount, Decimal::new(175, 0));
}

#[test]
fn audit_without_drift_does_not_write() {
    let mut l = Ledger::open(MemoryStore::new()).expect("open");
    assert!(l.audit(Decimal::ONE).into_inner().is_empty());
    assert!(l.store().is_empty());
}
