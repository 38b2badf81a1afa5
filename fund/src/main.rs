use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use fundlib::{
    config::{AccrualPolicy, LedgerConfig},
    error::Result,
    model::{Investor, InvestorProfile, ProfilePatch, Transaction, TxFilter, TxKind},
    storage::file::FileStore,
    Applied, Ledger,
};
use log::warn;
use rust_decimal::Decimal;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Policy {
    Daily,
    FlatCycle,
}

impl From<Policy> for AccrualPolicy {
    fn from(p: Policy) -> Self {
        match p {
            Policy::Daily => AccrualPolicy::Daily,
            Policy::FlatCycle => AccrualPolicy::FlatCycle,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Kind {
    Deposit,
    Withdrawal,
    Profit,
}

impl From<Kind> for TxKind {
    fn from(k: Kind) -> Self {
        match k {
            Kind::Deposit => TxKind::Deposit,
            Kind::Withdrawal => TxKind::Withdrawal,
            Kind::Profit => TxKind::ProfitPayment,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "fund", version, about = "Учёт вкладов инвесторов фонда")]
struct Cli {
    /// Каталог с данными журнала
    #[arg(short = 'd', long = "data-dir", env = "FUND_DATA_DIR", default_value = "fund-data")]
    data_dir: PathBuf,

    /// Подробный лог (иначе берётся RUST_LOG)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Новый инвестор с первым вкладом
    AddInvestor {
        #[arg(long)]
        name: String,
        #[arg(long)]
        amount: Decimal,
        /// Дата вклада (по умолчанию сегодня)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    Deposit {
        id: Uuid,
        amount: Decimal,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        note: Option<String>,
    },
    Withdraw {
        id: Uuid,
        amount: Decimal,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Выплатить начисленную прибыль
    PayProfit {
        id: Uuid,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Предпросмотр начисленных процентов
    Interest {
        id: Uuid,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Show {
        id: Uuid,
    },
    /// Одна транзакция по id
    ShowTx {
        id: Uuid,
    },
    List,
    Transactions {
        #[arg(long)]
        investor: Option<Uuid>,
        #[arg(long, value_enum)]
        kind: Option<Kind>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Пустое значение (`--email ""`) очищает поле
    UpdateProfile {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Удалить инвестора и все его транзакции
    Delete {
        id: Uuid,
        /// Без этого флага ничего не удаляется
        #[arg(long)]
        yes: bool,
    },
    /// Сверка балансов с журналом
    Audit {
        #[arg(long, default_value = "1")]
        tolerance: Decimal,
    },
    /// Показать или изменить настройки
    Config {
        #[arg(long)]
        rate: Option<Decimal>,
        #[arg(long, value_enum)]
        policy: Option<Policy>,
        #[arg(long)]
        cycle_days: Option<u32>,
        #[arg(long)]
        currency: Option<String>,
    },
    Summary {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut ledger = Ledger::open(FileStore::open(&cli.data_dir)?)?;
    let today = Local::now().date_naive();
    let ccy = ledger.config().currency.clone();

    match cli.command {
        Command::AddInvestor { name, amount, date, phone, email, address } => {
            let profile = InvestorProfile { name, phone, email, address, notes: None };
            let inv = report(ledger.create_investor(profile, amount, date.unwrap_or(today))?);
            println!("{}", inv.id);
        }
        Command::Deposit { id, amount, date, note } => {
            let tx = report(ledger.deposit(id, amount, date.unwrap_or(today), note)?);
            print_tx(&tx, &ccy);
        }
        Command::Withdraw { id, amount, date, note } => {
            let tx = report(ledger.withdraw(id, amount, date.unwrap_or(today), note)?);
            print_tx(&tx, &ccy);
        }
        Command::PayProfit { id, date } => {
            let tx = report(ledger.pay_profit(id, date.unwrap_or(today))?);
            print_tx(&tx, &ccy);
        }
        Command::Interest { id, date } => {
            let amount = ledger.accrued_interest(id, date.unwrap_or(today))?;
            println!("{} {ccy}", amount.round_dp(2));
        }
        Command::Show { id } => print_investor(ledger.get_investor(id)?, &ccy)?,
        Command::ShowTx { id } => print_tx(ledger.get_transaction(id)?, &ccy),
        Command::List => {
            for inv in ledger.list_investors() {
                let balance = inv.balance.round_dp(2);
                println!("{}  {:<24} {:>14} {ccy}", inv.id, inv.profile.name, balance);
            }
        }
        Command::Transactions { investor, kind, from, to } => {
            let filter = TxFilter { investor_id: investor, kind: kind.map(TxKind::from), from, to };
            for tx in ledger.list_transactions(&filter) {
                print_tx(tx, &ccy);
            }
        }
        Command::UpdateProfile { id, name, phone, email, address, notes } => {
            let patch = ProfilePatch { name, phone, email, address, notes };
            let profile = ledger.get_investor(id)?.profile.clone().patched(patch);
            let inv = report(ledger.update_investor_profile(id, profile)?);
            print_investor(&inv, &ccy)?;
        }
        Command::Delete { id, yes } => {
            if !yes {
                let inv = ledger.get_investor(id)?;
                eprintln!("refusing to delete {} without --yes", inv.profile.name);
                return Ok(());
            }
            let inv = report(ledger.delete_investor(id)?);
            println!("deleted {} ({})", inv.profile.name, inv.id);
        }
        Command::Audit { tolerance } => {
            let corrections = report(ledger.audit(tolerance));
            if corrections.is_empty() {
                println!("no drift");
            }
            for c in corrections {
                println!(
                    "{} {}: {} -> {} {ccy}",
                    c.investor_id, c.investor_name, c.stored_balance, c.expected_balance
                );
            }
        }
        Command::Config { rate, policy, cycle_days, currency } => {
            let current = ledger.config().clone();
            let next = LedgerConfig {
                interest_rate: rate.unwrap_or(current.interest_rate),
                accrual_policy: policy.map(AccrualPolicy::from).unwrap_or(current.accrual_policy),
                cycle_length_days: cycle_days.unwrap_or(current.cycle_length_days),
                currency: currency.unwrap_or(current.currency),
            };
            let cfg = if next != *ledger.config() {
                report(ledger.set_config(next)?)
            } else {
                next
            };
            println!(
                "rate {}  policy {}  cycle {} days  currency {}",
                cfg.interest_rate, cfg.accrual_policy, cfg.cycle_length_days, cfg.currency
            );
        }
        Command::Summary { date } => {
            let s = ledger.summary(date.unwrap_or(today))?;
            println!("as of            {}", s.as_of);
            println!("investors        {}", s.investors);
            println!("capital          {} {ccy}", s.total_balance.round_dp(2));
            println!("pending interest {} {ccy}", s.pending_interest.round_dp(2));
            println!("profit paid      {} {ccy}", s.profit_paid.round_dp(2));
            println!("deposited        {} {ccy}", s.total_deposited.round_dp(2));
            println!("withdrawn        {} {ccy}", s.total_withdrawn.round_dp(2));
        }
    }

    Ok(())
}

/// Ошибка сохранения не отменяет операцию — только предупреждение.
fn report<T>(applied: Applied<T>) -> T {
    if let Some(e) = &applied.persist_error {
        warn!("not saved: {e}");
        eprintln!("warning: change applied but not saved: {e}");
    }
    applied.into_inner()
}

fn print_tx(tx: &Transaction, ccy: &str) {
    println!(
        "{}  {:<10} {:>14} {ccy}  balance {:>14}  {}  {}",
        tx.date,
        tx.kind,
        tx.amount.round_dp(2),
        tx.balance_after.round_dp(2),
        tx.investor_id,
        tx.note.as_deref().unwrap_or("")
    );
}

fn print_investor(inv: &Investor, ccy: &str) -> Result<()> {
    println!("{}  {}", inv.id, inv.profile.name);
    for (label, v) in [
        ("phone", &inv.profile.phone),
        ("email", &inv.profile.email),
        ("address", &inv.profile.address),
        ("notes", &inv.profile.notes),
    ] {
        if let Some(v) = v {
            println!("  {label:<8} {v}");
        }
    }
    println!("  joined   {}", inv.joined);
    println!("  balance  {} {ccy}", inv.balance.round_dp(2));
    println!("  lots:");
    for lot in &inv.investments {
        println!("    {}  {:>14}", lot.start_date, lot.amount.round_dp(2));
    }
    if !inv.withdrawn_investments.is_empty() {
        println!("  closed:");
        for c in &inv.withdrawn_investments {
            println!("    {} .. {}  {:>14}", c.start_date, c.end_date, c.amount.round_dp(2));
        }
    }
    println!("  profit paid {} {ccy}", inv.profit_paid()?.round_dp(2));
    Ok(())
}
