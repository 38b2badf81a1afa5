//! fundlib — учёт капитала инвесторов фонда: лоты, FIFO-вывод, начисление
//! процентов и сверка балансов.

pub mod allocator;
pub mod audit;
pub mod config;
pub mod error;
pub mod interest;
pub mod ledger;
pub mod model;
pub mod traits;

pub mod storage {
    pub mod file;
    pub mod memory;
}

pub use ledger::{Applied, Ledger};
