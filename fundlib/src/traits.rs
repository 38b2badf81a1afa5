//! Порт хранения: ключ → JSON.

use crate::error::Result;
use serde_json::Value;

pub trait Store {
    /// `None`, если ключа ещё нет.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&mut self, key: &str, value: &Value) -> Result<()>;
}
