//! Хранилище в памяти: для тестов и встраивания.

use crate::{error::Result, traits::Store};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    data: HashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.data.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &Value) -> Result<()> {
        self.data.insert(key.to_string(), value.clone());
        Ok(())
    }
}
