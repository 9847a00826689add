use std::collections::HashMap;

use crate::error::ScolioResult;

/// Keyed string storage holding whole serialized collections.
pub trait BlobStore: Send {
    fn get_item(&self, key: &str) -> ScolioResult<Option<String>>;

    fn set_item(&mut self, key: &str, value: &str) -> ScolioResult<()>;
}

/// 内存存储，进程退出即丢失
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    items: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn get_item(&self, key: &str) -> ScolioResult<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> ScolioResult<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
