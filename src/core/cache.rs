use crate::domain::model::{IntegrationRecord, Provider};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupMode {
    ExactKey,
    Classifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub provider: Provider,
    pub mode: LookupMode,
    pub key: String,
}

/// 單次批次執行內的平台資料快取。
///
/// 由呼叫端建立並傳入解析器，執行結束即丟棄。查無資料（`None`）
/// 也會被記住，傳輸錯誤則不會。
#[derive(Debug, Default)]
pub struct RecordCache {
    entries: HashMap<CacheKey, Option<IntegrationRecord>>,
    hits: usize,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<Option<IntegrationRecord>> {
        let cached = self.entries.get(key).cloned();
        if cached.is_some() {
            self.hits += 1;
        }
        cached
    }

    pub fn insert(&mut self, key: CacheKey, record: Option<IntegrationRecord>) {
        self.entries.insert(key, record);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}
