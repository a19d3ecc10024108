//! InMemoryLogStore - 開発・テスト用のログストア
//!
//! # 学習ポイント
//! - tokio::sync::Mutex による排他制御
//! - 書き込み失敗の注入（unstable guard の検証用）

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{LogRecord, StoreError, TaskKey};
use crate::ports::LogStore;

#[derive(Default)]
struct InMemoryStoreState {
    records: HashMap<String, LogRecord>,
    /// tid ごとの書き込み拒否（テスト用の失敗注入）
    rejected: HashSet<String>,
}

/// InMemoryLogStore はプロセス内のログストア
///
/// # 使用例
/// ```ignore
/// let store = InMemoryLogStore::new();
/// store.append(&key, b"line1\n".to_vec(), false).await?;
/// let record = store.read(&key).await?;
/// ```
#[derive(Default)]
pub struct InMemoryLogStore {
    state: Mutex<InMemoryStoreState>,
    reads: AtomicUsize,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later write for `key` fail.
    pub async fn reject_writes(&self, key: &TaskKey) {
        self.state.lock().await.rejected.insert(key.tid());
    }

    pub async fn accept_writes(&self, key: &TaskKey) {
        self.state.lock().await.rejected.remove(&key.tid());
    }

    /// Number of successful `read` calls that returned a record.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn exists(&self, key: &TaskKey) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.records.contains_key(&key.tid()))
    }

    async fn read(&self, key: &TaskKey) -> Result<Option<LogRecord>, StoreError> {
        let record = self.state.lock().await.records.get(&key.tid()).cloned();
        if record.is_some() {
            self.reads.fetch_add(1, Ordering::Relaxed);
        }
        Ok(record)
    }

    async fn append(
        &self,
        key: &TaskKey,
        chunk: Vec<u8>,
        finished: bool,
    ) -> Result<(), StoreError> {
        let tid = key.tid();
        let mut state = self.state.lock().await;
        if state.rejected.contains(&tid) {
            return Err(StoreError::WriteRejected(tid));
        }
        match state.records.get_mut(&tid) {
            Some(record) => record.append(chunk, finished),
            None => {
                let record = LogRecord::first(tid.clone(), chunk, finished);
                state.records.insert(tid, record);
            }
        }
        Ok(())
    }

    async fn set_finished(&self, key: &TaskKey) -> Result<(), StoreError> {
        let tid = key.tid();
        let mut state = self.state.lock().await;
        if state.rejected.contains(&tid) {
            return Err(StoreError::WriteRejected(tid));
        }
        if let Some(record) = state.records.get_mut(&tid) {
            record.mark_finished();
        }
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        self.state.lock().await.records.clear();
        Ok(())
    }
}
