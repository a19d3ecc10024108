//! CacheBuffer - 未永続化テキストの一時バッファ
//!
//! # フラッシュ条件
//! - 溜まったテキストの文字数が `limit` を超えた
//! - 空文字列が来た（「新しいデータなし、今すぐフラッシュ」の合図）
//! - 最後の chunk が来た
//!
//! `limit` は文字数で比較します（バイト数ではない）。
//!
//! # 設計原則
//! - task key ごとのスロットをロックしたまま「position 確認 -> 前進 -> 追記 -> フラッシュ」を行う
//! - 未永続化テキストはストアへの書き込みが返るまでスロットに残す
//! - ストアとスロットの読み出し（`local_view`）も同じロックの下で行う

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::durable::{DurableLogStore, WriteOutcome};
use super::position::PositionTracker;
use super::unstable::UnstableGuard;
use crate::domain::{LogRecord, TaskKey, text_len};

/// Durable record, unflushed tail and tracked position of one key, read together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalView {
    pub record: Option<LogRecord>,
    pub pending: Option<String>,
    /// Offset the remote fetch continues from.
    pub position: u64,
}

pub struct CacheBuffer {
    slots: Mutex<HashMap<TaskKey, Arc<Mutex<String>>>>,
    limit: usize,
    store: Arc<DurableLogStore>,
    guard: Arc<UnstableGuard>,
    positions: Arc<PositionTracker>,
}

impl CacheBuffer {
    pub fn new(
        limit: usize,
        store: Arc<DurableLogStore>,
        guard: Arc<UnstableGuard>,
        positions: Arc<PositionTracker>,
    ) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            limit,
            store,
            guard,
            positions,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    async fn slot(&self, key: &TaskKey) -> Arc<Mutex<String>> {
        Arc::clone(self.slots.lock().await.entry(key.clone()).or_default())
    }

    /// Buffer `text` for `key`, flushing to the durable store when due.
    pub async fn record(&self, key: &TaskKey, text: &str, is_last: bool) {
        let slot = self.slot(key).await;
        let mut pending = slot.lock().await;
        self.push(key, &mut pending, text, is_last).await;
    }

    /// Accept the chunk the producer sent for offset `pos`.
    ///
    /// The chunk is taken only when `pos` is the tracked position: the
    /// position advances and the text is buffered in one step. Returns
    /// `false` when another session already took this offset.
    pub async fn commit(&self, key: &TaskKey, pos: u64, text: &str, is_last: bool) -> bool {
        let slot = self.slot(key).await;
        let mut pending = slot.lock().await;

        let tracked = self.positions.get_or_init(key, None).await;
        if tracked != pos {
            tracing::debug!(tid = %key, pos, tracked, "offset already committed");
            return false;
        }
        self.positions.advance(key, text_len(text)).await;
        self.push(key, &mut pending, text, is_last).await;
        true
    }

    /// Read the durable record and the unflushed tail of `key` consistently.
    ///
    /// A flush in progress finishes before the view is taken. An untracked
    /// key starts at the record's length, or 0 without a record.
    pub async fn local_view(&self, key: &TaskKey) -> LocalView {
        let slot = self.slot(key).await;
        let pending = slot.lock().await;

        let record = if self.store.exists(key).await {
            self.store.read(key).await
        } else {
            None
        };
        let position = self
            .positions
            .get_or_init(key, record.as_ref().map(|r| r.total_length))
            .await;
        LocalView {
            record,
            pending: Some(pending.clone()).filter(|text| !text.is_empty()),
            position,
        }
    }

    /// Raise the finished flag of `key`'s record without new content.
    pub async fn mark_finished(&self, key: &TaskKey) {
        let slot = self.slot(key).await;
        let _pending = slot.lock().await;
        self.finish(key).await;
    }

    async fn push(&self, key: &TaskKey, pending: &mut String, text: &str, is_last: bool) {
        pending.push_str(text);

        let due = pending.chars().count() > self.limit || text.is_empty() || is_last;
        if !due {
            return;
        }
        if pending.is_empty() {
            if is_last {
                self.finish(key).await;
            }
            return;
        }
        self.persist(key, pending, is_last).await;
        pending.clear();
    }

    async fn finish(&self, key: &TaskKey) {
        if self.guard.is_unstable(key).await {
            tracing::debug!(tid = %key, "skipping finish mark for unstable task");
            return;
        }
        if self.store.set_finished(key).await == WriteOutcome::Failed {
            self.guard.mark_unstable(key).await;
        }
    }

    async fn persist(&self, key: &TaskKey, text: &str, is_last: bool) {
        if self.guard.is_unstable(key).await {
            tracing::debug!(tid = %key, "skipping flush for unstable task");
            return;
        }
        match self
            .store
            .append(key, text.as_bytes().to_vec(), is_last)
            .await
        {
            WriteOutcome::Written => {
                tracing::debug!(tid = %key, bytes = text.len(), finished = is_last, "flushed log chunk")
            }
            WriteOutcome::Skipped => {}
            WriteOutcome::Failed => self.guard.mark_unstable(key).await,
        }
    }
}
