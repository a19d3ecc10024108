//! DurableLogStore - LogStore のプロセス共有ハンドル
//!
//! # 設計原則
//! - 初回利用時に 1 回だけ open し、結果をプロセス全体でキャッシュ
//! - open 失敗も「利用不可」としてキャッシュ（再試行しない）
//! - 利用不可・読み込み失敗は「ローカルデータなし」として扱う
//! - エラーはここで吸収し、ログに残すだけ

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::domain::{LogRecord, TaskKey};
use crate::ports::{LogStore, StoreOpener};

/// Result of a write through the durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Store unavailable; nothing was attempted.
    Skipped,
    Failed,
}

pub struct DurableLogStore {
    opener: Option<Arc<dyn StoreOpener>>,
    handle: OnceCell<Option<Arc<dyn LogStore>>>,
}

impl DurableLogStore {
    /// Open lazily through `opener` on first use.
    pub fn new(opener: Arc<dyn StoreOpener>) -> Self {
        Self {
            opener: Some(opener),
            handle: OnceCell::new(),
        }
    }

    /// Use an already opened store.
    pub fn with_store(store: Arc<dyn LogStore>) -> Self {
        Self {
            opener: None,
            handle: OnceCell::new_with(Some(Some(store))),
        }
    }

    /// Remote-only mode from the start.
    pub fn unavailable() -> Self {
        Self {
            opener: None,
            handle: OnceCell::new_with(Some(None)),
        }
    }

    async fn handle(&self) -> Option<&Arc<dyn LogStore>> {
        self.handle
            .get_or_init(|| async {
                let Some(opener) = self.opener.as_ref() else {
                    return None;
                };
                match opener.open().await {
                    Ok(store) => {
                        tracing::info!("log store opened");
                        Some(store)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "log store unavailable, falling back to remote only");
                        None
                    }
                }
            })
            .await
            .as_ref()
    }

    pub async fn exists(&self, key: &TaskKey) -> bool {
        let Some(store) = self.handle().await else {
            return false;
        };
        match store.exists(key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(tid = %key, error = %e, "existence check failed");
                false
            }
        }
    }

    pub async fn read(&self, key: &TaskKey) -> Option<LogRecord> {
        let store = self.handle().await?;
        match store.read(key).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(tid = %key, error = %e, "failed to read log record");
                None
            }
        }
    }

    pub async fn append(&self, key: &TaskKey, chunk: Vec<u8>, finished: bool) -> WriteOutcome {
        let Some(store) = self.handle().await else {
            return WriteOutcome::Skipped;
        };
        match store.append(key, chunk, finished).await {
            Ok(()) => WriteOutcome::Written,
            Err(e) => {
                tracing::warn!(tid = %key, error = %e, "failed to append log chunk");
                WriteOutcome::Failed
            }
        }
    }

    pub async fn set_finished(&self, key: &TaskKey) -> WriteOutcome {
        let Some(store) = self.handle().await else {
            return WriteOutcome::Skipped;
        };
        match store.set_finished(key).await {
            Ok(()) => WriteOutcome::Written,
            Err(e) => {
                tracing::warn!(tid = %key, error = %e, "failed to mark log finished");
                WriteOutcome::Failed
            }
        }
    }

    pub async fn clear_all(&self) -> bool {
        let Some(store) = self.handle().await else {
            return false;
        };
        match store.clear_all().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "failed to clear log store");
                false
            }
        }
    }
}
