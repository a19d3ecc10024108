//! LogStore port - ローカルの永続ストア（SQLite または InMemory）
//!
//! LogStore は task key ごとに追記専用のログレコードを保持します。
//!
//! # 実装
//! - InMemoryLogStore（開発・テスト用）
//! - SqliteLogStore（本番用）

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{LogRecord, StoreError, TaskKey};

/// LogStore は task key -> LogRecord の永続ストア
///
/// # 設計原則
/// - chunks は追記のみ（既存 chunk の書き換えはしない）
/// - finished は false -> true にしか変化しない
/// - 失敗は StoreError で返す（吸収するのは app 層の仕事）
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn exists(&self, key: &TaskKey) -> Result<bool, StoreError>;

    async fn read(&self, key: &TaskKey) -> Result<Option<LogRecord>, StoreError>;

    /// Create the record with `[chunk]`, or append `chunk` to it.
    async fn append(&self, key: &TaskKey, chunk: Vec<u8>, finished: bool)
    -> Result<(), StoreError>;

    /// Raise the finished flag without new content. Missing record is a no-op.
    async fn set_finished(&self, key: &TaskKey) -> Result<(), StoreError>;

    async fn clear_all(&self) -> Result<(), StoreError>;
}

/// StoreOpener はプロセスで 1 回だけ LogStore を開く
///
/// 開いた結果（成功・失敗とも）は `DurableLogStore` がキャッシュします。
#[async_trait]
pub trait StoreOpener: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn LogStore>, StoreError>;
}
