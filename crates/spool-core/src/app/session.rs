//! TaskLogService - タスクログ取得の公開エントリポイント
//!
//! # 状態遷移（1 セッション）
//! `Init -> CheckLocal -> {ReplayLocal -> (Complete | FallthroughRemote)} -> FetchRemote -> Complete`
//!
//! # 出力順序
//! 1. ローカルに永続化済みの chunk（保存順）
//! 2. 取得済みだが未フラッシュのテキスト（あれば）
//! 3. リモートから取得した chunk（producer の順）
//!
//! セッションは再開しません。新しい呼び出しは新しいセッションですが、
//! position は共有されているので 0 からではなく続きから取得します。

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;

use super::buffer::CacheBuffer;
use super::durable::DurableLogStore;
use super::fetcher::RemoteLogFetcher;
use super::position::PositionTracker;
use super::unstable::UnstableGuard;
use crate::domain::{LogItem, SessionId, TaskKey};
use crate::ports::MessageBus;

/// Incremental, cache-backed access to task logs.
///
/// Cheap to clone; all clones share the same store handle and per-key state.
#[derive(Clone)]
pub struct TaskLogService {
    store: Arc<DurableLogStore>,
    positions: Arc<PositionTracker>,
    buffer: Arc<CacheBuffer>,
    guard: Arc<UnstableGuard>,
    fetcher: RemoteLogFetcher,
}

impl TaskLogService {
    pub fn new(bus: Arc<dyn MessageBus>, store: Arc<DurableLogStore>, cache_limit: usize) -> Self {
        let positions = Arc::new(PositionTracker::new());
        let guard = Arc::new(UnstableGuard::new());
        let buffer = Arc::new(CacheBuffer::new(
            cache_limit,
            Arc::clone(&store),
            Arc::clone(&guard),
            Arc::clone(&positions),
        ));
        let fetcher = RemoteLogFetcher::new(bus, Arc::clone(&buffer));
        Self {
            store,
            positions,
            buffer,
            guard,
            fetcher,
        }
    }

    /// Ordered log of one task: local replay first, then remote chunks.
    ///
    /// Ends with `LogItem::Finished` when the local record is complete, or
    /// after the producer's last chunk. Stays open while the producer has not
    /// answered. Dropping the stream cancels the session without losing a
    /// chunk that was already received.
    ///
    /// Several sessions for the same task may run at once: each one yields
    /// the whole log, and every offset is cached once.
    pub fn stream_task_log(&self, owner_id: &str, task_id: &str) -> BoxStream<'static, LogItem> {
        let key = TaskKey::new(owner_id, task_id);
        let session = SessionId::generate();
        let this = self.clone();

        async_stream::stream! {
            tracing::debug!(%session, tid = %key, "task log session started");

            let local = this.buffer.local_view(&key).await;

            match local.record {
                Some(record) => {
                    tracing::debug!(
                        %session,
                        tid = %key,
                        chunks = record.chunks.len(),
                        finished = record.finished,
                        "replaying local log"
                    );
                    for text in record.texts() {
                        yield LogItem::Chunk(text);
                    }
                    if record.finished {
                        yield LogItem::Finished;
                        return;
                    }
                    if let Some(tail) = local.pending {
                        yield LogItem::Chunk(tail);
                    }
                    yield LogItem::LocalExhausted;
                }
                None => {
                    if let Some(tail) = local.pending {
                        yield LogItem::Chunk(tail);
                    }
                }
            }

            let mut remote = this.fetcher.fetch(key.clone(), local.position);
            while let Some(text) = remote.next().await {
                yield LogItem::Chunk(text);
            }
            tracing::debug!(%session, tid = %key, "task log session closed");
        }
        .boxed()
    }

    /// Flag `owner_id`/`task_id`'s record finished without new content.
    pub async fn mark_finished(&self, owner_id: &str, task_id: &str) {
        self.buffer
            .mark_finished(&TaskKey::new(owner_id, task_id))
            .await;
    }

    /// Drop every cached record. Returns whether the store was cleared.
    pub async fn clear_persistent_data(&self) -> bool {
        self.store.clear_all().await
    }

    pub async fn position(&self, owner_id: &str, task_id: &str) -> Option<u64> {
        self.positions.get(&TaskKey::new(owner_id, task_id)).await
    }

    pub async fn is_unstable(&self, owner_id: &str, task_id: &str) -> bool {
        self.guard.is_unstable(&TaskKey::new(owner_id, task_id)).await
    }

    pub fn cache_limit(&self) -> usize {
        self.buffer.limit()
    }
}
