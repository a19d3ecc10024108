//! TaskLogServiceBuilder - サービスの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 設定ファイルからのワイヤリング

use std::sync::Arc;

use super::durable::DurableLogStore;
use super::session::TaskLogService;
use crate::config::{DEFAULT_CACHE_LIMIT, SpoolConfig, StoreBackend};
use crate::impls::{InMemoryLogStore, SqliteOpener};
use crate::ports::{LogStore, MessageBus, StoreOpener};

/// BuildError はサービス構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("cache_limit must be greater than zero")]
    ZeroCacheLimit,
}

enum StoreSource {
    RemoteOnly,
    Ready(Arc<dyn LogStore>),
    Lazy(Arc<dyn StoreOpener>),
}

/// TaskLogServiceBuilder は TaskLogService を構築
///
/// # 使用例
/// ```ignore
/// let service = TaskLogServiceBuilder::new(bus)
///     .cache_limit(1024)
///     .opener(Arc::new(SqliteOpener::new("spool.sqlite3")))
///     .build()?;
/// ```
///
/// ストアを指定しない場合はリモートのみで動作します。
pub struct TaskLogServiceBuilder {
    bus: Arc<dyn MessageBus>,
    cache_limit: usize,
    store: StoreSource,
}

impl TaskLogServiceBuilder {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self {
            bus,
            cache_limit: DEFAULT_CACHE_LIMIT,
            store: StoreSource::RemoteOnly,
        }
    }

    /// Wire store backend and flush threshold from `config`.
    pub fn from_config(bus: Arc<dyn MessageBus>, config: &SpoolConfig) -> Self {
        let builder = Self::new(bus).cache_limit(config.cache_limit);
        match config.store.backend {
            StoreBackend::Sqlite => {
                builder.opener(Arc::new(SqliteOpener::new(config.store.path.clone())))
            }
            StoreBackend::Memory => builder.store(Arc::new(InMemoryLogStore::new())),
        }
    }

    pub fn cache_limit(mut self, cache_limit: usize) -> Self {
        self.cache_limit = cache_limit;
        self
    }

    /// Use an already opened store.
    pub fn store(mut self, store: Arc<dyn LogStore>) -> Self {
        self.store = StoreSource::Ready(store);
        self
    }

    /// Open the store lazily, on first use.
    pub fn opener(mut self, opener: Arc<dyn StoreOpener>) -> Self {
        self.store = StoreSource::Lazy(opener);
        self
    }

    pub fn build(self) -> Result<TaskLogService, BuildError> {
        if self.cache_limit == 0 {
            return Err(BuildError::ZeroCacheLimit);
        }
        let store = match self.store {
            StoreSource::RemoteOnly => DurableLogStore::unavailable(),
            StoreSource::Ready(store) => DurableLogStore::with_store(store),
            StoreSource::Lazy(opener) => DurableLogStore::new(opener),
        };
        Ok(TaskLogService::new(
            self.bus,
            Arc::new(store),
            self.cache_limit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LogItem, TaskKey};
    use crate::impls::{InMemoryBus, InMemoryLogProducer};
    use futures::StreamExt;
    use std::time::Duration;

    fn bus_with_producer(max_chunk: usize) -> (Arc<InMemoryBus>, Arc<InMemoryLogProducer>) {
        let bus = Arc::new(InMemoryBus::new());
        let producer = Arc::new(InMemoryLogProducer::new(max_chunk));
        producer.clone().attach(&bus);
        (bus, producer)
    }

    async fn collect(service: &TaskLogService, owner: &str, task: &str) -> Vec<LogItem> {
        tokio::time::timeout(
            Duration::from_secs(2),
            service.stream_task_log(owner, task).collect(),
        )
        .await
        .unwrap()
    }

    #[test]
    fn zero_cache_limit_fails_fast() {
        let result = TaskLogServiceBuilder::new(Arc::new(InMemoryBus::new()))
            .cache_limit(0)
            .build();
        assert!(matches!(result, Err(BuildError::ZeroCacheLimit)));
    }

    #[test]
    fn from_config_applies_cache_limit() {
        let config = SpoolConfig::from_toml_str("cache_limit = 7\n[store]\nbackend = \"memory\"")
            .unwrap();
        let service = TaskLogServiceBuilder::from_config(Arc::new(InMemoryBus::new()), &config)
            .build()
            .unwrap();
        assert_eq!(service.cache_limit(), 7);
    }

    #[tokio::test]
    async fn without_store_runs_remote_only() {
        let (bus, producer) = bus_with_producer(64);
        let service = TaskLogServiceBuilder::new(bus).build().unwrap();
        let key = TaskKey::new("u1", "t1");
        producer.append(&key, "x").await;
        producer.finish(&key).await;

        assert_eq!(
            collect(&service, "u1", "t1").await,
            vec![LogItem::Chunk("x".to_string())]
        );
        assert!(!service.clear_persistent_data().await);
    }

    #[tokio::test]
    async fn sqlite_cache_survives_new_service() {
        let dir = tempfile::tempdir().unwrap();
        let config = SpoolConfig {
            cache_limit: 4,
            store: crate::config::StoreConfig {
                backend: StoreBackend::Sqlite,
                path: dir.path().join("cache").join("spool.sqlite3"),
            },
        };
        let key = TaskKey::new("u1", "t1");

        let (bus, producer) = bus_with_producer(3);
        producer.append(&key, "line1\nline2\n").await;
        producer.finish(&key).await;
        let first = TaskLogServiceBuilder::from_config(bus.clone(), &config)
            .build()
            .unwrap();
        let items = collect(&first, "u1", "t1").await;
        let text: String = items.iter().filter_map(|i| i.as_chunk()).collect();
        assert_eq!(text, "line1\nline2\n");
        drop(first);

        // fresh process: the producer no longer knows the task
        let (bus, _producer) = bus_with_producer(3);
        let second = TaskLogServiceBuilder::from_config(bus.clone(), &config)
            .build()
            .unwrap();
        let items = collect(&second, "u1", "t1").await;

        assert_eq!(items.last(), Some(&LogItem::Finished));
        let text: String = items.iter().filter_map(|i| i.as_chunk()).collect();
        assert_eq!(text, "line1\nline2\n");
        assert!(bus.sent().await.is_empty());
        assert_eq!(second.position("u1", "t1").await, Some(12));
    }

    #[tokio::test]
    async fn sqlite_partial_cache_resumes_remotely() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spool.sqlite3");
        let key = TaskKey::new("u1", "t1");

        let (bus, producer) = bus_with_producer(4);
        producer.append(&key, "abcdefgh").await;
        let first = TaskLogServiceBuilder::new(bus)
            .cache_limit(2)
            .opener(Arc::new(SqliteOpener::new(&path)))
            .build()
            .unwrap();
        let mut stream = first.stream_task_log("u1", "t1");
        assert_eq!(stream.next().await, Some(LogItem::Chunk("abcd".to_string())));
        assert_eq!(stream.next().await, Some(LogItem::Chunk("efgh".to_string())));
        drop(stream);
        drop(first);

        let (bus, producer) = bus_with_producer(4);
        producer.append(&key, "abcdefghij").await;
        producer.finish(&key).await;
        let second = TaskLogServiceBuilder::new(bus.clone())
            .cache_limit(2)
            .opener(Arc::new(SqliteOpener::new(&path)))
            .build()
            .unwrap();
        let items = collect(&second, "u1", "t1").await;

        assert_eq!(
            items,
            vec![
                LogItem::Chunk("abcd".to_string()),
                LogItem::Chunk("efgh".to_string()),
                LogItem::LocalExhausted,
                LogItem::Chunk("ij".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn unopenable_sqlite_path_degrades_to_remote_only() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be opened as a database file
        let (bus, producer) = bus_with_producer(64);
        let service = TaskLogServiceBuilder::new(bus)
            .opener(Arc::new(SqliteOpener::new(dir.path())))
            .build()
            .unwrap();
        let key = TaskKey::new("u1", "t1");
        producer.append(&key, "still here").await;
        producer.finish(&key).await;

        assert_eq!(
            collect(&service, "u1", "t1").await,
            vec![LogItem::Chunk("still here".to_string())]
        );
        assert!(!service.is_unstable("u1", "t1").await);
    }
}
