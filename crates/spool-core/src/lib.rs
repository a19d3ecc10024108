//! spool-core
//!
//! Incremental task-log retrieval with a local durable cache.
//!
//! タスクのログをメッセージバス経由で少しずつ取得し、ローカルストアに
//! キャッシュします。同じタスクを再度開いたときはキャッシュから再生し、
//! 続きだけをリモートから取得します。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（TaskKey, LogRecord, メッセージ, LogItem, errors）
//! - **ports**: 抽象化レイヤー（LogStore, StoreOpener, MessageBus）
//! - **impls**: 実装（SQLite ストア、開発用のインメモリ実装）
//! - **app**: アプリケーションロジック（TaskLogService とその部品）
//! - **config**: TOML 設定
//!
//! # 使用例
//! ```ignore
//! let config = SpoolConfig::load(Path::new("spool.toml"))?;
//! let service = TaskLogServiceBuilder::from_config(bus, &config).build()?;
//! let mut log = service.stream_task_log("u1", "t1");
//! while let Some(item) = log.next().await {
//!     // LogItem::Chunk / LocalExhausted / Finished
//! }
//! ```

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use self::app::{BuildError, TaskLogService, TaskLogServiceBuilder};
pub use self::config::SpoolConfig;
pub use self::domain::{LogItem, TaskKey};
