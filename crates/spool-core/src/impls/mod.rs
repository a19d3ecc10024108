//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryLogStore**: 開発・テスト用のログストア
//! - **SqliteLogStore / SqliteOpener**: 本番用のローカルログストア
//! - **InMemoryBus**: 開発・テスト用のメッセージバス
//! - **InMemoryLogProducer**: ジョブマスターのログ応答の模擬

pub mod inmem_bus;
pub mod inmem_producer;
pub mod inmem_store;
pub mod sqlite_store;

// 主要な型を再エクスポート
pub use self::inmem_bus::InMemoryBus;
pub use self::inmem_producer::InMemoryLogProducer;
pub use self::inmem_store::InMemoryLogStore;
pub use self::sqlite_store::{SqliteLogStore, SqliteOpener};
