//! App - アプリケーション層
//!
//! ports を組み合わせて、キャッシュ付きのタスクログ取得を実装します。
//!
//! # 主要コンポーネント
//! - **DurableLogStore**: ストアハンドルの遅延オープンと失敗の吸収
//! - **PositionTracker**: タスクごとの次の取得オフセット
//! - **CacheBuffer**: 未永続化テキストのバッファとフラッシュ
//! - **UnstableGuard**: 書き込みに失敗したタスクの記録
//! - **RemoteLogFetcher**: バス経由の直列取得
//! - **TaskLogService**: ローカル再生とリモート取得をつなぐセッション
//! - **TaskLogServiceBuilder**: 構築とワイヤリング

pub mod buffer;
pub mod builder;
pub mod durable;
pub mod fetcher;
pub mod position;
pub mod session;
pub mod unstable;

// 主要な型を再エクスポート
pub use self::buffer::{CacheBuffer, LocalView};
pub use self::builder::{BuildError, TaskLogServiceBuilder};
pub use self::durable::{DurableLogStore, WriteOutcome};
pub use self::fetcher::RemoteLogFetcher;
pub use self::position::PositionTracker;
pub use self::session::TaskLogService;
pub use self::unstable::UnstableGuard;
