//! Ports - 抽象化レイヤー
//!
//! 外部システム（ローカル DB、メッセージバス）へのインターフェースです。
//! 実装は `impls` にあります。

pub mod log_store;
pub mod message_bus;

pub use self::log_store::{LogStore, StoreOpener};
pub use self::message_bus::{MessageBus, MessageFilter};
