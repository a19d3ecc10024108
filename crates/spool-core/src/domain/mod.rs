//! Domain model (keys, records, wire messages, errors).
//!
//! - key: TaskKey, SessionId
//! - record: LogRecord（永続化されるログの形）
//! - message: bus 上の送受信メッセージ（query / job.msg.*）
//! - item: セッションが返す LogItem
//! - errors: ports が返すエラー型

pub mod errors;
pub mod item;
pub mod key;
pub mod message;
pub mod record;

pub use self::errors::{BusError, ConfigError, DecodeError, StoreError};
pub use self::item::LogItem;
pub use self::key::{SessionId, TaskKey};
pub use self::message::{InboundMessage, OutboundMessage, QueryArgs, TaskOutput, TaskOutputContent};
pub use self::record::{LogRecord, text_len};
