//! Items yielded by a task-log session.

/// One element of the ordered sequence returned by `stream_task_log`.
///
/// The markers keep the semantics of the dashboard protocol:
/// `LocalExhausted` is the "null" marker (local data ran out, more may exist
/// remotely) and `Finished` is the empty-string marker (fully complete).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogItem {
    Chunk(String),
    LocalExhausted,
    Finished,
}

impl LogItem {
    /// Text form used by string-based consumers.
    pub fn as_wire_text(&self) -> Option<&str> {
        match self {
            LogItem::Chunk(text) => Some(text),
            LogItem::LocalExhausted => None,
            LogItem::Finished => Some(""),
        }
    }

    pub fn as_chunk(&self) -> Option<&str> {
        match self {
            LogItem::Chunk(text) => Some(text),
            _ => None,
        }
    }
}
