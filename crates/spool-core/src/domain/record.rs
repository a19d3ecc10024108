//! Log record: the durable, append-only shape of one task's cached log.

use serde::{Deserialize, Serialize};

/// Length of a piece of log text, in characters.
///
/// Positions, record lengths and the flush threshold all use this unit.
pub fn text_len(text: &str) -> u64 {
    text.chars().count() as u64
}

/// Durable log record for one task key.
///
/// Invariants:
/// - `chunks` is append-only.
/// - `total_length` never decreases.
/// - `finished` goes false -> true at most once and never reverts.
///
/// Field names on the wire follow the local store layout
/// (`tid`, `logBlobs`, `length`, `fin`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(rename = "tid")]
    pub key: String,

    #[serde(rename = "logBlobs")]
    pub chunks: Vec<Vec<u8>>,

    #[serde(rename = "length")]
    pub total_length: u64,

    #[serde(rename = "fin")]
    pub finished: bool,
}

impl LogRecord {
    /// First flush for a key creates the record with a single chunk.
    pub fn first(key: impl Into<String>, chunk: Vec<u8>, finished: bool) -> Self {
        let total_length = text_len(&String::from_utf8_lossy(&chunk));
        Self {
            key: key.into(),
            chunks: vec![chunk],
            total_length,
            finished,
        }
    }

    /// Append one chunk. `finished` can only be raised, never cleared.
    pub fn append(&mut self, chunk: Vec<u8>, finished: bool) {
        self.total_length += text_len(&String::from_utf8_lossy(&chunk));
        self.chunks.push(chunk);
        self.finished = self.finished || finished;
    }

    pub fn mark_finished(&mut self) {
        self.finished = true;
    }

    /// Chunks decoded as text, in stored order.
    pub fn texts(&self) -> impl Iterator<Item = String> + '_ {
        self.chunks
            .iter()
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
    }

    /// Whole log as one string.
    pub fn text(&self) -> String {
        self.texts().collect()
    }
}
