//! PositionTracker - task key ごとの取得済みオフセット

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::domain::TaskKey;

/// Per-key count of characters already retrieved from the producer.
///
/// Positions only move forward. They live for the whole process, so a new
/// session for the same key resumes where the previous one stopped.
#[derive(Default)]
pub struct PositionTracker {
    positions: Mutex<HashMap<TaskKey, u64>>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracked position, initializing it to `local_length` (or 0) if absent.
    pub async fn get_or_init(&self, key: &TaskKey, local_length: Option<u64>) -> u64 {
        *self
            .positions
            .lock()
            .await
            .entry(key.clone())
            .or_insert(local_length.unwrap_or(0))
    }

    /// Add `n` and return the new position.
    pub async fn advance(&self, key: &TaskKey, n: u64) -> u64 {
        let mut positions = self.positions.lock().await;
        let position = positions.entry(key.clone()).or_insert(0);
        *position += n;
        *position
    }

    pub async fn get(&self, key: &TaskKey) -> Option<u64> {
        self.positions.lock().await.get(key).copied()
    }
}
