//! UnstableGuard - 書き込みに失敗した task key の集合
//!
//! 一度登録された key はプロセスが終わるまで外れません。
//! 以降の書き込みはすべて黙ってスキップされます（修復はしない）。

use std::collections::HashSet;

use tokio::sync::Mutex;

use crate::domain::TaskKey;

#[derive(Default)]
pub struct UnstableGuard {
    keys: Mutex<HashSet<TaskKey>>,
}

impl UnstableGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mark_unstable(&self, key: &TaskKey) {
        if self.keys.lock().await.insert(key.clone()) {
            tracing::warn!(tid = %key, "task marked unstable, further log writes disabled");
        }
    }

    pub async fn is_unstable(&self, key: &TaskKey) -> bool {
        self.keys.lock().await.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn membership_is_by_value() {
        let guard = UnstableGuard::new();
        let key = TaskKey::new("u1", "t1");
        assert!(!guard.is_unstable(&key).await);

        guard.mark_unstable(&key).await;
        assert!(guard.is_unstable(&TaskKey::new("u1", "t1")).await);
        assert!(!guard.is_unstable(&TaskKey::new("u1", "t2")).await);
    }

    #[tokio::test]
    async fn marking_twice_keeps_key() {
        let guard = UnstableGuard::new();
        let key = TaskKey::new("u1", "t1");
        guard.mark_unstable(&key).await;
        guard.mark_unstable(&key).await;
        assert!(guard.is_unstable(&key).await);
    }
}
