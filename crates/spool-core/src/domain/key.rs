//! Task key と Session ID
//!
//! TaskKey は `owner_id + "_" + task_id` で、ローカルストアの主キーであり、
//! position / buffer / unstable の各マップのキーでもあります。

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// タスクのログを一意に識別するキー
///
/// # 不変条件
/// - タスクの生存期間中は安定（同じ owner/task なら常に同じキー）
/// - `Display` は `owner_task` 形式で、ストアの `tid` と一致する
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskKey {
    owner_id: String,
    task_id: String,
}

impl TaskKey {
    pub fn new(owner_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            task_id: task_id.into(),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Does an inbound `(uid, task)` pair belong to this key?
    pub fn matches(&self, owner_id: &str, task_id: &str) -> bool {
        self.owner_id == owner_id && self.task_id == task_id
    }

    pub fn tid(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.owner_id, self.task_id)
    }
}

/// 1 回の `stream_task_log` 呼び出しを識別する ID（ログの相関用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Ulid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::simple("u1", "t1", "u1_t1")]
    #[case::underscore_in_task("u1", "build_linux", "u1_build_linux")]
    #[case::empty_task("u1", "", "u1_")]
    fn tid_joins_owner_and_task(#[case] owner: &str, #[case] task: &str, #[case] tid: &str) {
        let key = TaskKey::new(owner, task);
        assert_eq!(key.to_string(), tid);
        assert_eq!(key.tid(), tid);
        assert_eq!(key.owner_id(), owner);
        assert_eq!(key.task_id(), task);
    }

    #[test]
    fn matches_compares_both_parts() {
        let key = TaskKey::new("u1", "t1");
        assert!(key.matches("u1", "t1"));
        assert!(!key.matches("u1", "t2"));
        assert!(!key.matches("u2", "t1"));
    }

    #[test]
    fn session_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("session-"));
    }
}
