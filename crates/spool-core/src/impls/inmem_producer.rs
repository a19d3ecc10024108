//! InMemoryLogProducer - ジョブマスター側のログ応答を模擬する
//!
//! `["task", uid, tid, pos]` の query に対して、pos から末尾までのテキストを
//! `job.msg.task.output` で返します（最大 `max_chunk` 文字）。
//!
//! # 応答規則
//! - 未知のタスク: 応答しない
//! - 新しいテキストがなく、タスクも未完了: テキスト追加か完了まで応答を保留
//!   （`answering_immediately` では保留せず、空の `msg` を `last = 0` で即座に返す）
//! - 完了済みで末尾まで返した: `last = 1`

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::domain::{InboundMessage, QueryArgs, TaskKey, TaskOutput, text_len};
use crate::impls::InMemoryBus;

#[derive(Debug, Default)]
struct ProducedLog {
    text: String,
    finished: bool,
}

pub struct InMemoryLogProducer {
    logs: Mutex<HashMap<TaskKey, ProducedLog>>,
    changed: Notify,
    max_chunk: usize,
    hold_empty: bool,
}

impl InMemoryLogProducer {
    pub fn new(max_chunk: usize) -> Self {
        Self {
            logs: Mutex::new(HashMap::new()),
            changed: Notify::new(),
            max_chunk: max_chunk.max(1),
            hold_empty: true,
        }
    }

    /// Reply to every query at once, with an empty `msg` when there is no new text.
    pub fn answering_immediately(max_chunk: usize) -> Self {
        Self {
            hold_empty: false,
            ..Self::new(max_chunk)
        }
    }

    /// Register a task with no output yet.
    pub async fn start(&self, key: &TaskKey) {
        self.logs.lock().await.entry(key.clone()).or_default();
        self.changed.notify_waiters();
    }

    pub async fn append(&self, key: &TaskKey, text: &str) {
        self.logs
            .lock()
            .await
            .entry(key.clone())
            .or_default()
            .text
            .push_str(text);
        self.changed.notify_waiters();
    }

    pub async fn finish(&self, key: &TaskKey) {
        self.logs.lock().await.entry(key.clone()).or_default().finished = true;
        self.changed.notify_waiters();
    }

    /// Answer queries arriving on `bus` until the bus is dropped.
    pub fn attach(self: Arc<Self>, bus: &Arc<InMemoryBus>) -> JoinHandle<()> {
        let mut queries = bus.outbound();
        let bus = Arc::downgrade(bus);
        tokio::spawn(async move {
            loop {
                let query = match queries.recv().await {
                    Ok(query) => query,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "producer lagged behind queries");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let QueryArgs::Task {
                    owner_id,
                    task_id,
                    offset,
                } = query.args().clone()
                else {
                    continue;
                };

                let producer = Arc::clone(&self);
                let bus = bus.clone();
                tokio::spawn(async move {
                    let key = TaskKey::new(owner_id, task_id);
                    let Some(output) = producer.answer(&key, offset).await else {
                        tracing::debug!(tid = %key, "query for unknown task ignored");
                        return;
                    };
                    let Some(bus) = bus.upgrade() else {
                        return;
                    };
                    match InboundMessage::task_output(output).encode() {
                        Ok(frame) => {
                            bus.deliver_frame(&frame);
                        }
                        Err(e) => tracing::warn!(error = %e, "failed to encode task output"),
                    }
                });
            }
        })
    }

    /// Build the reply for `key` at `offset`, waiting for new text if needed.
    pub async fn answer(&self, key: &TaskKey, offset: u64) -> Option<TaskOutput> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let logs = self.logs.lock().await;
                let log = logs.get(key)?;
                let total = text_len(&log.text);
                if offset < total || log.finished || !self.hold_empty {
                    let msg: String = log
                        .text
                        .chars()
                        .skip(offset as usize)
                        .take(self.max_chunk)
                        .collect();
                    let len = text_len(&msg);
                    let last = log.finished && offset + len >= total;
                    return Some(TaskOutput {
                        uid: key.owner_id().to_string(),
                        task: key.task_id().to_string(),
                        pos: Some(offset),
                        len: Some(len),
                        msg,
                        last: u8::from(last),
                    });
                }
            }

            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn unknown_task_gets_no_answer() {
        let producer = InMemoryLogProducer::new(16);
        assert!(producer.answer(&TaskKey::new("u1", "t1"), 0).await.is_none());
    }

    #[tokio::test]
    async fn answers_in_bounded_chunks() {
        let producer = InMemoryLogProducer::new(4);
        let key = TaskKey::new("u1", "t1");
        producer.append(&key, "abcdefgh").await;
        producer.finish(&key).await;

        let first = producer.answer(&key, 0).await.unwrap();
        assert_eq!(first.msg, "abcd");
        assert_eq!(first.last, 0);

        let second = producer.answer(&key, 4).await.unwrap();
        assert_eq!(second.msg, "efgh");
        assert_eq!(second.pos, Some(4));
        assert_eq!(second.len, Some(4));
        assert!(second.is_last());
    }

    #[tokio::test]
    async fn finished_tail_is_empty_last_chunk() {
        let producer = InMemoryLogProducer::new(4);
        let key = TaskKey::new("u1", "t1");
        producer.append(&key, "ab").await;
        producer.finish(&key).await;

        let output = producer.answer(&key, 2).await.unwrap();
        assert_eq!(output.msg, "");
        assert!(output.is_last());
    }

    #[tokio::test]
    async fn pending_query_waits_for_new_text() {
        let producer = Arc::new(InMemoryLogProducer::new(64));
        let key = TaskKey::new("u1", "t1");
        producer.start(&key).await;

        let waiter = tokio::spawn({
            let producer = Arc::clone(&producer);
            let key = key.clone();
            async move { producer.answer(&key, 0).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        producer.append(&key, "late\n").await;
        let output = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(output.msg, "late\n");
        assert!(!output.is_last());
    }

    #[tokio::test]
    async fn immediate_mode_answers_empty_without_waiting() {
        let producer = InMemoryLogProducer::answering_immediately(16);
        let key = TaskKey::new("u1", "t1");
        producer.append(&key, "ab").await;

        let output = tokio::time::timeout(Duration::from_secs(1), producer.answer(&key, 2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(output.msg, "");
        assert_eq!(output.pos, Some(2));
        assert!(!output.is_last());
    }
}
