//! InMemoryBus - 開発・テスト用のメッセージバス
//!
//! # 学習ポイント
//! - tokio::sync::broadcast による 1 対多の配送
//! - BroadcastStream で Receiver を Stream に変換
//! - 受信フレームのデコード失敗はバス側でログに残して捨てる

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::{Mutex, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::domain::{BusError, InboundMessage, OutboundMessage};
use crate::ports::{MessageBus, MessageFilter};

const DEFAULT_CAPACITY: usize = 1024;

/// InMemoryBus はプロセス内で完結するメッセージバス
///
/// # 実装詳細
/// - inbound: producer -> subscribers（broadcast）
/// - outbound: `send` された query（broadcast + 記録）
///
/// # 使用例
/// ```ignore
/// let bus = InMemoryBus::new();
/// let mut queries = bus.outbound();
/// bus.deliver_frame(r#"{"type":"job.msg.task.output", ...}"#);
/// ```
pub struct InMemoryBus {
    inbound: broadcast::Sender<InboundMessage>,
    outbound: broadcast::Sender<OutboundMessage>,
    sent: Mutex<Vec<OutboundMessage>>,
    closed: AtomicBool,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (inbound, _) = broadcast::channel(capacity);
        let (outbound, _) = broadcast::channel(capacity);
        Self {
            inbound,
            outbound,
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Push an already-decoded message to every subscriber.
    pub fn deliver(&self, message: InboundMessage) {
        // no subscribers is fine: the message is simply dropped
        let _ = self.inbound.send(message);
    }

    /// Decode a text frame and deliver it. Malformed frames are logged and dropped.
    pub fn deliver_frame(&self, frame: &str) -> bool {
        match InboundMessage::decode(frame) {
            Ok(message) => {
                self.deliver(message);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed inbound frame");
                false
            }
        }
    }

    /// Receiver for queries sent through this bus (the producer side).
    pub fn outbound(&self) -> broadcast::Receiver<OutboundMessage> {
        self.outbound.subscribe()
    }

    /// Every query sent so far, in order.
    pub async fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    /// Refuse every later `send` (the connection went away).
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inbound.receiver_count()
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn send(&self, message: OutboundMessage) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        self.sent.lock().await.push(message.clone());
        // producers may not be attached yet
        let _ = self.outbound.send(message);
        Ok(())
    }

    fn subscribe(&self, filter: MessageFilter) -> BoxStream<'static, InboundMessage> {
        BroadcastStream::new(self.inbound.subscribe())
            .filter_map(move |item| {
                let message = match item {
                    Ok(message) if filter(&message) => Some(message),
                    Ok(_) => None,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber lagged, messages lost");
                        None
                    }
                };
                futures::future::ready(message)
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{QueryArgs, TaskKey, TaskOutput};
    use std::sync::Arc;
    use std::time::Duration;

    fn output(task: &str, msg: &str) -> InboundMessage {
        InboundMessage::task_output(TaskOutput {
            uid: "u1".into(),
            task: task.into(),
            pos: None,
            len: None,
            msg: msg.into(),
            last: 0,
        })
    }

    #[tokio::test]
    async fn subscriber_receives_only_matching_messages() {
        let bus = InMemoryBus::new();
        let key = TaskKey::new("u1", "t1");
        let filter_key = key.clone();
        let mut stream = bus.subscribe(Arc::new(move |m: &InboundMessage| {
            m.output_for(&filter_key).is_some()
        }));

        bus.deliver(output("t2", "other"));
        bus.deliver(output("t1", "mine"));

        let got = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.output_for(&key).unwrap().msg, "mine");
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped() {
        let bus = InMemoryBus::new();
        assert!(!bus.deliver_frame("{not json"));
        assert!(!bus.deliver_frame(r#"{"type":"job.msg.task.output","content":{}}"#));
        assert!(bus.deliver_frame(r#"{"type":"job.msg.batch","content":{}}"#));
    }

    #[tokio::test]
    async fn send_records_and_forwards_queries() {
        let bus = InMemoryBus::new();
        let mut queries = bus.outbound();
        let query = OutboundMessage::query(QueryArgs::History);

        bus.send(query.clone()).await.unwrap();

        assert_eq!(bus.sent().await, vec![query.clone()]);
        assert_eq!(queries.recv().await.unwrap(), query);
    }

    #[tokio::test]
    async fn closed_bus_rejects_sends() {
        let bus = InMemoryBus::new();
        bus.close();

        let result = bus.send(OutboundMessage::query(QueryArgs::Processing)).await;

        assert!(matches!(result, Err(BusError::Closed)));
        assert!(bus.sent().await.is_empty());
    }

    #[tokio::test]
    async fn dropping_stream_unsubscribes() {
        let bus = InMemoryBus::new();
        let stream = bus.subscribe(Arc::new(|_: &InboundMessage| true));
        assert_eq!(bus.subscriber_count(), 1);
        drop(stream);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
