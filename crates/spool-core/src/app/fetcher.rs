//! RemoteLogFetcher - バス経由でタスクのログを順に取得する
//!
//! # フロー
//! 1. task key 宛ての `job.msg.task.output` を購読（送信より先に購読する）
//! 2. 開始オフセットから `["task", uid, tid, pos]` を送信
//! 3. 応答を CacheBuffer に commit（position の前進とバッファへの追記）
//! 4. `last == 0` なら次の query を送信し、chunk を利用者に流す
//! 5. `last == 1` の chunk で終了
//!
//! 未応答の query は常に 1 件まで（直列パイプライン）なので、
//! chunk の順序は producer の順序と一致します。
//!
//! commit は別タスクで実行します。ストリームが途中で drop されても
//! 受け取った chunk は最後までバッファとストアに届きます。
//! 空の chunk はフラッシュの合図としてだけ使い、利用者には流しません。

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;

use super::buffer::CacheBuffer;
use crate::domain::{InboundMessage, OutboundMessage, QueryArgs, TaskKey, text_len};
use crate::ports::MessageBus;

#[derive(Clone)]
pub struct RemoteLogFetcher {
    bus: Arc<dyn MessageBus>,
    buffer: Arc<CacheBuffer>,
}

impl RemoteLogFetcher {
    pub fn new(bus: Arc<dyn MessageBus>, buffer: Arc<CacheBuffer>) -> Self {
        Self { bus, buffer }
    }

    /// Stream `key`'s remote log starting at offset `from`.
    ///
    /// Ends after the chunk flagged `last`, or early if a query cannot be
    /// sent. Dropping the stream stops further queries; a chunk already
    /// received is still committed. Empty chunks are not yielded.
    pub fn fetch(&self, key: TaskKey, from: u64) -> BoxStream<'static, String> {
        let bus = Arc::clone(&self.bus);
        let buffer = Arc::clone(&self.buffer);

        async_stream::stream! {
            let filter_key = key.clone();
            let mut responses = bus.subscribe(Arc::new(move |message: &InboundMessage| {
                message.output_for(&filter_key).is_some()
            }));

            let mut expected = from;
            if !send_query(bus.as_ref(), &key, expected).await {
                return;
            }

            while let Some(message) = responses.next().await {
                let InboundMessage::TaskOutput(content) = message else {
                    continue;
                };
                let output = content.message;
                if !output.belongs_to(&key) {
                    continue;
                }
                let pos = output.pos.unwrap_or(expected);
                if pos != expected {
                    tracing::debug!(tid = %key, pos, expected, "dropping stale task output");
                    continue;
                }

                let last = output.is_last();
                let commit = tokio::spawn({
                    let buffer = Arc::clone(&buffer);
                    let key = key.clone();
                    let text = output.msg.clone();
                    async move { buffer.commit(&key, pos, &text, last).await }
                });
                if let Err(e) = commit.await {
                    tracing::warn!(tid = %key, error = %e, "log chunk commit aborted");
                    break;
                }

                expected = pos + text_len(&output.msg);
                let more = !last && send_query(bus.as_ref(), &key, expected).await;

                if !output.msg.is_empty() {
                    yield output.msg;
                }

                if !more {
                    break;
                }
            }
        }
        .boxed()
    }
}

async fn send_query(bus: &dyn MessageBus, key: &TaskKey, offset: u64) -> bool {
    tracing::debug!(tid = %key, offset, "requesting task log");
    match bus
        .send(OutboundMessage::query(QueryArgs::task(key, offset)))
        .await
    {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(tid = %key, offset, error = %e, "failed to request task log");
            false
        }
    }
}
