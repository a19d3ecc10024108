//! MessageBus port - ダッシュボードとジョブマスター間の双方向チャネル
//!
//! 送信と、フィルタ付きの受信ストリームだけを提供します。
//! 実際の接続（WebSocket など）はこのクレートの外にあります。

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::{BusError, InboundMessage, OutboundMessage};

/// Predicate applied to every inbound message of a subscription.
pub type MessageFilter = Arc<dyn Fn(&InboundMessage) -> bool + Send + Sync>;

/// MessageBus は publish/subscribe のメッセージバス
///
/// # 設計原則
/// - subscribe は購読以降に届いたメッセージだけを流す
/// - 解釈できないフレームはバス側で捨てる（購読者には届かない）
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<(), BusError>;

    fn subscribe(&self, filter: MessageFilter) -> BoxStream<'static, InboundMessage>;
}
