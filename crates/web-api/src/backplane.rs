//! Redis 背板
//!
//! 多个集线器节点通过一个 Redis 频道交换广播帧。只转发广播，
//! 连接时的快照只发给本节点的调用方，从不经过背板。

use std::time::Duration;

use application::{BroadcastError, HubFrame};
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::hub::LinesHub;

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum BackplaneError {
    #[error("Redis 连接错误: {0}")]
    Connection(#[from] redis::RedisError),
}

#[derive(Clone)]
pub struct RedisBackplane {
    client: redis::Client,
    connection: ConnectionManager,
    channel: String,
}

impl RedisBackplane {
    pub async fn connect(redis_url: &str, channel: impl Into<String>) -> Result<Self, BackplaneError> {
        let client = redis::Client::open(redis_url)?;
        let connection = client.get_connection_manager().await?;
        let channel = channel.into();
        info!(channel = %channel, "Redis 背板已连接");
        Ok(Self {
            client,
            connection,
            channel,
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub async fn publish(&self, frame: &HubFrame) -> Result<(), BroadcastError> {
        let payload = serde_json::to_string(frame)?;
        let mut connection = self.connection.clone();
        let receivers = connection
            .publish::<_, _, i64>(&self.channel, payload)
            .await
            .map_err(|err| BroadcastError::failed(err.to_string()))?;
        debug!(channel = %self.channel, receivers, "广播帧已发布到背板");
        Ok(())
    }

    /// 订阅背板频道，把收到的帧分发给本节点的连接；断开后自动重新订阅
    pub fn spawn_relay(&self, hub: LinesHub, cancel: CancellationToken) -> JoinHandle<()> {
        let backplane = self.clone();
        tokio::spawn(async move {
            while !cancel.is_cancelled() {
                match backplane.relay(&hub, &cancel).await {
                    Ok(()) => break,
                    Err(err) => {
                        warn!(error = %err, "背板订阅中断，准备重新订阅");
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => {}
                        }
                    }
                }
            }
            info!(channel = %backplane.channel, "背板转发已停止");
        })
    }

    async fn relay(&self, hub: &LinesHub, cancel: &CancellationToken) -> Result<(), BackplaneError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;
        info!(channel = %self.channel, "已订阅背板频道");

        let mut messages = std::pin::pin!(pubsub.on_message());
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                message = messages.next() => message,
            };

            let Some(message) = message else {
                return Err(BackplaneError::Connection(redis::RedisError::from((
                    redis::ErrorKind::IoError,
                    "pubsub stream closed",
                ))));
            };

            let payload: String = match message.get_payload() {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(error = %err, "背板消息载荷无效");
                    continue;
                }
            };

            match serde_json::from_str::<HubFrame>(&payload) {
                Ok(frame) => {
                    if let Err(err) = hub.broadcast_local(&frame).await {
                        error!(error = %err, "背板帧分发失败");
                    }
                }
                Err(err) => warn!(error = %err, "背板帧无法解析"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use application::HubMethod;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn relays_frames_between_nodes() {
        let Ok(redis_url) = std::env::var("REDIS_URL") else {
            return;
        };

        let channel = format!("TMS:linesHub:test:{}", uuid::Uuid::new_v4());
        let backplane = RedisBackplane::connect(&redis_url, channel).await.unwrap();
        let hub = LinesHub::new();
        let (_id, mut rx) = hub.register().await;
        let cancel = CancellationToken::new();
        let relay = backplane.spawn_relay(hub, cancel.clone());

        tokio::time::sleep(Duration::from_millis(200)).await;
        backplane
            .publish(&HubFrame::new(HubMethod::DeletedLinesData, json!(["a"])))
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(received.contains("DeletedLinesData"));

        cancel.cancel();
        relay.await.unwrap();
    }
}
