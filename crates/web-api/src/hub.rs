//! 集线器连接注册表
//!
//! 每个客户端连接在注册表中有一个发送通道。广播把帧序列化一次后发给所有连接，
//! 发送失败（连接已关闭）的条目被移除。

use std::collections::HashMap;
use std::sync::Arc;

use application::{BroadcastError, HubClient, HubFrame};
use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::backplane::RedisBackplane;

pub type ConnectionId = Uuid;

#[derive(Clone, Default)]
pub struct LinesHub {
    connections: Arc<RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>>,
}

impl LinesHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let total = {
            let mut connections = self.connections.write().await;
            connections.insert(id, sender);
            connections.len()
        };
        info!(connection_id = %id, total, "集线器客户端已连接");
        (id, receiver)
    }

    pub async fn unregister(&self, id: ConnectionId) {
        let removed = self.connections.write().await.remove(&id).is_some();
        if removed {
            info!(connection_id = %id, "集线器客户端已断开");
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// 发给本节点的所有连接，返回送达的连接数
    pub async fn broadcast_local(&self, frame: &HubFrame) -> Result<usize, BroadcastError> {
        let text = serde_json::to_string(frame)?;

        let mut closed = Vec::new();
        let mut delivered = 0;
        {
            let connections = self.connections.read().await;
            for (id, sender) in connections.iter() {
                if sender.send(text.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(*id);
                }
            }
        }

        if !closed.is_empty() {
            let mut connections = self.connections.write().await;
            for id in &closed {
                connections.remove(id);
            }
            debug!(pruned = closed.len(), "移除已关闭的连接");
        }

        debug!(target_method = %frame.target, delivered, "广播帧已分发");
        Ok(delivered)
    }
}

/// 集线器的广播入口：配置了背板时经由 Redis 分发到所有节点，否则只在本节点分发
#[derive(Clone)]
pub struct HubBroadcaster {
    hub: LinesHub,
    backplane: Option<RedisBackplane>,
}

impl HubBroadcaster {
    pub fn new(hub: LinesHub, backplane: Option<RedisBackplane>) -> Self {
        Self { hub, backplane }
    }
}

#[async_trait]
impl HubClient for HubBroadcaster {
    async fn broadcast(&self, frame: HubFrame) -> Result<(), BroadcastError> {
        match &self.backplane {
            Some(backplane) => backplane.publish(&frame).await,
            None => self.hub.broadcast_local(&frame).await.map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use application::HubMethod;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_connection() {
        let hub = LinesHub::new();
        let (_a, mut rx_a) = hub.register().await;
        let (_b, mut rx_b) = hub.register().await;

        let frame = HubFrame::new(HubMethod::DeletedLinesData, json!(["1"]));
        assert_eq!(hub.broadcast_local(&frame).await.unwrap(), 2);

        let expected = serde_json::to_string(&frame).unwrap();
        assert_eq!(rx_a.recv().await.unwrap(), expected);
        assert_eq!(rx_b.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn closed_connections_are_pruned() {
        let hub = LinesHub::new();
        let (_kept, _rx_kept) = hub.register().await;
        let (_gone, rx_gone) = hub.register().await;
        drop(rx_gone);

        let delivered = hub
            .broadcast_local(&HubFrame::new(HubMethod::ReceiveLinesData, json!([])))
            .await
            .unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(hub.connection_count().await, 1);
    }

    #[tokio::test]
    async fn broadcaster_without_backplane_is_local() {
        let hub = LinesHub::new();
        let (_id, mut rx) = hub.register().await;
        let broadcaster = HubBroadcaster::new(hub, None);

        broadcaster
            .broadcast(HubFrame::new(HubMethod::ReceiveLinesData, json!([{"lineCode": "A"}])))
            .await
            .unwrap();

        assert!(rx.recv().await.unwrap().contains("ReceiveLinesData"));
    }
}
