//! 集线器 WebSocket 客户端
//!
//! 捕获进程通过该客户端把广播帧推送到集线器的发布端点。
//! 连接断开后自动重连（指数退避 + 抖动），单次发送失败会重连并重发一次。

use std::time::Duration;

use application::{BroadcastError, HubClient, HubFrame};
use async_trait::async_trait;
use config::HubConfig;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use tungstenite::Message;

use crate::retry::{retry_async, Backoff, RetryConfig};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

const CONNECT_ATTEMPTS: u32 = 5;

pub struct WsHubClient {
    url: String,
    retry: RetryConfig,
    sink: Mutex<Option<WsSink>>,
}

impl WsHubClient {
    pub fn new(url: impl Into<String>, retry: RetryConfig) -> Self {
        Self {
            url: url.into(),
            retry,
            sink: Mutex::new(None),
        }
    }

    pub fn from_config(config: &HubConfig) -> Self {
        let backoff = Backoff::exponential(
            Duration::from_millis(config.reconnect_base_delay_ms),
            Duration::from_millis(config.reconnect_max_delay_ms),
        );
        Self::new(config.publish_url(), RetryConfig::new(CONNECT_ATTEMPTS, backoff))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// 建立连接；宿主启动时调用，失败时由第一次广播重试
    pub async fn start(&self) -> Result<(), BroadcastError> {
        let mut guard = self.sink.lock().await;
        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }
        Ok(())
    }

    pub async fn stop(&self) {
        if let Some(mut sink) = self.sink.lock().await.take() {
            if let Err(err) = sink.send(Message::Close(None)).await {
                debug!(error = %err, "关闭集线器连接时出错");
            }
            info!(url = %self.url, "集线器连接已关闭");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.sink.lock().await.is_some()
    }

    async fn connect(&self) -> Result<WsSink, BroadcastError> {
        let url = self.url.as_str();
        let (stream, _response) = retry_async(&self.retry, |_| true, || async move {
            info!(url = %url, "连接集线器");
            tokio_tungstenite::connect_async(url).await
        })
        .await
        .map_err(|err| {
            warn!(url = %url, error = %err, "无法连接集线器");
            BroadcastError::Disconnected
        })?;

        let (sink, read) = stream.split();
        // 丢弃服务端推送；发布端点不回传业务消息
        tokio::spawn(read.for_each(|_| async {}));
        info!(url = %url, "集线器已连接");
        Ok(sink)
    }
}

#[async_trait]
impl HubClient for WsHubClient {
    async fn broadcast(&self, frame: HubFrame) -> Result<(), BroadcastError> {
        let text = serde_json::to_string(&frame)?;
        let mut guard = self.sink.lock().await;

        if let Some(sink) = guard.as_mut() {
            match sink.send(Message::text(text.clone())).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(target_method = %frame.target, error = %err, "集线器连接已断开，准备重连");
                    *guard = None;
                }
            }
        }

        let mut sink = self.connect().await?;
        sink.send(Message::text(text))
            .await
            .map_err(|err| BroadcastError::failed(err.to_string()))?;
        *guard = Some(sink);
        debug!(target_method = %frame.target, "广播帧已发送");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use application::HubMethod;
    use tokio::net::TcpListener;

    use super::*;

    fn fast_retry() -> RetryConfig {
        RetryConfig::new(2, Backoff::fixed(Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn broadcast_sends_hub_frame_as_text() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            match ws.next().await {
                Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                other => panic!("unexpected frame: {other:?}"),
            }
        });

        let client = WsHubClient::new(format!("ws://{addr}"), fast_retry());
        client
            .broadcast(HubFrame::new(HubMethod::DeletedLinesData, serde_json::json!(["x"])))
            .await
            .unwrap();

        let received = server.await.unwrap();
        assert_eq!(received, r#"{"target":"DeletedLinesData","arguments":[["x"]]}"#);
    }

    #[tokio::test]
    async fn unreachable_hub_reports_disconnected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = WsHubClient::new(format!("ws://{addr}"), fast_retry());
        let err = client
            .broadcast(HubFrame::new(HubMethod::ReceiveLinesData, serde_json::json!([])))
            .await
            .unwrap_err();

        assert!(matches!(err, BroadcastError::Disconnected));
        assert!(!client.is_connected().await);
    }
}
