//! Kafka CDC 捕获源
//!
//! 订阅 `<source>.<schema>.<table>` 主题，逐条解析 Debezium 信封并发布变更事件。
//! 消息按接收顺序串行处理；解析失败的消息记录日志后跳过。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use application::{CaptureError, ChangeSource, NotificationPublisher};
use async_trait::async_trait;
use config::KafkaConfig;
use rdkafka::consumer::StreamConsumer;
use rdkafka::message::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::debezium::parse_change_envelope;
use crate::kafka::{create_consumer, ensure_topic, KafkaError};

pub struct KafkaChangeSource {
    config: KafkaConfig,
    publisher: NotificationPublisher,
    consumer: Option<StreamConsumer>,
    parse_failures: Arc<AtomicU64>,
}

impl KafkaChangeSource {
    pub fn new(config: KafkaConfig, publisher: NotificationPublisher) -> Self {
        Self {
            config,
            publisher,
            consumer: None,
            parse_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn parse_failures(&self) -> u64 {
        self.parse_failures.load(Ordering::Relaxed)
    }

    /// 处理一条消息的值；解析失败只计数和记录，不中断消费
    pub async fn handle_payload(&self, payload: Option<&[u8]>) {
        match parse_change_envelope(payload) {
            Ok(Some(event)) => {
                let report = self.publisher.publish(&event).await;
                debug!(
                    operation = event.operation_kind().as_str(),
                    affected = event.affected_ids().len(),
                    delivered = report.delivered,
                    failed = report.failed,
                    "变更事件已发布"
                );
            }
            Ok(None) => debug!("收到 tombstone 消息，忽略"),
            Err(err) => {
                self.parse_failures.fetch_add(1, Ordering::Relaxed);
                warn!(topic = %self.config.topic, error = %err, "无法解析变更信封，跳过该消息");
            }
        }
    }
}

/// 配置错误重启也无法恢复，其余按瞬时错误处理
fn capture_error(err: KafkaError) -> CaptureError {
    match err {
        KafkaError::ConfigError { .. } => CaptureError::fatal(err.to_string()),
        other => CaptureError::transport(other.to_string()),
    }
}

#[async_trait]
impl ChangeSource for KafkaChangeSource {
    fn name(&self) -> &'static str {
        "kafka-cdc"
    }

    async fn start(&mut self, cancel: CancellationToken) -> Result<(), CaptureError> {
        ensure_topic(&self.config).await.map_err(capture_error)?;

        let consumer = match self.consumer.take() {
            Some(consumer) => consumer,
            None => create_consumer(&self.config).map_err(capture_error)?,
        };

        info!(topic = %self.config.topic, "开始消费 CDC 主题");

        let result = loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                received = consumer.recv() => received,
            };

            let payload = match received {
                Ok(message) => {
                    debug!(
                        partition = message.partition(),
                        offset = message.offset(),
                        "收到 CDC 消息"
                    );
                    message.payload().map(<[u8]>::to_vec)
                }
                Err(err) => break Err(CaptureError::transport(format!("接收消息失败: {}", err))),
            };

            self.handle_payload(payload.as_deref()).await;
        };

        // 出错时丢弃消费者，重启时重新建立
        if result.is_ok() {
            self.consumer = Some(consumer);
        }
        result
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if self.consumer.take().is_some() {
            info!(topic = %self.config.topic, "Kafka 消费者已释放");
        }
        Ok(())
    }
}
