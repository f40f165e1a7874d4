//! CDC 消费者创建

use config::KafkaConfig;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use tracing::info;

use super::error::{KafkaError, KafkaResult};

/// 创建并订阅 CDC 主题的消费者
///
/// 消费者组固定，保证同一分区内的变更按顺序处理。
pub fn create_consumer(config: &KafkaConfig) -> KafkaResult<StreamConsumer> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("group.id", &config.consumer_group_id)
        .set("bootstrap.servers", &config.bootstrap_servers)
        .set("enable.partition.eof", "false")
        .set("session.timeout.ms", "10000")
        .set("heartbeat.interval.ms", "3000")
        .set("enable.auto.commit", "true")
        .set("auto.commit.interval.ms", "1000")
        .set("auto.offset.reset", &config.auto_offset_reset)
        .create()
        .map_err(|e| KafkaError::ConfigError {
            message: format!("创建 Kafka 消费者失败: {}", e),
        })?;

    consumer
        .subscribe(&[config.topic.as_str()])
        .map_err(|e| KafkaError::ConsumerError {
            message: format!("订阅主题失败: {}", e),
        })?;

    info!(
        topic = %config.topic,
        group = %config.consumer_group_id,
        "Kafka 消费者已订阅"
    );

    Ok(consumer)
}
