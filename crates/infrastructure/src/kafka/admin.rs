//! 主题管理

use std::time::Duration;

use config::KafkaConfig;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::types::RDKafkaErrorCode;
use tracing::{debug, info};

use super::error::{KafkaError, KafkaResult};

/// 确保主题存在：1 个分区、副本数 1；主题已存在视为成功。
pub async fn ensure_topic(config: &KafkaConfig) -> KafkaResult<()> {
    let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
        .set("bootstrap.servers", &config.bootstrap_servers)
        .create()
        .map_err(|e| KafkaError::ConfigError {
            message: format!("创建 Kafka 管理客户端失败: {}", e),
        })?;

    let topic = NewTopic::new(&config.topic, 1, TopicReplication::Fixed(1));
    let options = AdminOptions::new().operation_timeout(Some(Duration::from_secs(10)));

    for result in admin.create_topics(&[topic], &options).await? {
        match result {
            Ok(name) => info!(topic = %name, "Kafka 主题已创建"),
            Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                debug!(topic = %name, "Kafka 主题已存在")
            }
            Err((name, code)) => {
                return Err(KafkaError::AdminError {
                    topic: name,
                    message: code.to_string(),
                })
            }
        }
    }

    Ok(())
}
