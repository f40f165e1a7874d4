//! Kafka 接入
//!
//! 主题管理与 CDC 消费者配置。

pub mod admin;
pub mod consumer;
pub mod error;

pub use admin::ensure_topic;
pub use consumer::create_consumer;
pub use error::{KafkaError, KafkaResult};
