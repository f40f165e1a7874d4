//! 基础设施层实现。
//!
//! PostgreSQL 会话与存储过程、变更捕获源（LISTEN/NOTIFY、Kafka CDC、遗留队列）、
//! Kafka 主题管理以及集线器 WebSocket 客户端，实现应用层定义的接口。

pub mod capture;
pub mod db;
pub mod hub;
pub mod kafka;
pub mod migrations;
pub mod retry;

pub use capture::{
    parse_change_envelope, KafkaChangeSource, ListenerState, NotifyChangeSource, PgChangeQueue,
    QueueChangeSource,
};
pub use db::{
    create_pg_pool, PgHealthCheckProcedures, PgLinesProcedures, PgRequestScope, PgSessionFactory,
    PgSqlSession,
};
pub use hub::WsHubClient;
pub use kafka::{ensure_topic, KafkaError, KafkaResult};
pub use migrations::MIGRATOR;
pub use retry::{retry_async, Backoff, RetryConfig};
