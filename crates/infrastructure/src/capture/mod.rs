//! 变更捕获源实现

pub mod debezium;
pub mod kafka_source;
pub mod notify_source;
pub mod queue_source;

pub use debezium::parse_change_envelope;
pub use kafka_source::KafkaChangeSource;
pub use notify_source::{ListenerState, NotifyChangeSource};
pub use queue_source::{PgChangeQueue, QueueChangeSource};
