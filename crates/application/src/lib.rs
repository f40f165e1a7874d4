//! 应用层实现。
//!
//! 请求管道（连接 + 事务行为）、查询与命令处理器、进程内通知分发，
//! 以及对外部适配器（存储过程、集线器、变更队列、捕获源）的抽象。

pub mod broadcaster;
pub mod capture;
pub mod error;
pub mod pipeline;
pub mod procedures;
pub mod publisher;
pub mod queries;
pub mod queue;
pub mod session;

pub use broadcaster::{BroadcastError, HubClient, HubFrame, HubMethod};
pub use capture::{CaptureError, CaptureSupervisor, ChangeSource, EnvelopeError};
pub use error::ApplicationError;
pub use pipeline::{
    ConnectionBehavior, Request, RequestAccess, RequestHandler, RequestPipeline, TransactionBehavior,
};
pub use procedures::{HealthCheckProcedures, LinesProcedures};
pub use publisher::{LinesChangedHandler, NotificationHandler, NotificationPublisher, PublishReport};
pub use queries::{
    DatabaseHealthCheckHandler, DatabaseHealthCheckQuery, LinesDataQuery, LinesDataQueryHandler,
};
pub use queue::{
    ChangeQueue, QueueEnvelope, QueueMessage, ReceiveChangeMessageCommand,
    ReceiveChangeMessageHandler, ReceiveOutcome, DEFAULT_RECEIVE_TIMEOUT,
};
pub use session::{SessionError, SessionFactory, SessionState, SharedSession, SqlSession};
