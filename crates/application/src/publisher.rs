//! 进程内通知分发
//!
//! 变更事件依次交给所有已注册的处理器。单个处理器失败只记录日志，
//! 不影响其余处理器，也不会让捕获循环崩溃。

use std::sync::Arc;

use async_trait::async_trait;
use domain::{ChangeEvent, OperationKind};
use tracing::{debug, error};

use crate::broadcaster::{BroadcastError, HubClient, HubFrame, HubMethod};
use crate::error::ApplicationError;

#[async_trait]
pub trait NotificationHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &ChangeEvent) -> Result<(), ApplicationError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone, Default)]
pub struct NotificationPublisher {
    handlers: Vec<Arc<dyn NotificationHandler>>,
}

impl NotificationPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: Arc<dyn NotificationHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn register(&mut self, handler: Arc<dyn NotificationHandler>) {
        self.handlers.push(handler);
    }

    pub async fn publish(&self, event: &ChangeEvent) -> PublishReport {
        let mut report = PublishReport::default();

        for handler in &self.handlers {
            match handler.handle(event).await {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    error!(
                        handler = handler.name(),
                        operation = event.operation_kind().as_str(),
                        error = %err,
                        "通知处理器执行失败"
                    );
                }
            }
        }

        report
    }
}

/// 将线路变更广播给所有集线器客户端
pub struct LinesChangedHandler {
    hub: Arc<dyn HubClient>,
}

impl LinesChangedHandler {
    pub fn new(hub: Arc<dyn HubClient>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl NotificationHandler for LinesChangedHandler {
    fn name(&self) -> &'static str {
        "LinesChangedHandler"
    }

    async fn handle(&self, event: &ChangeEvent) -> Result<(), ApplicationError> {
        let frame = match event.operation_kind() {
            OperationKind::Delete => HubFrame::new(
                HubMethod::DeletedLinesData,
                serde_json::to_value(event.affected_ids()).map_err(BroadcastError::from)?,
            ),
            OperationKind::Insert | OperationKind::Update => {
                if event.payload().is_empty() && !event.is_full_set() {
                    debug!(operation = event.operation_kind().as_str(), "载荷为空，跳过广播");
                    return Ok(());
                }
                HubFrame::new(
                    HubMethod::ReceiveLinesData,
                    serde_json::to_value(event.payload()).map_err(BroadcastError::from)?,
                )
            }
        };

        debug!(
            target_method = %frame.target,
            affected = event.affected_ids().len(),
            "广播线路变更"
        );
        self.hub.broadcast(frame).await?;
        Ok(())
    }
}
