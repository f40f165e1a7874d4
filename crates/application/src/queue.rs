//! 遗留消息队列子模式
//!
//! 带超时地接收一条消息，解析 XML 信封（`AffectedID` 列表 + `OperationType`），
//! 删除事件直接发出，其余重新读取受影响行；处理完毕后显式结束会话。
//! 整个流程作为一条修改型请求在同一事务中执行。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{ChangeEvent, LineId, OperationKind, RepositoryError};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::capture::EnvelopeError;
use crate::error::ApplicationError;
use crate::pipeline::{Request, RequestHandler};
use crate::procedures::LinesProcedures;

/// 默认的接收等待时长
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub conversation_handle: Uuid,
    pub body: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChangeQueue: Send + Sync {
    /// 最多等待 `timeout`，超时返回 `None`
    async fn receive(&self, timeout: Duration) -> Result<Option<QueueMessage>, RepositoryError>;

    async fn end_conversation(&self, conversation_handle: Uuid) -> Result<(), RepositoryError>;
}

/// 队列消息信封
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEnvelope {
    pub affected_ids: Vec<LineId>,
    pub operation_kind: OperationKind,
}

#[derive(Clone, Copy)]
enum Field {
    AffectedId,
    OperationType,
}

impl QueueEnvelope {
    pub fn parse(body: &str) -> Result<Self, EnvelopeError> {
        let mut reader = Reader::from_str(body);
        reader.config_mut().trim_text(true);

        let mut current = None;
        let mut affected_ids = Vec::new();
        let mut operation_type: Option<String> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    current = match start.local_name().as_ref() {
                        b"AffectedID" => Some(Field::AffectedId),
                        b"OperationType" => Some(Field::OperationType),
                        _ => None,
                    };
                }
                Ok(Event::Text(text)) => {
                    let Some(field) = current else { continue };
                    let value = text
                        .unescape()
                        .map_err(|err| EnvelopeError::malformed(err.to_string()))?;
                    match field {
                        Field::AffectedId => affected_ids.push(LineId::parse(&value)?),
                        Field::OperationType => operation_type = Some(value.trim().to_string()),
                    }
                }
                Ok(Event::End(_)) => current = None,
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => return Err(EnvelopeError::malformed(err.to_string())),
            }
        }

        let operation_type = operation_type.ok_or(EnvelopeError::MissingField("OperationType"))?;
        let operation_kind = if operation_type.eq_ignore_ascii_case("DELETE") {
            OperationKind::Delete
        } else if operation_type.eq_ignore_ascii_case("INSERT") {
            OperationKind::Insert
        } else {
            OperationKind::Update
        };

        Ok(Self {
            affected_ids,
            operation_kind,
        })
    }
}

/// 从队列接收一条变更消息
#[derive(Debug, Clone, Copy)]
pub struct ReceiveChangeMessageCommand {
    pub timeout: Duration,
}

impl Default for ReceiveChangeMessageCommand {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_RECEIVE_TIMEOUT,
        }
    }
}

impl Request for ReceiveChangeMessageCommand {
    type Response = ReceiveOutcome;

    fn name(&self) -> &'static str {
        "ReceiveChangeMessageCommand"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReceiveOutcome {
    /// 等待超时，没有消息
    Idle,
    Received(ChangeEvent),
    /// 消息已消费但无法转换为变更事件
    Discarded,
}

pub struct ReceiveChangeMessageHandler {
    queue: Arc<dyn ChangeQueue>,
    procedures: Arc<dyn LinesProcedures>,
}

impl ReceiveChangeMessageHandler {
    pub fn new(queue: Arc<dyn ChangeQueue>, procedures: Arc<dyn LinesProcedures>) -> Self {
        Self { queue, procedures }
    }

    async fn materialize(&self, envelope: QueueEnvelope) -> Result<Option<ChangeEvent>, ApplicationError> {
        match envelope.operation_kind {
            OperationKind::Delete => {
                if envelope.affected_ids.is_empty() {
                    warn!("删除消息不含任何标识，忽略");
                    return Ok(None);
                }
                Ok(Some(ChangeEvent::deleted(envelope.affected_ids)?))
            }
            kind @ (OperationKind::Insert | OperationKind::Update) => {
                let rows = self
                    .procedures
                    .retrieve_lines_by_ids(&envelope.affected_ids)
                    .await?;
                Ok(Some(ChangeEvent::upserted(kind, rows)?))
            }
        }
    }
}

#[async_trait]
impl RequestHandler<ReceiveChangeMessageCommand> for ReceiveChangeMessageHandler {
    async fn handle(&self, request: ReceiveChangeMessageCommand) -> Result<ReceiveOutcome, ApplicationError> {
        let Some(message) = self.queue.receive(request.timeout).await? else {
            debug!("队列中没有新消息");
            return Ok(ReceiveOutcome::Idle);
        };
        let handle = message.conversation_handle;

        let event = match QueueEnvelope::parse(&message.body) {
            Ok(envelope) => self.materialize(envelope).await?,
            Err(err) => {
                warn!(conversation = %handle, error = %err, "队列消息无法解析，跳过");
                None
            }
        };

        if let Err(err) = self.queue.end_conversation(handle).await {
            error!(conversation = %handle, error = %err, "结束会话失败，该消息作废");
            return Err(ApplicationError::Conversation {
                handle,
                message: err.to_string(),
            });
        }

        Ok(match event {
            Some(event) => ReceiveOutcome::Received(event),
            None => ReceiveOutcome::Discarded,
        })
    }
}
