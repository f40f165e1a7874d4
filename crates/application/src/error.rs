use domain::{DomainError, RepositoryError};
use thiserror::Error;
use uuid::Uuid;

use crate::broadcaster::BroadcastError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(RepositoryError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("broadcast error: {0}")]
    Broadcast(#[from] BroadcastError),
    /// 队列会话无法结束；该消息作废，不再自动重试
    #[error("conversation {handle} could not be ended: {message}")]
    Conversation { handle: Uuid, message: String },
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
    #[error("operation cancelled")]
    Cancelled,
}

impl ApplicationError {
    /// 创建基础设施错误
    pub fn infrastructure(message: impl Into<String>) -> Self {
        ApplicationError::Infrastructure(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApplicationError::Cancelled)
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Repository(value)
    }
}
