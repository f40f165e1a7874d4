//! 会话管理器
//!
//! 一个会话持有一个延迟打开的数据库连接，以及至多一个活动事务。
//! 会话只属于一个请求或一次工作循环迭代，从不在并发操作之间共享，
//! 因此这里不需要任何跨请求的锁。

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

/// 会话状态机：`Idle → Open → InTransaction → Open → ... → Disposed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Open,
    InTransaction,
    Disposed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// 存储不可达
    #[error("无法连接数据库: {0}")]
    Connection(String),
    /// 协议/状态违规（重复 begin、无事务时 commit 等），属于编程错误
    #[error("会话状态无效: {0}")]
    InvalidState(String),
    #[error("会话已释放")]
    Disposed,
    #[error("数据库错误: {0}")]
    Database(String),
}

impl SessionError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        SessionError::InvalidState(message.into())
    }
}

/// 事务性会话
///
/// - `open`：连接未打开时打开，幂等；
/// - `begin`：先 `open`，再开启事务；已有事务时返回 `InvalidState`；
/// - `commit`：提交并清理事务；提交失败时先回滚，再返回原始错误；
/// - `rollback`：回滚并清理事务；没有事务时返回 `InvalidState`；
/// - `dispose`：若仍有事务则回滚（视为被放弃的操作），然后关闭连接；可重复调用。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SqlSession: Send {
    async fn open(&mut self) -> Result<(), SessionError>;
    async fn begin(&mut self) -> Result<(), SessionError>;
    async fn commit(&mut self) -> Result<(), SessionError>;
    async fn rollback(&mut self) -> Result<(), SessionError>;
    async fn dispose(&mut self) -> Result<(), SessionError>;
    fn state(&self) -> SessionState;
}

/// 一个请求作用域内由管道行为与存储过程共同持有的会话句柄。
pub type SharedSession<S> = Arc<Mutex<S>>;

/// 为每个请求作用域 / 每次工作迭代创建独立的会话
pub trait SessionFactory: Send + Sync {
    type Session: SqlSession + 'static;

    fn create(&self) -> Self::Session;

    fn create_shared(&self) -> SharedSession<Self::Session> {
        Arc::new(Mutex::new(self.create()))
    }
}
