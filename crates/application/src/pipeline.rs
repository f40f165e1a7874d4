//! 请求管道
//!
//! 每个请求依次经过两层行为再到达处理器：
//! `ConnectionBehavior`（确保连接已打开）→ `TransactionBehavior`（非只读请求包裹在事务中）→ handler。
//! 只读请求完全跳过事务：不 begin、不 commit、不 rollback。

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ApplicationError;
use crate::session::{SessionState, SharedSession, SqlSession};

/// 请求的访问性质，在类型上声明而不是运行时判断
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAccess {
    ReadOnly,
    Mutating,
}

pub trait Request: Send + 'static {
    type Response: Send;

    fn name(&self) -> &'static str;

    fn access(&self) -> RequestAccess {
        RequestAccess::Mutating
    }
}

#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync {
    async fn handle(&self, request: R) -> Result<R::Response, ApplicationError>;
}

/// 在调用下游之前确保会话连接已打开
pub struct ConnectionBehavior<S> {
    session: SharedSession<S>,
}

impl<S: SqlSession> ConnectionBehavior<S> {
    pub fn new(session: SharedSession<S>) -> Self {
        Self { session }
    }

    pub async fn handle<T, F, Fut>(&self, request_name: &'static str, next: F) -> Result<T, ApplicationError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, ApplicationError>> + Send,
    {
        self.session.lock().await.open().await?;
        debug!(request = request_name, "数据库连接已就绪");
        next().await
    }
}

/// 为修改型请求提供 begin / commit / rollback
pub struct TransactionBehavior<S> {
    session: SharedSession<S>,
}

impl<S: SqlSession> TransactionBehavior<S> {
    pub fn new(session: SharedSession<S>) -> Self {
        Self { session }
    }

    pub async fn handle<T, F, Fut>(
        &self,
        request_name: &'static str,
        access: RequestAccess,
        next: F,
    ) -> Result<T, ApplicationError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, ApplicationError>> + Send,
    {
        if access == RequestAccess::ReadOnly {
            debug!(request = request_name, "只读请求，跳过事务");
            return next().await;
        }

        self.session.lock().await.begin().await?;
        debug!(request = request_name, "事务已开启");

        match next().await {
            Ok(response) => {
                self.session.lock().await.commit().await?;
                info!(request = request_name, "事务已提交");
                Ok(response)
            }
            Err(err) => {
                error!(request = request_name, error = %err, "请求处理失败，回滚事务");
                // 回滚失败不能掩盖原始错误
                if let Err(rollback_err) = self.session.lock().await.rollback().await {
                    error!(
                        request = request_name,
                        error = %rollback_err,
                        "事务回滚失败"
                    );
                }
                Err(err)
            }
        }
    }
}

/// 请求作用域内的管道：一个会话、两层行为
pub struct RequestPipeline<S> {
    session: SharedSession<S>,
    connection: ConnectionBehavior<S>,
    transaction: TransactionBehavior<S>,
}

impl<S: SqlSession> RequestPipeline<S> {
    pub fn new(session: SharedSession<S>) -> Self {
        Self {
            connection: ConnectionBehavior::new(session.clone()),
            transaction: TransactionBehavior::new(session.clone()),
            session,
        }
    }

    pub fn session(&self) -> SharedSession<S> {
        self.session.clone()
    }

    /// 发送请求。取消令牌触发时立即返回 `Cancelled`，未完成的事务被回滚。
    pub async fn send<R, H>(
        &self,
        handler: &H,
        request: R,
        cancel: &CancellationToken,
    ) -> Result<R::Response, ApplicationError>
    where
        R: Request,
        H: RequestHandler<R> + ?Sized,
    {
        let name = request.name();
        let access = request.access();

        let run = self.connection.handle(name, move || {
            self.transaction
                .handle(name, access, move || handler.handle(request))
        });

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = run => Some(result),
        };

        match outcome {
            Some(result) => result,
            None => {
                info!(request = name, "请求已取消");
                self.abandon(name).await;
                Err(ApplicationError::Cancelled)
            }
        }
    }

    /// 释放会话；仍处于事务中的工作被回滚。可重复调用。
    pub async fn dispose(&self) -> Result<(), ApplicationError> {
        self.session.lock().await.dispose().await?;
        Ok(())
    }

    async fn abandon(&self, request_name: &'static str) {
        let mut session = self.session.lock().await;
        if session.state() == SessionState::InTransaction {
            if let Err(err) = session.rollback().await {
                warn!(request = request_name, error = %err, "取消后回滚失败");
            }
        }
    }
}
