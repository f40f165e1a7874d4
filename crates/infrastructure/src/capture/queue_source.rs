//! 遗留队列捕获源
//!
//! 队列是一张表：接收即在当前事务中标记 `received_at`（`FOR UPDATE SKIP LOCKED`），
//! 结束会话即删除该行。事务回滚时消息重新可见。
//! 入队默认关闭，捕获源启动时通过 `line_change_queue_settings` 打开。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use application::{
    ApplicationError, CaptureError, ChangeQueue, ChangeSource, NotificationPublisher, QueueMessage,
    ReceiveChangeMessageCommand, ReceiveChangeMessageHandler, ReceiveOutcome, SharedSession,
};
use async_trait::async_trait;
use domain::RepositoryError;
use sqlx::{FromRow, PgPool};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::db::{map_sqlx_err, PgSessionFactory, PgSqlSession};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, FromRow)]
struct QueueRow {
    conversation_handle: Uuid,
    message_body: String,
}

pub struct PgChangeQueue {
    session: SharedSession<PgSqlSession>,
    excluded: Vec<Uuid>,
}

impl PgChangeQueue {
    pub fn new(session: SharedSession<PgSqlSession>) -> Self {
        Self {
            session,
            excluded: Vec::new(),
        }
    }

    /// 跳过这些会话句柄（已作废的消息）
    pub fn excluding(mut self, handles: impl IntoIterator<Item = Uuid>) -> Self {
        self.excluded = handles.into_iter().collect();
        self
    }

    /// 打开入队开关；此后 `lines` 上的变更才会写入队列
    pub async fn enable(pool: &PgPool) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE line_change_queue_settings SET enabled = TRUE")
            .execute(pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn try_receive(&self) -> Result<Option<QueueMessage>, RepositoryError> {
        let mut session = self.session.lock().await;
        let row = sqlx::query_as::<_, QueueRow>(
            r#"
            UPDATE line_change_queue
            SET received_at = now()
            WHERE conversation_handle = (
                SELECT conversation_handle
                FROM line_change_queue
                WHERE received_at IS NULL
                  AND NOT (conversation_handle = ANY($1))
                ORDER BY enqueued_at
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING conversation_handle, message_body
            "#,
        )
        .bind(&self.excluded)
        .fetch_optional(session.connection().await?)
        .await
        .map_err(map_sqlx_err)?;

        Ok(row.map(|row| QueueMessage {
            conversation_handle: row.conversation_handle,
            body: row.message_body,
        }))
    }
}

#[async_trait]
impl ChangeQueue for PgChangeQueue {
    async fn receive(&self, timeout: Duration) -> Result<Option<QueueMessage>, RepositoryError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(message) = self.try_receive().await? {
                return Ok(Some(message));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn end_conversation(&self, conversation_handle: Uuid) -> Result<(), RepositoryError> {
        let mut session = self.session.lock().await;
        let result = sqlx::query("DELETE FROM line_change_queue WHERE conversation_handle = $1")
            .bind(conversation_handle)
            .execute(session.connection().await?)
            .await
            .map_err(map_sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

pub struct QueueChangeSource {
    sessions: PgSessionFactory,
    publisher: NotificationPublisher,
    receive_timeout: Duration,
    abandoned: HashSet<Uuid>,
}

impl QueueChangeSource {
    pub fn new(sessions: PgSessionFactory, publisher: NotificationPublisher, receive_timeout: Duration) -> Self {
        Self {
            sessions,
            publisher,
            receive_timeout,
            abandoned: HashSet::new(),
        }
    }

    /// 无法结束会话而作废的消息句柄
    pub fn abandoned(&self) -> &HashSet<Uuid> {
        &self.abandoned
    }

    /// 一次迭代：独立的请求作用域，接收、物化、结束会话在同一事务中完成
    async fn receive_once(&self, cancel: &CancellationToken) -> Result<ReceiveOutcome, ApplicationError> {
        let scope = self.sessions.scope();
        let queue = PgChangeQueue::new(scope.session()).excluding(self.abandoned.iter().copied());
        let handler = ReceiveChangeMessageHandler::new(Arc::new(queue), scope.lines());
        let command = ReceiveChangeMessageCommand {
            timeout: self.receive_timeout,
        };

        let result = scope.pipeline().send(&handler, command, cancel).await;
        scope.dispose().await;
        result
    }

    /// 处理一次迭代的结果；返回 `Some` 时结束轮询
    async fn apply(&mut self, outcome: Result<ReceiveOutcome, ApplicationError>) -> Option<Result<(), CaptureError>> {
        match outcome {
            Ok(ReceiveOutcome::Idle) => debug!("队列等待超时，继续等待"),
            Ok(ReceiveOutcome::Discarded) => debug!("队列消息已丢弃"),
            Ok(ReceiveOutcome::Received(event)) => {
                let report = self.publisher.publish(&event).await;
                debug!(
                    operation = event.operation_kind().as_str(),
                    delivered = report.delivered,
                    failed = report.failed,
                    "队列变更已发布"
                );
            }
            Err(ApplicationError::Cancelled) => return Some(Ok(())),
            Err(ApplicationError::Conversation { handle, message }) => {
                // 事务已回滚，消息重新可见；记下句柄使其不再被接收
                error!(conversation = %handle, error = %message, "队列消息作废，不再重试");
                self.abandoned.insert(handle);
            }
            Err(err) => return Some(Err(CaptureError::Application(err))),
        }
        None
    }
}

#[async_trait]
impl ChangeSource for QueueChangeSource {
    fn name(&self) -> &'static str {
        "legacy-queue"
    }

    async fn start(&mut self, cancel: CancellationToken) -> Result<(), CaptureError> {
        PgChangeQueue::enable(self.sessions.pool())
            .await
            .map_err(|err| CaptureError::transport(format!("无法启用变更队列: {}", err)))?;
        info!(timeout_secs = self.receive_timeout.as_secs(), "开始轮询变更队列");

        while !cancel.is_cancelled() {
            let outcome = self.receive_once(&cancel).await;
            if let Some(result) = self.apply(outcome).await {
                return result;
            }
        }

        Ok(())
    }
}
