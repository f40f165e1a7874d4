//! 变更捕获抽象与监督循环
//!
//! 捕获源（LISTEN/NOTIFY、Kafka CDC、遗留队列）都实现 [`ChangeSource`]，
//! 由 [`CaptureSupervisor`] 统一托管：瞬时错误按固定间隔重启，取消时干净退出。

use std::time::Duration;

use async_trait::async_trait;
use domain::DomainError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::ApplicationError;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// 传输层错误（连接断开、订阅失败），可重试
    #[error("transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Application(#[from] ApplicationError),
    /// 配置或编程错误，重试无意义
    #[error("fatal capture error: {0}")]
    Fatal(String),
}

impl CaptureError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    pub fn is_transient(&self) -> bool {
        match self {
            CaptureError::Transport(_) => true,
            CaptureError::Application(err) => !err.is_cancelled(),
            CaptureError::Fatal(_) => false,
        }
    }
}

/// 变更信封解析错误，单条消息被跳过，不影响循环
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(String),
    #[error("envelope is missing `{0}`")]
    MissingField(&'static str),
    #[error("unsupported operation `{0}`")]
    UnsupportedOperation(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl EnvelopeError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

#[async_trait]
pub trait ChangeSource: Send {
    fn name(&self) -> &'static str;

    /// 运行捕获循环直到取消（返回 `Ok`）或出现无法在内部恢复的错误。
    async fn start(&mut self, cancel: CancellationToken) -> Result<(), CaptureError>;

    /// 释放订阅、连接等资源，可重复调用
    async fn stop(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }
}

/// 以固定间隔重启捕获源
#[derive(Debug, Clone, Copy)]
pub struct CaptureSupervisor {
    retry_delay: Duration,
}

impl CaptureSupervisor {
    pub fn new(retry_delay: Duration) -> Self {
        Self { retry_delay }
    }

    pub async fn run<S>(&self, source: &mut S, cancel: CancellationToken) -> Result<(), CaptureError>
    where
        S: ChangeSource + ?Sized,
    {
        let name = source.name();
        info!(source = name, "变更捕获启动");

        let result = loop {
            let outcome = source.start(cancel.clone()).await;

            if cancel.is_cancelled() {
                info!(source = name, "收到取消信号，停止变更捕获");
                break Ok(());
            }

            match outcome {
                Ok(()) => warn!(source = name, "捕获源意外结束，准备重启"),
                Err(err) if err.is_transient() => {
                    warn!(
                        source = name,
                        error = %err,
                        retry_in_ms = self.retry_delay.as_millis() as u64,
                        "捕获源出错，准备重启"
                    );
                }
                Err(err) => {
                    error!(source = name, error = %err, "捕获源发生致命错误");
                    break Err(err);
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(source = name, "等待重启期间收到取消信号");
                    break Ok(());
                }
                _ = tokio::time::sleep(self.retry_delay) => {}
            }
        };

        if let Err(err) = source.stop().await {
            warn!(source = name, error = %err, "释放捕获源资源失败");
        }
        info!(source = name, "变更捕获已停止");

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flaky {
        failures_left: usize,
        starts: usize,
        stopped: bool,
        fatal: bool,
    }

    #[async_trait]
    impl ChangeSource for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn start(&mut self, cancel: CancellationToken) -> Result<(), CaptureError> {
            self.starts += 1;
            if self.fatal {
                return Err(CaptureError::fatal("bad topic"));
            }
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(CaptureError::transport("broker unavailable"));
            }
            cancel.cancel();
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), CaptureError> {
            self.stopped = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn transient_failures_are_restarted() {
        let mut source = Flaky { failures_left: 2, starts: 0, stopped: false, fatal: false };
        let supervisor = CaptureSupervisor::new(Duration::from_millis(1));

        supervisor.run(&mut source, CancellationToken::new()).await.unwrap();

        assert_eq!(source.starts, 3);
        assert!(source.stopped);
    }

    #[tokio::test]
    async fn fatal_error_stops_supervision() {
        let mut source = Flaky { failures_left: 0, starts: 0, stopped: false, fatal: true };
        let supervisor = CaptureSupervisor::new(Duration::from_millis(1));

        let err = supervisor.run(&mut source, CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, CaptureError::Fatal(_)));
        assert_eq!(source.starts, 1);
        assert!(source.stopped);
    }

    #[tokio::test]
    async fn cancellation_during_backoff_exits_cleanly() {
        let mut source = Flaky { failures_left: usize::MAX, starts: 0, stopped: false, fatal: false };
        let supervisor = CaptureSupervisor::new(Duration::from_secs(3600));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        supervisor.run(&mut source, cancel).await.unwrap();
        assert_eq!(source.starts, 1);
    }

    #[test]
    fn cancellation_is_not_transient() {
        assert!(!CaptureError::Application(ApplicationError::Cancelled).is_transient());
        assert!(CaptureError::transport("x").is_transient());
    }
}
