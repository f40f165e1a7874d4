//! 变更捕获进程入口

use config::AppConfig;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("配置加载失败: {}", e))?;
    info!(config = %config.sanitize(), mode = ?config.capture.mode, "Capture Worker 启动中...");

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("收到退出信号，正在停止捕获");
        }
        signal.cancel();
    });

    capture_worker::run(config, cancel).await?;

    info!("Capture Worker 已退出");
    Ok(())
}
