//! 线路集线器入口
//!
//! 启动 Axum WebSocket 集线器：客户端连接、快照下发以及捕获进程的发布入口。

use std::sync::Arc;

use application::HubClient;
use config::AppConfig;
use infrastructure::{create_pg_pool, PgSessionFactory, MIGRATOR};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, HubBroadcaster, LinesHub, PgSnapshotSource, RedisBackplane};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("配置加载失败: {}", e))?;
    tracing::info!(config = %config.sanitize(), "Lines Hub 启动中...");

    let pg_pool = create_pg_pool(&config.database.url, config.database.max_connections).await?;

    // 运行迁移
    MIGRATOR.run(&pg_pool).await?;

    let sessions = PgSessionFactory::new(pg_pool.clone());
    let shutdown = CancellationToken::new();

    // 存储不可达时尽早失败
    let health = sessions.check_health(&shutdown).await?;
    tracing::info!(database = %health.database_name, status = %health.status, "数据库健康检查通过");

    let hub = LinesHub::new();
    let backplane = match config.hub.redis_url.as_deref() {
        Some(redis_url) => {
            let backplane = RedisBackplane::connect(redis_url, config.hub.redis_channel.clone()).await?;
            backplane.spawn_relay(hub.clone(), shutdown.clone());
            tracing::info!(channel = %backplane.channel(), "已启用 Redis 背板");
            Some(backplane)
        }
        None => None,
    };

    let broadcaster: Arc<dyn HubClient> = Arc::new(HubBroadcaster::new(hub.clone(), backplane));
    let snapshots = Arc::new(PgSnapshotSource::new(sessions));
    let state = AppState::new(hub, broadcaster, snapshots, shutdown.clone());

    let app = router(state, &config.hub.path).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        "线路集线器启动在 ws://{}/{}",
        addr,
        config.hub.path.trim_matches('/')
    );

    let embedded_capture = config.capture.embedded.then(|| {
        tracing::info!(mode = ?config.capture.mode, "在集线器进程内启动变更捕获");
        let capture_cancel = shutdown.clone();
        tokio::spawn(capture_worker::run_with_pool(
            config.clone(),
            pg_pool.clone(),
            capture_cancel,
        ))
    });

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("收到退出信号，正在关闭集线器");
                }
                _ = signal.cancelled() => {}
            }
            signal.cancel();
        })
        .await?;

    if let Some(capture) = embedded_capture {
        shutdown.cancel();
        match capture.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!(error = %err, "内嵌变更捕获异常退出"),
            Err(err) => tracing::error!(error = %err, "内嵌变更捕获任务失败"),
        }
    }

    tracing::info!("线路集线器已停止");
    Ok(())
}
