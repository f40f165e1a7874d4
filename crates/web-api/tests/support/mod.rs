use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use application::ApplicationError;
use async_trait::async_trait;
use domain::{LineId, LineRecord};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use web_api::{router, AppState, HubBroadcaster, LinesHub, SnapshotSource};

pub const SNAPSHOT_ID: &str = "11111111-1111-1111-1111-111111111111";

/// 固定内容的快照，替代数据库
pub struct StaticSnapshot(pub Vec<LineRecord>);

#[async_trait]
impl SnapshotSource for StaticSnapshot {
    async fn snapshot(&self, _cancel: &CancellationToken) -> Result<Vec<LineRecord>, ApplicationError> {
        Ok(self.0.clone())
    }
}

/// 读取耗时较长的快照，用于检查快照与增量广播的先后顺序
pub struct SlowSnapshot {
    pub delay: Duration,
    pub lines: Vec<LineRecord>,
}

#[async_trait]
impl SnapshotSource for SlowSnapshot {
    async fn snapshot(&self, _cancel: &CancellationToken) -> Result<Vec<LineRecord>, ApplicationError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.lines.clone())
    }
}

pub fn snapshot_line() -> LineRecord {
    LineRecord::new(
        LineId::new(Uuid::parse_str(SNAPSHOT_ID).unwrap()),
        51.5,
        -0.12,
        "L-01",
    )
}

pub struct TestHub {
    pub addr: SocketAddr,
    pub hub: LinesHub,
    pub shutdown: CancellationToken,
}

pub async fn spawn_hub() -> TestHub {
    spawn_hub_with(Arc::new(StaticSnapshot(vec![snapshot_line()]))).await
}

pub async fn spawn_hub_with(snapshots: Arc<dyn SnapshotSource>) -> TestHub {
    let hub = LinesHub::new();
    let shutdown = CancellationToken::new();

    let state = AppState::new(
        hub.clone(),
        Arc::new(HubBroadcaster::new(hub.clone(), None)),
        snapshots,
        shutdown.clone(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = router(state, "linesHub");
    let graceful = shutdown.clone();

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move { graceful.cancelled().await })
            .await
            .ok();
    });

    TestHub { addr, hub, shutdown }
}
