use async_trait::async_trait;
use application::{ApplicationError, LinesDataQuery, LinesDataQueryHandler};
use domain::LineRecord;
use infrastructure::PgSessionFactory;
use tokio_util::sync::CancellationToken;

/// 新连接建立时发给调用方的完整线路集合
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self, cancel: &CancellationToken) -> Result<Vec<LineRecord>, ApplicationError>;
}

/// 每次快照一个独立的请求作用域，经由管道执行只读查询
pub struct PgSnapshotSource {
    sessions: PgSessionFactory,
}

impl PgSnapshotSource {
    pub fn new(sessions: PgSessionFactory) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl SnapshotSource for PgSnapshotSource {
    async fn snapshot(&self, cancel: &CancellationToken) -> Result<Vec<LineRecord>, ApplicationError> {
        let scope = self.sessions.scope();
        let handler = LinesDataQueryHandler::new(scope.lines());
        let result = scope.pipeline().send(&handler, LinesDataQuery, cancel).await;
        scope.dispose().await;
        result
    }
}
