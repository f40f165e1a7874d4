use std::sync::Arc;

use async_trait::async_trait;
use domain::{DatabaseHealth, LineRecord};
use tracing::debug;

use crate::error::ApplicationError;
use crate::pipeline::{Request, RequestAccess, RequestHandler};
use crate::procedures::{HealthCheckProcedures, LinesProcedures};

/// 读取完整的线路段集合，用于新连接的快照
#[derive(Debug, Clone, Copy, Default)]
pub struct LinesDataQuery;

impl Request for LinesDataQuery {
    type Response = Vec<LineRecord>;

    fn name(&self) -> &'static str {
        "LinesDataQuery"
    }

    fn access(&self) -> RequestAccess {
        RequestAccess::ReadOnly
    }
}

pub struct LinesDataQueryHandler {
    procedures: Arc<dyn LinesProcedures>,
}

impl LinesDataQueryHandler {
    pub fn new(procedures: Arc<dyn LinesProcedures>) -> Self {
        Self { procedures }
    }
}

#[async_trait]
impl RequestHandler<LinesDataQuery> for LinesDataQueryHandler {
    async fn handle(&self, _request: LinesDataQuery) -> Result<Vec<LineRecord>, ApplicationError> {
        let lines = self.procedures.retrieve_lines_data().await?;
        debug!(count = lines.len(), "线路段快照已读取");
        Ok(lines)
    }
}

/// 启动时的数据库健康检查
#[derive(Debug, Clone, Copy, Default)]
pub struct DatabaseHealthCheckQuery;

impl Request for DatabaseHealthCheckQuery {
    type Response = DatabaseHealth;

    fn name(&self) -> &'static str {
        "DatabaseHealthCheckQuery"
    }

    fn access(&self) -> RequestAccess {
        RequestAccess::ReadOnly
    }
}

pub struct DatabaseHealthCheckHandler {
    procedures: Arc<dyn HealthCheckProcedures>,
}

impl DatabaseHealthCheckHandler {
    pub fn new(procedures: Arc<dyn HealthCheckProcedures>) -> Self {
        Self { procedures }
    }
}

#[async_trait]
impl RequestHandler<DatabaseHealthCheckQuery> for DatabaseHealthCheckHandler {
    async fn handle(&self, _request: DatabaseHealthCheckQuery) -> Result<DatabaseHealth, ApplicationError> {
        Ok(self.procedures.check_database_health().await?)
    }
}

#[cfg(test)]
mod tests {
    use domain::{LineId, RepositoryError};
    use uuid::Uuid;

    use super::*;
    use crate::procedures::{MockHealthCheckProcedures, MockLinesProcedures};

    #[tokio::test]
    async fn lines_query_returns_procedure_rows() {
        let mut procedures = MockLinesProcedures::new();
        procedures.expect_retrieve_lines_data().times(1).returning(|| {
            Ok(vec![LineRecord::new(LineId::new(Uuid::new_v4()), 1.0, 2.0, "A1")])
        });

        let handler = LinesDataQueryHandler::new(Arc::new(procedures));
        let lines = handler.handle(LinesDataQuery).await.unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].line_code, "A1");
        assert_eq!(LinesDataQuery.access(), RequestAccess::ReadOnly);
    }

    #[tokio::test]
    async fn lines_query_surfaces_invalid_session() {
        let mut procedures = MockLinesProcedures::new();
        procedures
            .expect_retrieve_lines_data()
            .returning(|| Err(RepositoryError::invalid_state("session is not open")));

        let handler = LinesDataQueryHandler::new(Arc::new(procedures));
        let err = handler.handle(LinesDataQuery).await.unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Repository(RepositoryError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn health_check_reports_database() {
        let mut procedures = MockHealthCheckProcedures::new();
        procedures.expect_check_database_health().returning(|| {
            Ok(DatabaseHealth {
                database_name: "tms".into(),
                status: "ONLINE".into(),
            })
        });

        let handler = DatabaseHealthCheckHandler::new(Arc::new(procedures));
        let health = handler.handle(DatabaseHealthCheckQuery).await.unwrap();
        assert_eq!(health.database_name, "tms");
    }
}
