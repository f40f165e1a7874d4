use application::{HealthCheckProcedures, LinesProcedures, SharedSession};
use async_trait::async_trait;
use domain::{DatabaseHealth, LineId, LineRecord, RepositoryError};
use sqlx::FromRow;
use uuid::Uuid;

use super::map_sqlx_err;
use super::session::PgSqlSession;

#[derive(Debug, FromRow)]
struct LineRow {
    id: Uuid,
    latitude: f64,
    longitude: f64,
    line_code: String,
}

impl From<LineRow> for LineRecord {
    fn from(value: LineRow) -> Self {
        LineRecord::new(LineId::from(value.id), value.latitude, value.longitude, value.line_code)
    }
}

#[derive(Debug, FromRow)]
struct HealthRow {
    database_name: String,
    status: String,
}

/// 线路段存储过程，在请求作用域的会话连接上执行
pub struct PgLinesProcedures {
    session: SharedSession<PgSqlSession>,
}

impl PgLinesProcedures {
    pub fn new(session: SharedSession<PgSqlSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl LinesProcedures for PgLinesProcedures {
    async fn retrieve_lines_data(&self) -> Result<Vec<LineRecord>, RepositoryError> {
        let mut session = self.session.lock().await;
        let rows = sqlx::query_as::<_, LineRow>(
            "SELECT id, latitude, longitude, line_code FROM usp_get_lines_data()",
        )
        .fetch_all(session.connection().await?)
        .await
        .map_err(map_sqlx_err)?;

        Ok(rows.into_iter().map(LineRecord::from).collect())
    }

    async fn retrieve_lines_by_ids(&self, ids: &[LineId]) -> Result<Vec<LineRecord>, RepositoryError> {
        let mut session = self.session.lock().await;
        let conn = session.connection().await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = ids.iter().map(|id| Uuid::from(*id)).collect();
        let rows = sqlx::query_as::<_, LineRow>(
            r#"
            SELECT id, latitude, longitude, line_code
            FROM lines
            WHERE id = ANY($1)
            ORDER BY line_code, id
            "#,
        )
        .bind(ids)
        .fetch_all(conn)
        .await
        .map_err(map_sqlx_err)?;

        Ok(rows.into_iter().map(LineRecord::from).collect())
    }
}

pub struct PgHealthCheckProcedures {
    session: SharedSession<PgSqlSession>,
}

impl PgHealthCheckProcedures {
    pub fn new(session: SharedSession<PgSqlSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl HealthCheckProcedures for PgHealthCheckProcedures {
    async fn check_database_health(&self) -> Result<DatabaseHealth, RepositoryError> {
        let mut session = self.session.lock().await;
        let row = sqlx::query_as::<_, HealthRow>(
            "SELECT database_name, status FROM usp_database_health_check()",
        )
        .fetch_optional(session.connection().await?)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(RepositoryError::NotFound)?;

        Ok(DatabaseHealth {
            database_name: row.database_name,
            status: row.status,
        })
    }
}
