//! 数据库连接池与会话

pub mod procedures;
pub mod session;

use domain::RepositoryError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub use procedures::{PgHealthCheckProcedures, PgLinesProcedures};
pub use session::{PgRequestScope, PgSessionFactory, PgSqlSession};

pub async fn create_pg_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

pub(crate) fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    RepositoryError::storage_with_source(err.to_string(), err)
}
