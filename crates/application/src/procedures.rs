//! 存储过程访问接口
//!
//! 实现必须在请求作用域的会话上执行，会话未打开时返回 `RepositoryError::InvalidState`。

use async_trait::async_trait;
use domain::{DatabaseHealth, LineId, LineRecord, RepositoryError};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinesProcedures: Send + Sync {
    /// 读取全部线路段（`usp_get_lines_data`）
    async fn retrieve_lines_data(&self) -> Result<Vec<LineRecord>, RepositoryError>;

    /// 按标识读取当前行镜像，不存在的标识被忽略
    async fn retrieve_lines_by_ids(&self, ids: &[LineId]) -> Result<Vec<LineRecord>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthCheckProcedures: Send + Sync {
    /// `usp_database_health_check`
    async fn check_database_health(&self) -> Result<DatabaseHealth, RepositoryError>;
}
