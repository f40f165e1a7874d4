use serde::{Deserialize, Serialize};

/// 数据库健康检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseHealth {
    pub database_name: String,
    pub status: String,
}
