use serde::{Deserialize, Serialize};

use crate::value_objects::LineId;

/// 线路段（地理坐标点 + 线路编码），读取时刻的不可变快照。
///
/// 对客户端以 camelCase 序列化；反序列化同时接受 CDC 连接器常见的
/// PascalCase / snake_case 列名。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRecord {
    #[serde(alias = "Id")]
    pub id: LineId,
    #[serde(alias = "Latitude")]
    pub latitude: f64,
    #[serde(alias = "Longitude")]
    pub longitude: f64,
    #[serde(alias = "LineCode", alias = "line_code")]
    pub line_code: String,
}

impl LineRecord {
    pub fn new(id: LineId, latitude: f64, longitude: f64, line_code: impl Into<String>) -> Self {
        Self {
            id,
            latitude,
            longitude,
            line_code: line_code.into(),
        }
    }
}
