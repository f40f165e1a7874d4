//! 集线器广播抽象
//!
//! 帧格式与集线器协议一致：`{"target": <方法名>, "arguments": [<载荷>]}`。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 广播方法名，客户端按名称订阅
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HubMethod {
    /// 插入/更新后的行镜像
    ReceiveLinesData,
    /// 被删除的行标识
    DeletedLinesData,
    /// 连接建立时发给调用方的完整快照
    ReceiveLines,
}

impl HubMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HubMethod::ReceiveLinesData => "ReceiveLinesData",
            HubMethod::DeletedLinesData => "DeletedLinesData",
            HubMethod::ReceiveLines => "ReceiveLines",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ReceiveLinesData" => Some(HubMethod::ReceiveLinesData),
            "DeletedLinesData" => Some(HubMethod::DeletedLinesData),
            "ReceiveLines" => Some(HubMethod::ReceiveLines),
            _ => None,
        }
    }
}

/// 集线器线上帧
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubFrame {
    pub target: String,
    #[serde(default)]
    pub arguments: Vec<serde_json::Value>,
}

impl HubFrame {
    pub fn new(method: HubMethod, payload: serde_json::Value) -> Self {
        Self {
            target: method.as_str().to_string(),
            arguments: vec![payload],
        }
    }

    pub fn method(&self) -> Option<HubMethod> {
        HubMethod::parse(&self.target)
    }
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast failed: {0}")]
    Failed(String),
    #[error("hub connection unavailable")]
    Disconnected,
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BroadcastError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// 向所有已连接的集线器客户端发送消息
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HubClient: Send + Sync {
    async fn broadcast(&self, frame: HubFrame) -> Result<(), BroadcastError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_wraps_payload_as_single_argument() {
        let frame = HubFrame::new(HubMethod::DeletedLinesData, serde_json::json!(["a"]));
        let text = serde_json::to_string(&frame).unwrap();
        assert_eq!(text, r#"{"target":"DeletedLinesData","arguments":[["a"]]}"#);
        assert_eq!(frame.method(), Some(HubMethod::DeletedLinesData));
    }

    #[test]
    fn unknown_target_has_no_method() {
        let frame: HubFrame = serde_json::from_str(r#"{"target":"Nope"}"#).unwrap();
        assert!(frame.method().is_none());
        assert!(frame.arguments.is_empty());
    }
}
