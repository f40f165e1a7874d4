use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// 线路段唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(pub Uuid);

impl LineId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// 解析外部传入的标识（CDC 信封、队列消息）。
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|err| DomainError::validation_error("id", err.to_string()))
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LineId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for LineId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<LineId> for Uuid {
    fn from(value: LineId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_guid_with_whitespace() {
        let id = LineId::parse(" 11111111-1111-1111-1111-111111111111 ").unwrap();
        assert_eq!(id.to_string(), "11111111-1111-1111-1111-111111111111");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            LineId::parse("not-a-guid"),
            Err(DomainError::ValidationError { .. })
        ));
    }

    #[test]
    fn serializes_as_bare_string() {
        let id = LineId::parse("11111111-1111-1111-1111-111111111111").unwrap();
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"11111111-1111-1111-1111-111111111111\""
        );
    }
}
