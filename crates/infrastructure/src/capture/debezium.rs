//! Debezium 变更信封解析
//!
//! 接受带 `{schema, payload}` 包装或不带包装的信封。
//! `op`：`c`/`r` → Insert，`u` → Update（取 `after`），`d` → Delete（取 `before` 的标识）。
//! 空值（tombstone）返回 `None`。

use application::EnvelopeError;
use domain::{ChangeEvent, LineRecord};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Envelope {
    op: String,
    #[serde(default)]
    before: Option<LineRecord>,
    #[serde(default)]
    after: Option<LineRecord>,
}

pub fn parse_change_envelope(bytes: Option<&[u8]>) -> Result<Option<ChangeEvent>, EnvelopeError> {
    let bytes = match bytes {
        Some(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => bytes,
        _ => return Ok(None),
    };

    let value: Value =
        serde_json::from_slice(bytes).map_err(|err| EnvelopeError::malformed(err.to_string()))?;

    let body = match value {
        Value::Object(mut map) if map.contains_key("payload") && !map.contains_key("op") => {
            map.remove("payload").unwrap_or(Value::Null)
        }
        other => other,
    };
    if body.is_null() {
        return Ok(None);
    }

    let envelope: Envelope =
        serde_json::from_value(body).map_err(|err| EnvelopeError::malformed(err.to_string()))?;

    let event = match envelope.op.as_str() {
        "c" | "r" => ChangeEvent::inserted(vec![envelope.after.ok_or(EnvelopeError::MissingField("after"))?]),
        "u" => ChangeEvent::updated(vec![envelope.after.ok_or(EnvelopeError::MissingField("after"))?]),
        "d" => {
            let before = envelope.before.ok_or(EnvelopeError::MissingField("before"))?;
            ChangeEvent::deleted(vec![before.id])?
        }
        other => return Err(EnvelopeError::UnsupportedOperation(other.to_string())),
    };

    Ok(Some(event))
}

#[cfg(test)]
mod tests {
    use domain::OperationKind;

    use super::*;

    const ID: &str = "11111111-1111-1111-1111-111111111111";

    #[test]
    fn unwraps_schema_payload_envelope() {
        let raw = format!(
            r#"{{"schema":{{"type":"struct"}},"payload":{{"op":"u","before":null,
               "after":{{"Id":"{ID}","Latitude":1.5,"Longitude":2.5,"LineCode":"L-7"}}}}}}"#
        );

        let event = parse_change_envelope(Some(raw.as_bytes())).unwrap().unwrap();

        assert_eq!(event.operation_kind(), OperationKind::Update);
        assert_eq!(event.affected_ids()[0].to_string(), ID);
        assert_eq!(event.payload()[0].line_code, "L-7");
    }

    #[test]
    fn bare_envelope_snapshot_read_is_insert() {
        let raw = format!(
            r#"{{"op":"r","after":{{"id":"{ID}","latitude":0.0,"longitude":0.0,"line_code":"A"}}}}"#
        );

        let event = parse_change_envelope(Some(raw.as_bytes())).unwrap().unwrap();
        assert_eq!(event.operation_kind(), OperationKind::Insert);
    }

    #[test]
    fn delete_uses_before_image_ids_only() {
        let raw = format!(
            r#"{{"op":"d","before":{{"Id":"{ID}","Latitude":1,"Longitude":2,"LineCode":"gone"}},"after":null}}"#
        );

        let event = parse_change_envelope(Some(raw.as_bytes())).unwrap().unwrap();

        assert_eq!(event.operation_kind(), OperationKind::Delete);
        assert!(event.payload().is_empty());
        assert_eq!(event.affected_ids()[0].to_string(), ID);
    }

    #[test]
    fn tombstones_are_ignored() {
        assert!(parse_change_envelope(None).unwrap().is_none());
        assert!(parse_change_envelope(Some(b"null")).unwrap().is_none());
        assert!(parse_change_envelope(Some(br#"{"schema":null,"payload":null}"#)).unwrap().is_none());
    }

    #[test]
    fn malformed_payloads_are_errors() {
        assert!(matches!(
            parse_change_envelope(Some(b"{not json")),
            Err(EnvelopeError::Malformed(_))
        ));
        assert!(matches!(
            parse_change_envelope(Some(br#"{"op":"t"}"#)),
            Err(EnvelopeError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            parse_change_envelope(Some(br#"{"op":"u","after":null}"#)),
            Err(EnvelopeError::MissingField("after"))
        ));
    }
}
