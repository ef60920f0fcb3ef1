use crate::intake::taxonomy::{make_error, ErrorCode, ErrorEnvelope};
use serde_json::Value;

/// The fixed set of command kinds the desk accepts. Anything else is rejected
/// at the door with UNKNOWN_COMMAND_KIND.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    IngestQuote,
    IngestEvent,
    RequestSnapshot,
    RequestCompute,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IngestQuote => "INGEST_QUOTE",
            Self::IngestEvent => "INGEST_EVENT",
            Self::RequestSnapshot => "REQUEST_SNAPSHOT",
            Self::RequestCompute => "REQUEST_COMPUTE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INGEST_QUOTE" => Some(Self::IngestQuote),
            "INGEST_EVENT" => Some(Self::IngestEvent),
            "REQUEST_SNAPSHOT" => Some(Self::RequestSnapshot),
            "REQUEST_COMPUTE" => Some(Self::RequestCompute),
            _ => None,
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported schema versions per kind. INGEST_QUOTE v2 adds optional quote
/// metadata; intake treats both shapes identically.
const SUPPORTED_VERSIONS: &[(CommandKind, &[i64])] = &[
    (CommandKind::IngestQuote, &[1, 2]),
    (CommandKind::IngestEvent, &[1]),
    (CommandKind::RequestSnapshot, &[1]),
    (CommandKind::RequestCompute, &[1]),
];

pub fn supported_versions(kind: CommandKind) -> &'static [i64] {
    SUPPORTED_VERSIONS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, v)| *v)
        .unwrap_or(&[])
}

/// The immutable command envelope. Built from raw JSON only after
/// [`validate_command`] has passed; never mutated afterwards.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub schema_version: i64,
    #[serde(default)]
    pub command_id: String,
    #[serde(default)]
    pub session_id: String,
    pub payload: Value,
    #[serde(default)]
    pub client_sequence: Option<i64>,
    /// Per-command enforcement override; absent means the service default.
    #[serde(default)]
    pub strict: Option<bool>,
    /// Free-form caller metadata. Never part of identity or fingerprint.
    #[serde(default)]
    pub meta: Option<Value>,
}

impl Command {
    pub fn from_raw(raw: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(raw.clone())
    }
}

/// Reject any kind outside the allow-list.
pub fn validate_command_kind(kind: &str) -> Option<ErrorEnvelope> {
    if CommandKind::parse(kind).is_some() {
        return None;
    }
    Some(make_error(
        ErrorCode::UnknownCommandKind,
        &[("kind", kind.to_string())],
    ))
}

/// Structural validation of a raw command. Check order is a hard contract:
///   1. kind present and known
///   2. schema_version present and an integer
///   3. schema_version supported for that kind
///   4. payload present and structurally sound
/// A payload error must never surface before a kind or version error.
/// No side effects.
pub fn validate_command(raw: &Value) -> Option<ErrorEnvelope> {
    let kind_str = raw.get("kind").and_then(Value::as_str).unwrap_or("");
    let kind = match CommandKind::parse(kind_str) {
        Some(k) => k,
        None => return validate_command_kind(kind_str),
    };

    let version = match raw.get("schema_version").and_then(Value::as_i64) {
        Some(v) => v,
        None => {
            let observed = raw
                .get("schema_version")
                .map(json_type_name)
                .unwrap_or("absent");
            return Some(make_error(
                ErrorCode::MissingSchemaVersion,
                &[("kind", kind_str.to_string()), ("observed", observed.to_string())],
            ));
        }
    };

    let supported = supported_versions(kind);
    if !supported.contains(&version) {
        let supported_str = supported
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        return Some(make_error(
            ErrorCode::UnsupportedSchemaVersion,
            &[
                ("kind", kind_str.to_string()),
                ("schema_version", version.to_string()),
                ("supported", supported_str),
            ],
        ));
    }

    validate_payload(kind, raw.get("payload"))
}

fn validate_payload(kind: CommandKind, payload: Option<&Value>) -> Option<ErrorEnvelope> {
    let payload = match payload {
        None | Some(Value::Null) => {
            return Some(make_error(
                ErrorCode::MissingPayload,
                &[("kind", kind.as_str().to_string())],
            ));
        }
        Some(p) => p,
    };

    if !payload.is_object() {
        return Some(make_error(
            ErrorCode::InvalidPayload,
            &[
                ("kind", kind.as_str().to_string()),
                ("observed", json_type_name(payload).to_string()),
            ],
        ));
    }

    if let Some(event_type) = payload.get("event_type") {
        if !event_type.is_string() && !event_type.is_null() {
            return Some(make_error(
                ErrorCode::InvalidPayload,
                &[
                    ("kind", kind.as_str().to_string()),
                    ("field", "event_type".to_string()),
                    ("observed", json_type_name(event_type).to_string()),
                ],
            ));
        }
    }

    if let Some(data) = payload.get("data") {
        if !data.is_object() && !data.is_null() {
            return Some(make_error(
                ErrorCode::InvalidPayload,
                &[
                    ("kind", kind.as_str().to_string()),
                    ("field", "data".to_string()),
                    ("observed", json_type_name(data).to_string()),
                ],
            ));
        }
    }

    None
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_kinds_pass() {
        assert!(validate_command_kind("INGEST_QUOTE").is_none());
        assert!(validate_command_kind("INGEST_EVENT").is_none());
        assert!(validate_command_kind("REQUEST_SNAPSHOT").is_none());
        assert!(validate_command_kind("REQUEST_COMPUTE").is_none());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = validate_command_kind("DELETE_EVERYTHING").unwrap();
        assert_eq!(err.code, ErrorCode::UnknownCommandKind);
        assert_eq!(err.details.get("kind").unwrap(), "DELETE_EVERYTHING");
    }

    #[test]
    fn test_valid_command_passes() {
        let raw = json!({
            "kind": "INGEST_QUOTE",
            "schema_version": 1,
            "command_id": "c-1",
            "session_id": "s-1",
            "payload": {"event_type": "quote", "data": {"symbol": "AAPL", "price": 187.5}},
        });
        assert!(validate_command(&raw).is_none());
    }

    #[test]
    fn test_unknown_kind_takes_precedence_over_everything() {
        // schema_version missing AND payload garbage; kind error must win
        let raw = json!({"kind": "NOPE", "payload": 42});
        let err = validate_command(&raw).unwrap();
        assert_eq!(err.code, ErrorCode::UnknownCommandKind);
    }

    #[test]
    fn test_missing_schema_version_takes_precedence_over_payload() {
        // payload is structurally broken, but the version error must surface first
        let raw = json!({"kind": "INGEST_QUOTE", "payload": "not an object"});
        let err = validate_command(&raw).unwrap();
        assert_eq!(err.code, ErrorCode::MissingSchemaVersion);
        assert_eq!(err.details.get("observed").unwrap(), "absent");
    }

    #[test]
    fn test_non_integer_schema_version_is_missing() {
        let raw = json!({"kind": "INGEST_QUOTE", "schema_version": "1", "payload": {}});
        let err = validate_command(&raw).unwrap();
        assert_eq!(err.code, ErrorCode::MissingSchemaVersion);
        assert_eq!(err.details.get("observed").unwrap(), "string");
    }

    #[test]
    fn test_unsupported_version_takes_precedence_over_payload() {
        let raw = json!({"kind": "INGEST_EVENT", "schema_version": 9, "payload": []});
        let err = validate_command(&raw).unwrap();
        assert_eq!(err.code, ErrorCode::UnsupportedSchemaVersion);
        assert_eq!(err.details.get("schema_version").unwrap(), "9");
        assert_eq!(err.details.get("supported").unwrap(), "1");
    }

    #[test]
    fn test_quote_v2_supported() {
        let raw = json!({
            "kind": "INGEST_QUOTE",
            "schema_version": 2,
            "payload": {"data": {"symbol": "TSLA", "price": 212.0}},
        });
        assert!(validate_command(&raw).is_none());
    }

    #[test]
    fn test_missing_payload() {
        let raw = json!({"kind": "REQUEST_SNAPSHOT", "schema_version": 1});
        let err = validate_command(&raw).unwrap();
        assert_eq!(err.code, ErrorCode::MissingPayload);

        let raw = json!({"kind": "REQUEST_SNAPSHOT", "schema_version": 1, "payload": null});
        let err = validate_command(&raw).unwrap();
        assert_eq!(err.code, ErrorCode::MissingPayload);
    }

    #[test]
    fn test_invalid_payload_shape() {
        let raw = json!({"kind": "INGEST_QUOTE", "schema_version": 1, "payload": [1, 2]});
        let err = validate_command(&raw).unwrap();
        assert_eq!(err.code, ErrorCode::InvalidPayload);
        assert_eq!(err.details.get("observed").unwrap(), "array");
    }

    #[test]
    fn test_invalid_payload_fields() {
        let raw = json!({
            "kind": "INGEST_EVENT",
            "schema_version": 1,
            "payload": {"event_type": 7, "data": {}},
        });
        let err = validate_command(&raw).unwrap();
        assert_eq!(err.code, ErrorCode::InvalidPayload);
        assert_eq!(err.details.get("field").unwrap(), "event_type");

        let raw = json!({
            "kind": "INGEST_EVENT",
            "schema_version": 1,
            "payload": {"event_type": "fill", "data": "scalar"},
        });
        let err = validate_command(&raw).unwrap();
        assert_eq!(err.details.get("field").unwrap(), "data");
    }

    #[test]
    fn test_envelope_parses_after_validation() {
        let raw = json!({
            "kind": "REQUEST_COMPUTE",
            "schema_version": 1,
            "command_id": "c-9",
            "session_id": "s-9",
            "payload": {"data": {"book": "desk-1"}},
            "client_sequence": 4,
            "strict": false,
            "meta": {"origin": "ui"},
        });
        assert!(validate_command(&raw).is_none());
        let cmd = Command::from_raw(&raw).unwrap();
        assert_eq!(cmd.kind, CommandKind::RequestCompute);
        assert_eq!(cmd.schema_version, 1);
        assert_eq!(cmd.client_sequence, Some(4));
        assert_eq!(cmd.strict, Some(false));
    }

    #[test]
    fn test_envelope_defaults_for_absent_identity() {
        let raw = json!({
            "kind": "INGEST_EVENT",
            "schema_version": 1,
            "payload": {"data": {}},
        });
        let cmd = Command::from_raw(&raw).unwrap();
        assert_eq!(cmd.command_id, "");
        assert_eq!(cmd.session_id, "");
        assert_eq!(cmd.client_sequence, None);
        assert!(cmd.meta.is_none());
    }
}
