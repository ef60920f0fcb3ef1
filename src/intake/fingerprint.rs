use crate::intake::schema::Command;
use crate::intake::taxonomy::{make_error, ErrorCode, ErrorEnvelope};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// The (session_id, command_id) pair used for deduplication lookups.
/// Total: absent fields become empty strings, never an error. Payload
/// contents play no part in identity.
pub fn identity(raw: &Value) -> (String, String) {
    let session_id = raw
        .get("session_id")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let command_id = raw
        .get("command_id")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    (session_id, command_id)
}

/// Content hash over the semantically meaningful parts of a command:
/// exactly {kind, event_type, data, client_sequence}. Envelope identifiers
/// and `meta` are excluded, so a retransmission with a fresh command_id but
/// identical content fingerprints the same. Missing payload is a hard error.
pub fn fingerprint(cmd: &Command) -> Result<String, ErrorEnvelope> {
    if cmd.payload.is_null() {
        return Err(make_error(
            ErrorCode::MissingPayload,
            &[("kind", cmd.kind.as_str().to_string())],
        ));
    }

    let mut content = Map::new();
    content.insert("kind".to_string(), Value::String(cmd.kind.as_str().to_string()));
    content.insert(
        "event_type".to_string(),
        cmd.payload.get("event_type").cloned().unwrap_or(Value::Null),
    );
    content.insert(
        "data".to_string(),
        cmd.payload.get("data").cloned().unwrap_or(Value::Null),
    );
    content.insert(
        "client_sequence".to_string(),
        cmd.client_sequence.map(Value::from).unwrap_or(Value::Null),
    );

    let bytes = canonical_json_bytes(&Value::Object(content));
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex_encode(&hasher.finalize()))
}

/// Deterministic serialization: object keys sorted by byte order at every
/// depth, no insignificant whitespace. serde_json's compact writer handles
/// the whitespace; the recursion handles the ordering.
pub fn canonical_json_bytes(value: &Value) -> Vec<u8> {
    let canon = canon_value(value);
    serde_json::to_vec(&canon).unwrap_or_default()
}

fn canon_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for k in keys {
                out.insert(k.clone(), canon_value(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canon_value).collect()),
        other => other.clone(),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cmd(raw: Value) -> Command {
        Command::from_raw(&raw).unwrap()
    }

    fn quote(command_id: &str, session_id: &str, price: f64) -> Command {
        cmd(json!({
            "kind": "INGEST_QUOTE",
            "schema_version": 1,
            "command_id": command_id,
            "session_id": session_id,
            "payload": {"event_type": "quote", "data": {"symbol": "AAPL", "price": price}},
        }))
    }

    #[test]
    fn test_identity_is_total() {
        let (s, c) = identity(&json!({"session_id": "s-1", "command_id": "c-1"}));
        assert_eq!((s.as_str(), c.as_str()), ("s-1", "c-1"));

        let (s, c) = identity(&json!({}));
        assert_eq!((s.as_str(), c.as_str()), ("", ""));

        // Non-string identifiers degrade to empty, never panic
        let (s, c) = identity(&json!({"session_id": 42, "command_id": null}));
        assert_eq!((s.as_str(), c.as_str()), ("", ""));
    }

    #[test]
    fn test_fingerprint_ignores_envelope_identity_and_meta() {
        let a = quote("c-1", "s-1", 187.5);
        let mut b = quote("c-2", "s-2", 187.5);
        b.meta = Some(json!({"origin": "retry-proxy", "attempt": 3}));
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_fingerprint_invariant_under_data_key_order() {
        let a = cmd(json!({
            "kind": "INGEST_QUOTE",
            "schema_version": 1,
            "payload": {"event_type": "quote", "data": {"symbol": "AAPL", "price": 187.5, "venue": "XNAS"}},
        }));
        let b = cmd(json!({
            "kind": "INGEST_QUOTE",
            "schema_version": 1,
            "payload": {"event_type": "quote", "data": {"venue": "XNAS", "price": 187.5, "symbol": "AAPL"}},
        }));
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_fingerprint_sensitive_to_content() {
        let base = quote("c-1", "s-1", 187.5);
        let fp = fingerprint(&base).unwrap();

        let changed_price = quote("c-1", "s-1", 188.0);
        assert_ne!(fp, fingerprint(&changed_price).unwrap());

        let mut changed_event = base.clone();
        changed_event.payload["event_type"] = json!("trade");
        assert_ne!(fp, fingerprint(&changed_event).unwrap());

        let mut changed_seq = base.clone();
        changed_seq.client_sequence = Some(7);
        assert_ne!(fp, fingerprint(&changed_seq).unwrap());
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let fp = fingerprint(&quote("c-1", "s-1", 1.0)).unwrap();
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_fingerprint_missing_payload_is_hard_error() {
        let mut c = quote("c-1", "s-1", 1.0);
        c.payload = Value::Null;
        let err = fingerprint(&c).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingPayload);
    }

    #[test]
    fn test_canonical_bytes_sort_nested_keys() {
        let v = json!({"b": {"z": 1, "a": [{"y": 2, "x": 3}]}, "a": true});
        let s = String::from_utf8(canonical_json_bytes(&v)).unwrap();
        assert_eq!(s, r#"{"a":true,"b":{"a":[{"x":3,"y":2}],"z":1}}"#);
    }
}
