use crate::intake::taxonomy::{make_error, ErrorCode, ErrorEnvelope};

/// Strict next-expected-sequence check. Ordering is opt-in per command: a
/// command without a client_sequence is never checked. When present, the
/// value must equal the session's next expected sequence exactly -- a gap
/// ahead and a stale resubmit behind are rejected identically.
pub fn validate_order(
    client_sequence: Option<i64>,
    next_expected: i64,
) -> Option<ErrorEnvelope> {
    let observed = client_sequence?;
    if observed == next_expected {
        return None;
    }
    Some(make_error(
        ErrorCode::OutOfOrder,
        &[
            ("expected", next_expected.to_string()),
            ("observed", observed.to_string()),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_sequence_always_passes() {
        assert!(validate_order(None, 0).is_none());
        assert!(validate_order(None, 10).is_none());
    }

    #[test]
    fn test_exact_match_passes() {
        assert!(validate_order(Some(0), 0).is_none());
        assert!(validate_order(Some(10), 10).is_none());
    }

    #[test]
    fn test_stale_sequence_rejected() {
        let err = validate_order(Some(8), 10).unwrap();
        assert_eq!(err.code, ErrorCode::OutOfOrder);
        assert_eq!(err.details.get("expected").unwrap(), "10");
        assert_eq!(err.details.get("observed").unwrap(), "8");
    }

    #[test]
    fn test_gap_ahead_rejected() {
        let err = validate_order(Some(12), 10).unwrap();
        assert_eq!(err.code, ErrorCode::OutOfOrder);
        assert_eq!(err.details.get("expected").unwrap(), "10");
        assert_eq!(err.details.get("observed").unwrap(), "12");
    }
}
