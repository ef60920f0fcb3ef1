use crate::intake::taxonomy::{ErrorCategory, ErrorCode, ErrorEnvelope};
use smallvec::SmallVec;

/// Enforcement mode for one command. Strict rejects on any error; lenient may
/// downgrade allow-listed SEMANTIC errors to warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    Strict,
    Lenient,
}

impl ValidationMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "strict" => Some(Self::Strict),
            "lenient" => Some(Self::Lenient),
            _ => None,
        }
    }
}

impl std::fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Lenient => write!(f, "lenient"),
        }
    }
}

/// Codes lenient mode may downgrade to warnings. Ships empty; operators
/// populate it explicitly via configuration. Until then lenient behaves
/// identically to strict for SEMANTIC errors.
#[derive(Debug, Clone, Default)]
pub struct DowngradeList(Vec<ErrorCode>);

impl DowngradeList {
    pub fn new(codes: Vec<ErrorCode>) -> Self {
        Self(codes)
    }

    pub fn contains(&self, code: ErrorCode) -> bool {
        self.0.contains(&code)
    }
}

/// Aggregated accept/reject decision for one command.
#[derive(Debug, Clone)]
pub struct PolicyDecision {
    pub accepted: bool,
    pub errors: SmallVec<[ErrorEnvelope; 4]>,
    pub warnings: SmallVec<[ErrorEnvelope; 4]>,
    pub error_count: usize,
}

/// Map a batch of detected errors to a decision.
///
/// Strict: any error forces rejection; the error list is returned verbatim
/// and nothing is downgraded. Lenient: VALIDATION and CONFLICT always
/// reject; a SEMANTIC error moves to warnings only when its code is on the
/// downgrade list. One non-downgradable error anywhere rejects the command;
/// warnings never override a rejection. An empty batch is accepted.
pub fn apply_mode(
    detected: SmallVec<[ErrorEnvelope; 4]>,
    mode: ValidationMode,
    downgrades: &DowngradeList,
) -> PolicyDecision {
    let mut errors: SmallVec<[ErrorEnvelope; 4]> = SmallVec::new();
    let mut warnings: SmallVec<[ErrorEnvelope; 4]> = SmallVec::new();

    for env in detected {
        let downgradable = mode == ValidationMode::Lenient
            && env.category == ErrorCategory::Semantic
            && downgrades.contains(env.code);
        if downgradable {
            warnings.push(env);
        } else {
            errors.push(env);
        }
    }

    let error_count = errors.len();
    PolicyDecision {
        accepted: errors.is_empty(),
        errors,
        warnings,
        error_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::taxonomy::make_error;
    use smallvec::smallvec;

    fn out_of_order() -> ErrorEnvelope
    {
        make_error(
            ErrorCode::OutOfOrder,
            &[("expected", "2".to_string()), ("observed", "5".to_string())],
        )
    }

    fn bad_version() -> ErrorEnvelope
    {
        make_error(ErrorCode::UnsupportedSchemaVersion, &[])
    }

    #[test]
    fn test_empty_batch_is_accepted() {
        for mode in [ValidationMode::Strict, ValidationMode::Lenient] {
            let d = apply_mode(SmallVec::new(), mode, &DowngradeList::default());
            assert!(d.accepted);
            assert!(d.errors.is_empty());
            assert!(d.warnings.is_empty());
            assert_eq!(d.error_count, 0);
        }
    }

    #[test]
    fn test_strict_rejects_everything_verbatim() {
        let detected: SmallVec<[ErrorEnvelope; 4]> = smallvec![out_of_order(), bad_version()];
        let expected = detected.clone();
        // even with a downgrade list present, strict never downgrades
        let downgrades = DowngradeList::new(vec![ErrorCode::OutOfOrder]);
        let d = apply_mode(detected, ValidationMode::Strict, &downgrades);
        assert!(!d.accepted);
        assert_eq!(d.errors.as_slice(), expected.as_slice());
        assert!(d.warnings.is_empty());
        assert_eq!(d.error_count, 2);
    }

    #[test]
    fn test_lenient_with_empty_list_matches_strict() {
        let d = apply_mode(
            smallvec![out_of_order()],
            ValidationMode::Lenient,
            &DowngradeList::default(),
        );
        assert!(!d.accepted);
        assert_eq!(d.errors.len(), 1);
        assert!(d.warnings.is_empty());
    }

    #[test]
    fn test_lenient_downgrades_allowlisted_semantic() {
        let downgrades = DowngradeList::new(vec![ErrorCode::OutOfOrder]);
        let d = apply_mode(smallvec![out_of_order()], ValidationMode::Lenient, &downgrades);
        assert!(d.accepted);
        assert!(d.errors.is_empty());
        assert_eq!(d.warnings.len(), 1);
        assert_eq!(d.warnings[0].code, ErrorCode::OutOfOrder);
        assert_eq!(d.error_count, 0);
    }

    #[test]
    fn test_lenient_never_downgrades_validation_or_conflict() {
        // A listed code that is not SEMANTIC is ignored by the downgrade rule
        let downgrades = DowngradeList::new(vec![
            ErrorCode::UnsupportedSchemaVersion,
            ErrorCode::IdempotencyConflict,
        ]);
        let d = apply_mode(
            smallvec![bad_version(), make_error(ErrorCode::IdempotencyConflict, &[])],
            ValidationMode::Lenient,
            &downgrades,
        );
        assert!(!d.accepted);
        assert_eq!(d.errors.len(), 2);
        assert!(d.warnings.is_empty());
    }

    #[test]
    fn test_one_hard_error_rejects_despite_warnings() {
        let downgrades = DowngradeList::new(vec![ErrorCode::OutOfOrder]);
        let d = apply_mode(
            smallvec![out_of_order(), bad_version()],
            ValidationMode::Lenient,
            &downgrades,
        );
        assert!(!d.accepted);
        assert_eq!(d.errors.len(), 1);
        assert_eq!(d.errors[0].code, ErrorCode::UnsupportedSchemaVersion);
        assert_eq!(d.warnings.len(), 1);
        assert_eq!(d.error_count, 1);
    }
}
