use crate::intake::classify::Classification;
use crate::intake::taxonomy::{make_error, ErrorCode, ErrorEnvelope};
use serde_json::Value;

/// Externally-visible status of a processed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Accepted,
    IdempotentReplay,
    Rejected,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted => write!(f, "ACCEPTED"),
            Self::IdempotentReplay => write!(f, "IDEMPOTENT_REPLAY"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// The terminal artifact of the pipeline. JSON-safe; consumed verbatim by
/// the transport layer and the dashboard stream.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OperationalOutcome {
    pub command_id: String,
    pub session_id: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Value>,
}

/// Map a classification to its outcome. NEW is an acceptance, a replay is a
/// successful no-op (not an error), and a conflict is a rejection carrying
/// the canonical IDEMPOTENCY_CONFLICT envelope. The match is exhaustive:
/// there is no fourth classification to mishandle.
pub fn map_classification_to_outcome(
    classification: Classification,
    identity: (String, String),
    state_hash: Option<String>,
    diagnostics: Option<Value>,
) -> OperationalOutcome {
    let (session_id, command_id) = identity;
    let (status, error) = match classification {
        Classification::New => (OutcomeStatus::Accepted, None),
        Classification::IdempotentReplay => (OutcomeStatus::IdempotentReplay, None),
        Classification::Conflict => (
            OutcomeStatus::Rejected,
            Some(make_error(
                ErrorCode::IdempotencyConflict,
                &[
                    ("session_id", session_id.clone()),
                    ("command_id", command_id.clone()),
                ],
            )),
        ),
    };
    OperationalOutcome {
        command_id,
        session_id,
        status,
        error,
        state_hash,
        diagnostics,
    }
}
