use crate::errors::IntakeResult;
use crate::intake::classify::{classify, Classification};
use crate::intake::fingerprint::{fingerprint, identity};
use crate::intake::legality::check_legality;
use crate::intake::ordering::validate_order;
use crate::intake::outcome::{map_classification_to_outcome, OperationalOutcome, OutcomeStatus};
use crate::intake::policy::{apply_mode, DowngradeList, PolicyDecision, ValidationMode};
use crate::intake::schema::{validate_command, Command};
use crate::intake::taxonomy::ErrorEnvelope;
use crate::store::{Admission, SessionStore};
use serde_json::{json, Value};
use smallvec::SmallVec;

/// Service-level enforcement settings applied to every command that does not
/// override them.
#[derive(Debug, Clone)]
pub struct IntakePolicy {
    pub default_mode: ValidationMode,
    pub downgrades: DowngradeList,
}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self {
            default_mode: ValidationMode::Strict,
            downgrades: DowngradeList::default(),
        }
    }
}

/// Pipeline output: the externally-visible outcome plus the admission record
/// the caller must persist for an accepted NEW command. The pipeline itself
/// writes nothing -- it decides over a snapshot of store state, and the
/// intake worker applies the admission (filling in the state hash).
#[derive(Debug)]
pub struct ProcessDecision {
    pub outcome: OperationalOutcome,
    pub admission: Option<Admission>,
}

/// Process one raw command. Check precedence is fixed and observable:
/// schema shape -> fingerprint -> classification -> ordering -> legality ->
/// mode policy. Schema and fingerprint failures short-circuit before the
/// store is consulted; a replay or conflict classification short-circuits
/// before ordering and legality; for NEW commands ordering and legality both
/// run so the caller gets complete diagnostics in one round trip.
pub fn process(
    raw: &Value,
    store: &dyn SessionStore,
    policy: &IntakePolicy,
) -> IntakeResult<ProcessDecision> {
    let (session_id, command_id) = identity(raw);

    if let Some(err) = validate_command(raw) {
        return Ok(ProcessDecision {
            outcome: rejected((session_id, command_id), err, None),
            admission: None,
        });
    }

    let cmd = Command::from_raw(raw)?;

    let current_fingerprint = match fingerprint(&cmd) {
        Ok(fp) => fp,
        Err(err) => {
            return Ok(ProcessDecision {
                outcome: rejected((session_id, command_id), err, None),
                admission: None,
            });
        }
    };

    let seen = store.has_seen(&session_id, &command_id)?;
    let previous = store.previous_fingerprint(&session_id, &command_id)?;
    let classification = classify(seen, previous.as_deref(), &current_fingerprint);

    match classification {
        Classification::IdempotentReplay => Ok(ProcessDecision {
            outcome: map_classification_to_outcome(
                classification,
                (session_id, command_id),
                None,
                None,
            ),
            admission: None,
        }),
        Classification::Conflict => {
            let diagnostics = json!({
                "previous_fingerprint": previous,
                "current_fingerprint": current_fingerprint,
            });
            Ok(ProcessDecision {
                outcome: map_classification_to_outcome(
                    classification,
                    (session_id, command_id),
                    None,
                    Some(diagnostics),
                ),
                admission: None,
            })
        }
        Classification::New => {
            let mut detected: SmallVec<[ErrorEnvelope; 4]> = SmallVec::new();
            if let Some(err) = validate_order(
                cmd.client_sequence,
                store.next_client_sequence(&session_id)?,
            ) {
                detected.push(err);
            }
            let context = store.workflow_context(&session_id)?;
            if let Some(err) = check_legality(cmd.kind, &context) {
                detected.push(err);
            }

            let mode = match cmd.strict {
                Some(true) => ValidationMode::Strict,
                Some(false) => ValidationMode::Lenient,
                None => policy.default_mode,
            };
            let decision = apply_mode(detected, mode, &policy.downgrades);

            if decision.accepted {
                let diagnostics = warnings_diagnostics(&decision);
                let outcome = map_classification_to_outcome(
                    Classification::New,
                    (session_id.clone(), command_id.clone()),
                    None,
                    diagnostics,
                );
                let admission = Admission {
                    session_id,
                    command_id,
                    kind: cmd.kind,
                    schema_version: cmd.schema_version,
                    fingerprint: current_fingerprint,
                    client_sequence: cmd.client_sequence,
                };
                Ok(ProcessDecision {
                    outcome,
                    admission: Some(admission),
                })
            } else {
                let first = decision.errors[0].clone();
                let diagnostics = rejection_diagnostics(&decision);
                Ok(ProcessDecision {
                    outcome: rejected((session_id, command_id), first, diagnostics),
                    admission: None,
                })
            }
        }
    }
}

fn rejected(
    identity: (String, String),
    error: ErrorEnvelope,
    diagnostics: Option<Value>,
) -> OperationalOutcome {
    let (session_id, command_id) = identity;
    OperationalOutcome {
        command_id,
        session_id,
        status: OutcomeStatus::Rejected,
        error: Some(error),
        state_hash: None,
        diagnostics,
    }
}

fn warnings_diagnostics(decision: &PolicyDecision) -> Option<Value> {
    if decision.warnings.is_empty() {
        return None;
    }
    Some(json!({ "warnings": &decision.warnings }))
}

fn rejection_diagnostics(decision: &PolicyDecision) -> Option<Value> {
    Some(json!({
        "errors": &decision.errors,
        "warnings": &decision.warnings,
        "error_count": decision.error_count,
    }))
}
