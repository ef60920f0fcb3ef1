use crate::intake::schema::CommandKind;
use crate::intake::taxonomy::{make_error, ErrorCode, ErrorEnvelope};
use crate::store::WorkflowContext;

type LegalityRule = fn(&WorkflowContext) -> bool;

/// Workflow legality as an explicit data table: kind -> predicate over the
/// session context. A kind with no entry is allowed by construction -- the
/// checker never invents restrictions for unlisted kinds, which keeps the
/// legality surface exactly as wide as this table.
const LEGALITY_RULES: &[(CommandKind, LegalityRule)] = &[
    (CommandKind::RequestCompute, |ctx| ctx.has_any_quotes),
    (CommandKind::RequestSnapshot, |ctx| ctx.applied_version > 0),
];

pub fn check_legality(kind: CommandKind, ctx: &WorkflowContext) -> Option<ErrorEnvelope> {
    let rule = LEGALITY_RULES.iter().find(|(k, _)| *k == kind);
    match rule {
        Some((_, allowed)) if !allowed(ctx) => Some(make_error(
            ErrorCode::IllegalSequence,
            &[
                ("kind", kind.as_str().to_string()),
                ("has_any_quotes", ctx.has_any_quotes.to_string()),
                ("applied_version", ctx.applied_version.to_string()),
            ],
        )),
        _ => None,
    }
}
