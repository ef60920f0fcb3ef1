use crate::errors::IntakeResult;
use crate::intake::schema::CommandKind;
use sha2::{Digest, Sha256};
#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::Mutex;

/// Conservative summary of session state consulted by the legality checker.
/// Owned and mutated by the store; the pipeline only reads it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct WorkflowContext {
    pub has_any_quotes: bool,
    pub applied_version: i64,
}

/// Durable record of one accepted command, written by the intake worker in a
/// single transaction.
#[derive(Debug, Clone)]
pub struct Admission {
    pub session_id: String,
    pub command_id: String,
    pub kind: CommandKind,
    pub schema_version: i64,
    pub fingerprint: String,
    pub client_sequence: Option<i64>,
}

/// Session store contract. The pipeline depends on the four reads only; the
/// admission write belongs to the intake worker. All reads must reflect
/// durably committed state (post-restart visibility), and `admit` must be
/// atomic per (session_id, command_id) -- a second admission of the same
/// identity must fail rather than double-apply.
pub trait SessionStore: Send {
    fn has_seen(&self, session_id: &str, command_id: &str) -> IntakeResult<bool>;
    fn previous_fingerprint(&self, session_id: &str, command_id: &str)
        -> IntakeResult<Option<String>>;
    fn next_client_sequence(&self, session_id: &str) -> IntakeResult<i64>;
    fn workflow_context(&self, session_id: &str) -> IntakeResult<WorkflowContext>;

    /// Record an accepted command: fingerprint, sequence bump, workflow
    /// context update, audit append. Returns the session's new state hash.
    fn admit(&self, admission: &Admission) -> IntakeResult<String>;
}

/// Opaque per-session state digest, recomputed after every admission.
pub fn session_state_hash(session_id: &str, applied_version: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    hasher.update(b":");
    hasher.update(applied_version.to_string().as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

// ── In-memory store (unit tests only; the service runs on sqlite) ──

#[cfg(test)]
#[derive(Debug, Default)]
struct SessionRecord {
    fingerprints: HashMap<String, String>,
    next_client_sequence: i64,
    context: WorkflowContext,
}

/// HashMap-backed SessionStore. Same semantics as the sqlite store minus
/// durability; used by unit tests to drive the pipeline without IO.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl SessionStore for MemoryStore {
    fn has_seen(&self, session_id: &str, command_id: &str) -> IntakeResult<bool> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions
            .get(session_id)
            .is_some_and(|s| s.fingerprints.contains_key(command_id)))
    }

    fn previous_fingerprint(
        &self,
        session_id: &str,
        command_id: &str,
    ) -> IntakeResult<Option<String>> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions
            .get(session_id)
            .and_then(|s| s.fingerprints.get(command_id).cloned()))
    }

    fn next_client_sequence(&self, session_id: &str) -> IntakeResult<i64> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions
            .get(session_id)
            .map(|s| s.next_client_sequence)
            .unwrap_or(0))
    }

    fn workflow_context(&self, session_id: &str) -> IntakeResult<WorkflowContext> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions
            .get(session_id)
            .map(|s| s.context)
            .unwrap_or_default())
    }

    fn admit(&self, admission: &Admission) -> IntakeResult<String> {
        use crate::errors::IntakeError;
        let mut sessions = self.sessions.lock().unwrap();
        let record = sessions.entry(admission.session_id.clone()).or_default();
        if record.fingerprints.contains_key(&admission.command_id) {
            return Err(IntakeError::StateCorruption(format!(
                "duplicate admission for ({}, {})",
                admission.session_id, admission.command_id
            )));
        }
        record
            .fingerprints
            .insert(admission.command_id.clone(), admission.fingerprint.clone());
        if admission.client_sequence.is_some() {
            record.next_client_sequence += 1;
        }
        if admission.kind == CommandKind::IngestQuote {
            record.context.has_any_quotes = true;
        }
        record.context.applied_version += 1;
        Ok(session_state_hash(
            &admission.session_id,
            record.context.applied_version,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admission(session: &str, command: &str, kind: CommandKind, seq: Option<i64>) -> Admission {
        Admission {
            session_id: session.to_string(),
            command_id: command.to_string(),
            kind,
            schema_version: 1,
            fingerprint: format!("fp-{command}"),
            client_sequence: seq,
        }
    }

    #[test]
    fn test_unseen_session_defaults() {
        let store = MemoryStore::new();
        assert!(!store.has_seen("s", "c").unwrap());
        assert!(store.previous_fingerprint("s", "c").unwrap().is_none());
        assert_eq!(store.next_client_sequence("s").unwrap(), 0);
        assert_eq!(store.workflow_context("s").unwrap(), WorkflowContext::default());
    }

    #[test]
    fn test_admit_updates_reads() {
        let store = MemoryStore::new();
        store
            .admit(&admission("s", "c1", CommandKind::IngestQuote, Some(0)))
            .unwrap();

        assert!(store.has_seen("s", "c1").unwrap());
        assert_eq!(store.previous_fingerprint("s", "c1").unwrap().as_deref(), Some("fp-c1"));
        assert_eq!(store.next_client_sequence("s").unwrap(), 1);
        let ctx = store.workflow_context("s").unwrap();
        assert!(ctx.has_any_quotes);
        assert_eq!(ctx.applied_version, 1);
    }

    #[test]
    fn test_unsequenced_admission_leaves_sequence() {
        let store = MemoryStore::new();
        store
            .admit(&admission("s", "c1", CommandKind::IngestEvent, None))
            .unwrap();
        assert_eq!(store.next_client_sequence("s").unwrap(), 0);
        let ctx = store.workflow_context("s").unwrap();
        assert!(!ctx.has_any_quotes);
        assert_eq!(ctx.applied_version, 1);
    }

    #[test]
    fn test_duplicate_admission_fails() {
        let store = MemoryStore::new();
        let adm = admission("s", "c1", CommandKind::IngestEvent, None);
        store.admit(&adm).unwrap();
        assert!(store.admit(&adm).is_err());
    }

    #[test]
    fn test_sessions_are_independent() {
        let store = MemoryStore::new();
        store
            .admit(&admission("s1", "c1", CommandKind::IngestQuote, Some(0)))
            .unwrap();
        assert!(!store.has_seen("s2", "c1").unwrap());
        assert_eq!(store.next_client_sequence("s2").unwrap(), 0);
    }

    #[test]
    fn test_state_hash_tracks_session_and_version() {
        let h1 = session_state_hash("s", 1);
        let h2 = session_state_hash("s", 2);
        let h3 = session_state_hash("t", 1);
        assert_ne!(h1, h2);
        assert_ne!(h1, h3);
        assert_eq!(h1, session_state_hash("s", 1));
        assert_eq!(h1.len(), 64);
    }
}
