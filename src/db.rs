use crate::errors::{IntakeError, IntakeResult};
use crate::intake::schema::CommandKind;
use crate::store::{session_state_hash, Admission, SessionStore, WorkflowContext};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub type DbPool = Arc<Mutex<Connection>>;

pub fn init_db(data_dir: &Path) -> IntakeResult<DbPool> {
    std::fs::create_dir_all(data_dir).map_err(|e| IntakeError::Database(format!("create dir: {e}")))?;
    let db_path = data_dir.join("desk_gate.db");
    let conn = Connection::open(&db_path)?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA cache_size=-64000;")?;

    init_schema(&conn)?;

    tracing::info!("database initialized at {}", db_path.display());
    Ok(Arc::new(Mutex::new(conn)))
}

pub fn init_schema(conn: &Connection) -> IntakeResult<()> {
    let schema = include_str!("../migrations/001_init.sql");
    conn.execute_batch(schema)?;
    Ok(())
}

/// Sqlite-backed session store. Reads reflect committed state across process
/// restarts; admission is one transaction, with the UNIQUE(session_id,
/// command_id) key on the events table as the exactly-once backstop.
pub struct SqliteStore {
    db: DbPool,
}

impl SqliteStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    fn lock(&self) -> IntakeResult<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| IntakeError::Database(format!("lock poisoned: {e}")))
    }
}

impl SessionStore for SqliteStore {
    fn has_seen(&self, session_id: &str, command_id: &str) -> IntakeResult<bool> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT 1 FROM events WHERE session_id = ?1 AND command_id = ?2 LIMIT 1",
        )?;
        Ok(stmt.exists(rusqlite::params![session_id, command_id])?)
    }

    fn previous_fingerprint(
        &self,
        session_id: &str,
        command_id: &str,
    ) -> IntakeResult<Option<String>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT fingerprint FROM events WHERE session_id = ?1 AND command_id = ?2",
            rusqlite::params![session_id, command_id],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(fp) => Ok(Some(fp)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn next_client_sequence(&self, session_id: &str) -> IntakeResult<i64> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT next_client_sequence FROM sessions WHERE session_id = ?1",
            rusqlite::params![session_id],
            |row| row.get::<_, i64>(0),
        );
        match result {
            Ok(seq) => Ok(seq),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn workflow_context(&self, session_id: &str) -> IntakeResult<WorkflowContext> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT has_any_quotes, applied_version FROM sessions WHERE session_id = ?1",
            rusqlite::params![session_id],
            |row| {
                Ok(WorkflowContext {
                    has_any_quotes: row.get::<_, i64>(0)? != 0,
                    applied_version: row.get(1)?,
                })
            },
        );
        match result {
            Ok(ctx) => Ok(ctx),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(WorkflowContext::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn admit(&self, admission: &Admission) -> IntakeResult<String> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let now = chrono::Utc::now().to_rfc3339();

        let current = tx.query_row(
            "SELECT next_client_sequence, has_any_quotes, applied_version FROM sessions WHERE session_id = ?1",
            rusqlite::params![admission.session_id],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?)),
        );
        let (mut next_seq, has_quotes, applied) = match current {
            Ok(v) => v,
            Err(rusqlite::Error::QueryReturnedNoRows) => (0, 0, 0),
            Err(e) => return Err(e.into()),
        };

        if admission.client_sequence.is_some() {
            next_seq += 1;
        }
        let has_quotes = has_quotes != 0 || admission.kind == CommandKind::IngestQuote;
        let applied = applied + 1;

        // Duplicate identity fails here on the unique key; classification
        // must have run against stale state for that to happen.
        tx.execute(
            "INSERT INTO events (id, session_id, command_id, kind, schema_version, fingerprint, client_sequence, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                uuid::Uuid::new_v4().to_string(),
                admission.session_id,
                admission.command_id,
                admission.kind.as_str(),
                admission.schema_version,
                admission.fingerprint,
                admission.client_sequence,
                "ACCEPTED",
                now,
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                IntakeError::StateCorruption(format!(
                    "duplicate admission for ({}, {})",
                    admission.session_id, admission.command_id
                ))
            }
            other => other.into(),
        })?;

        tx.execute(
            "INSERT INTO sessions (session_id, next_client_sequence, has_any_quotes, applied_version, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(session_id) DO UPDATE SET
                next_client_sequence = excluded.next_client_sequence,
                has_any_quotes = excluded.has_any_quotes,
                applied_version = excluded.applied_version,
                updated_at = excluded.updated_at",
            rusqlite::params![
                admission.session_id,
                next_seq,
                has_quotes as i64,
                applied,
                now,
            ],
        )?;

        tx.commit()?;
        Ok(session_state_hash(&admission.session_id, applied))
    }
}

// ── Query helpers (for server REST reads -- cold path, these lock) ──

pub fn get_session_row(db: &DbPool, session_id: &str) -> IntakeResult<Option<SessionRow>> {
    let conn = db.lock().map_err(|e| IntakeError::Database(format!("lock: {e}")))?;
    let result = conn.query_row(
        "SELECT session_id, next_client_sequence, has_any_quotes, applied_version, updated_at
         FROM sessions WHERE session_id = ?1",
        rusqlite::params![session_id],
        |row| {
            Ok(SessionRow {
                session_id: row.get(0)?,
                next_client_sequence: row.get(1)?,
                has_any_quotes: row.get::<_, i64>(2)? != 0,
                applied_version: row.get(3)?,
                updated_at: row.get(4)?,
            })
        },
    );
    match result {
        Ok(row) => Ok(Some(row)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_recent_events(db: &DbPool, limit: usize) -> IntakeResult<Vec<EventRow>> {
    let conn = db.lock().map_err(|e| IntakeError::Database(format!("lock: {e}")))?;
    let mut stmt = conn.prepare(
        "SELECT id, session_id, command_id, kind, schema_version, fingerprint, client_sequence, status, created_at
         FROM events ORDER BY created_at DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(rusqlite::params![limit as i64], |row| {
        Ok(EventRow {
            id: row.get(0)?,
            session_id: row.get(1)?,
            command_id: row.get(2)?,
            kind: row.get(3)?,
            schema_version: row.get(4)?,
            fingerprint: row.get(5)?,
            client_sequence: row.get(6)?,
            status: row.get(7)?,
            created_at: row.get(8)?,
        })
    })?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

// ── Row types ──

#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionRow {
    pub session_id: String,
    pub next_client_sequence: i64,
    pub has_any_quotes: bool,
    pub applied_version: i64,
    pub updated_at: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct EventRow {
    pub id: String,
    pub session_id: String,
    pub command_id: String,
    pub kind: String,
    pub schema_version: i64,
    pub fingerprint: String,
    pub client_sequence: Option<i64>,
    pub status: String,
    pub created_at: String,
}
