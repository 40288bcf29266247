//! SQLite-backed store
//!
//! Single-file database with WAL enabled and automatic schema migration.
//! Event, snapshot, and transaction tables are append-only; metrics and
//! streaks are one row per user.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::DateTime;
use rusqlite::{Connection, OptionalExtension, params};

use crate::attempt::{AttemptStatus, ChallengeAttempt, MetricSnapshot};
use crate::badges::UserBadge;
use crate::certificate::{Certificate, Grade};
use crate::challenge::Challenge;
use crate::events::{
    AiInteraction, AttemptEvent, ChecklistResult, CodeEvent, CodeEventKind, TestResult,
    TrapDetection,
};
use crate::ledger::{XpSource, XpTransaction};
use crate::metrics::UserMetrics;
use crate::streak::Streak;
use crate::{CoachError, Result};

use super::{AttemptEvents, Store};

/// Database wrapper; clones share one connection
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at a specific path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CoachError::Unavailable(format!(
                    "failed to create store dir {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| CoachError::Unavailable(format!("failed to open {}: {e}", path.display())))?;

        // WAL so readers and the writer do not block each other
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory database, handy for tests and ephemeral runs
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoachError::Unavailable(format!("failed to open in-memory db: {e}")))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("store lock poisoned")
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA_SQL)?;
        drop(conn);
        self.run_migrations()?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn();
        let version: i32 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))
            .unwrap_or(0);

        // Migration 2: stats payload column on certificates
        if version < 2 {
            let has_stats: bool = conn
                .prepare("SELECT COUNT(*) FROM pragma_table_info('certificates') WHERE name = 'stats'")
                .and_then(|mut s| s.query_row([], |r| r.get::<_, i32>(0)))
                .map(|c| c > 0)
                .unwrap_or(false);
            if !has_stats {
                conn.execute_batch("ALTER TABLE certificates ADD COLUMN stats TEXT DEFAULT '{}';")?;
            }
            conn.execute("INSERT OR REPLACE INTO schema_version VALUES (2)", [])?;
        }

        Ok(())
    }
}

fn row_to_attempt(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChallengeAttempt> {
    let status: String = row.get(4)?;
    Ok(ChallengeAttempt {
        id: row.get(0)?,
        user_id: row.get(1)?,
        challenge_id: row.get(2)?,
        language: row.get(3)?,
        status: AttemptStatus::parse(&status).unwrap_or(AttemptStatus::InProgress),
        started_at_ms: row.get(5)?,
        completed_at_ms: row.get(6)?,
        final_dependency_index: row.get(7)?,
        final_pass_rate: row.get(8)?,
        final_checklist_score: row.get(9)?,
        passed: row.get::<_, Option<i64>>(10)?.map(|v| v != 0),
    })
}

fn row_to_snapshot(row: &rusqlite::Row<'_>) -> rusqlite::Result<MetricSnapshot> {
    Ok(MetricSnapshot {
        attempt_id: row.get(0)?,
        session_time_s: row.get::<_, i64>(1)? as u64,
        dependency_index: row.get(2)?,
        pass_rate: row.get(3)?,
        checklist_score: row.get(4)?,
        taken_at_ms: row.get(5)?,
    })
}

fn row_to_certificate(row: &rusqlite::Row<'_>) -> rusqlite::Result<Certificate> {
    let grade: String = row.get(7)?;
    let skills: String = row.get(10)?;
    let stats: String = row.get(11)?;
    Ok(Certificate {
        id: row.get(0)?,
        user_id: row.get(1)?,
        level: row.get(2)?,
        theory_score: row.get(3)?,
        practical_score: row.get(4)?,
        portfolio_score: row.get(5)?,
        final_score: row.get(6)?,
        grade: Grade::parse(&grade).unwrap_or(Grade::D),
        code: row.get(8)?,
        verification_hash: row.get(9)?,
        skills: serde_json::from_str(&skills).unwrap_or_default(),
        stats: serde_json::from_str(&stats).unwrap_or(serde_json::Value::Null),
        issued_at: DateTime::from_timestamp_millis(row.get(12)?).unwrap_or_default(),
        expires_at: DateTime::from_timestamp_millis(row.get(13)?).unwrap_or_default(),
    })
}

const SELECT_ATTEMPT: &str = "SELECT id, user_id, challenge_id, language, status, started_at_ms, \
     completed_at_ms, final_dependency_index, final_pass_rate, final_checklist_score, passed \
     FROM attempts";

const SELECT_CERTIFICATE: &str = "SELECT id, user_id, level, theory_score, practical_score, \
     portfolio_score, final_score, grade, code, verification_hash, skills, stats, \
     issued_at_ms, expires_at_ms FROM certificates";

impl Store for SqliteStore {
    fn save_challenge(&self, challenge: &Challenge) -> Result<()> {
        challenge.validate()?;
        let payload = serde_json::to_string(challenge)?;
        self.conn().execute(
            "INSERT OR REPLACE INTO challenges (id, payload) VALUES (?1, ?2)",
            params![challenge.id, payload],
        )?;
        Ok(())
    }

    fn load_challenge(&self, id: &str) -> Result<Challenge> {
        let payload: Option<String> = self
            .conn()
            .query_row("SELECT payload FROM challenges WHERE id = ?1", [id], |r| r.get(0))
            .optional()?;
        let payload =
            payload.ok_or_else(|| CoachError::NotFound(format!("challenge {id}")))?;
        let challenge: Challenge = serde_json::from_str(&payload)?;
        // Weight-sum violations surface at load time, not at scoring time
        challenge.validate()?;
        Ok(challenge)
    }

    fn create_attempt(&self, attempt: &ChallengeAttempt) -> Result<()> {
        self.conn().execute(
            "INSERT INTO attempts (id, user_id, challenge_id, language, status, started_at_ms, \
             completed_at_ms, final_dependency_index, final_pass_rate, final_checklist_score, passed) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                attempt.id,
                attempt.user_id,
                attempt.challenge_id,
                attempt.language,
                attempt.status.as_str(),
                attempt.started_at_ms,
                attempt.completed_at_ms,
                attempt.final_dependency_index,
                attempt.final_pass_rate,
                attempt.final_checklist_score,
                attempt.passed.map(|p| p as i64),
            ],
        )?;
        Ok(())
    }

    fn load_attempt(&self, id: &str) -> Result<ChallengeAttempt> {
        self.conn()
            .query_row(&format!("{SELECT_ATTEMPT} WHERE id = ?1"), [id], row_to_attempt)
            .optional()?
            .ok_or_else(|| CoachError::NotFound(format!("attempt {id}")))
    }

    fn update_attempt(&self, attempt: &ChallengeAttempt) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE attempts SET status = ?2, completed_at_ms = ?3, final_dependency_index = ?4, \
             final_pass_rate = ?5, final_checklist_score = ?6, passed = ?7 WHERE id = ?1",
            params![
                attempt.id,
                attempt.status.as_str(),
                attempt.completed_at_ms,
                attempt.final_dependency_index,
                attempt.final_pass_rate,
                attempt.final_checklist_score,
                attempt.passed.map(|p| p as i64),
            ],
        )?;
        if changed == 0 {
            return Err(CoachError::NotFound(format!("attempt {}", attempt.id)));
        }
        Ok(())
    }

    fn load_completed_attempts(&self, user_id: &str) -> Result<Vec<ChallengeAttempt>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{SELECT_ATTEMPT} WHERE user_id = ?1 AND status = 'completed' ORDER BY completed_at_ms"
        ))?;
        let attempts = stmt
            .query_map([user_id], row_to_attempt)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attempts)
    }

    fn append_event(&self, attempt_id: &str, event: &AttemptEvent) -> Result<()> {
        let conn = self.conn();
        match event {
            AttemptEvent::Code(e) => {
                conn.execute(
                    "INSERT INTO code_events (attempt_id, kind, lines_added, lines_removed, \
                     ai_generated, ai_interaction_id, timestamp_ms) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        attempt_id,
                        e.kind.as_str(),
                        e.lines_added,
                        e.lines_removed,
                        e.ai_generated as i64,
                        e.ai_interaction_id,
                        e.timestamp_ms,
                    ],
                )?;
            }
            AttemptEvent::Ai(e) => {
                conn.execute(
                    "INSERT INTO ai_interactions (id, attempt_id, prompt_tokens, completion_tokens, \
                     lines_generated, copied, copied_at_ms, timestamp_ms) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        e.id,
                        attempt_id,
                        e.prompt_tokens,
                        e.completion_tokens,
                        e.lines_generated,
                        e.copied as i64,
                        e.copied_at_ms,
                        e.timestamp_ms,
                    ],
                )?;
            }
            AttemptEvent::Trap(e) => {
                conn.execute(
                    "INSERT INTO trap_detections (attempt_id, trap_id, reaction_time_ms, \
                     fell_into_trap, fixed_after_warning, learned_from) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        attempt_id,
                        e.trap_id,
                        e.reaction_time_ms,
                        e.fell_into_trap as i64,
                        e.fixed_after_warning as i64,
                        e.learned_from as i64,
                    ],
                )?;
            }
            AttemptEvent::Test(e) => {
                conn.execute(
                    "INSERT OR REPLACE INTO test_results (attempt_id, test_id, passed) \
                     VALUES (?1, ?2, ?3)",
                    params![attempt_id, e.test_id, e.passed as i64],
                )?;
            }
            AttemptEvent::Checklist(e) => {
                conn.execute(
                    "INSERT OR REPLACE INTO checklist_results (attempt_id, item_id, satisfied) \
                     VALUES (?1, ?2, ?3)",
                    params![attempt_id, e.item_id, e.satisfied as i64],
                )?;
            }
        }
        Ok(())
    }

    fn load_attempt_events(&self, attempt_id: &str) -> Result<AttemptEvents> {
        let conn = self.conn();
        let mut events = AttemptEvents::default();

        let mut stmt = conn.prepare(
            "SELECT kind, lines_added, lines_removed, ai_generated, ai_interaction_id, timestamp_ms \
             FROM code_events WHERE attempt_id = ?1 ORDER BY timestamp_ms, id",
        )?;
        events.code_events = stmt
            .query_map([attempt_id], |row| {
                let kind: String = row.get(0)?;
                Ok(CodeEvent {
                    attempt_id: attempt_id.to_string(),
                    kind: CodeEventKind::parse(&kind).unwrap_or(CodeEventKind::Typed),
                    lines_added: row.get(1)?,
                    lines_removed: row.get(2)?,
                    ai_generated: row.get::<_, i64>(3)? != 0,
                    ai_interaction_id: row.get(4)?,
                    timestamp_ms: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT id, prompt_tokens, completion_tokens, lines_generated, copied, copied_at_ms, \
             timestamp_ms FROM ai_interactions WHERE attempt_id = ?1 ORDER BY timestamp_ms",
        )?;
        events.ai_interactions = stmt
            .query_map([attempt_id], |row| {
                Ok(AiInteraction {
                    id: row.get(0)?,
                    attempt_id: attempt_id.to_string(),
                    prompt_tokens: row.get(1)?,
                    completion_tokens: row.get(2)?,
                    lines_generated: row.get(3)?,
                    copied: row.get::<_, i64>(4)? != 0,
                    copied_at_ms: row.get(5)?,
                    timestamp_ms: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT trap_id, reaction_time_ms, fell_into_trap, fixed_after_warning, learned_from \
             FROM trap_detections WHERE attempt_id = ?1 ORDER BY id",
        )?;
        events.trap_detections = stmt
            .query_map([attempt_id], |row| {
                Ok(TrapDetection {
                    attempt_id: attempt_id.to_string(),
                    trap_id: row.get(0)?,
                    reaction_time_ms: row.get(1)?,
                    fell_into_trap: row.get::<_, i64>(2)? != 0,
                    fixed_after_warning: row.get::<_, i64>(3)? != 0,
                    learned_from: row.get::<_, i64>(4)? != 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT test_id, passed FROM test_results WHERE attempt_id = ?1 ORDER BY test_id",
        )?;
        events.test_results = stmt
            .query_map([attempt_id], |row| {
                Ok(TestResult {
                    test_id: row.get(0)?,
                    passed: row.get::<_, i64>(1)? != 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT item_id, satisfied FROM checklist_results WHERE attempt_id = ?1 ORDER BY item_id",
        )?;
        events.checklist_results = stmt
            .query_map([attempt_id], |row| {
                Ok(ChecklistResult {
                    item_id: row.get(0)?,
                    satisfied: row.get::<_, i64>(1)? != 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(events)
    }

    fn append_snapshot(&self, snapshot: &MetricSnapshot) -> Result<()> {
        self.conn().execute(
            "INSERT INTO snapshots (attempt_id, session_time_s, dependency_index, pass_rate, \
             checklist_score, taken_at_ms) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                snapshot.attempt_id,
                snapshot.session_time_s as i64,
                snapshot.dependency_index,
                snapshot.pass_rate,
                snapshot.checklist_score,
                snapshot.taken_at_ms,
            ],
        )?;
        Ok(())
    }

    fn last_snapshot(&self, attempt_id: &str) -> Result<Option<MetricSnapshot>> {
        let snapshot = self
            .conn()
            .query_row(
                "SELECT attempt_id, session_time_s, dependency_index, pass_rate, checklist_score, \
                 taken_at_ms FROM snapshots WHERE attempt_id = ?1 ORDER BY id DESC LIMIT 1",
                [attempt_id],
                row_to_snapshot,
            )
            .optional()?;
        Ok(snapshot)
    }

    fn load_snapshots(&self, attempt_id: &str) -> Result<Vec<MetricSnapshot>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT attempt_id, session_time_s, dependency_index, pass_rate, checklist_score, \
             taken_at_ms FROM snapshots WHERE attempt_id = ?1 ORDER BY id",
        )?;
        let snapshots = stmt
            .query_map([attempt_id], row_to_snapshot)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(snapshots)
    }

    fn load_user_metrics(&self, user_id: &str) -> Result<Option<UserMetrics>> {
        let payload: Option<String> = self
            .conn()
            .query_row(
                "SELECT payload FROM user_metrics WHERE user_id = ?1",
                [user_id],
                |r| r.get(0),
            )
            .optional()?;
        match payload {
            Some(p) => Ok(Some(serde_json::from_str(&p)?)),
            None => Ok(None),
        }
    }

    fn save_user_metrics(&self, metrics: &UserMetrics) -> Result<()> {
        let payload = serde_json::to_string(metrics)?;
        self.conn().execute(
            "INSERT INTO user_metrics (user_id, payload, updated_at_ms) VALUES (?1, ?2, ?3) \
             ON CONFLICT(user_id) DO UPDATE SET payload = ?2, updated_at_ms = ?3",
            params![metrics.user_id, payload, metrics.updated_at_ms],
        )?;
        Ok(())
    }

    fn append_xp_transaction(&self, tx: &XpTransaction) -> Result<()> {
        self.conn().execute(
            "INSERT INTO xp_transactions (id, user_id, amount, source, source_id, reason, \
             balance_before, balance_after, created_at_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                tx.id,
                tx.user_id,
                tx.amount,
                tx.source.as_str(),
                tx.source_id,
                tx.reason,
                tx.balance_before,
                tx.balance_after,
                tx.created_at_ms,
            ],
        )?;
        Ok(())
    }

    fn load_latest_balance(&self, user_id: &str) -> Result<i64> {
        let balance: Option<i64> = self
            .conn()
            .query_row(
                "SELECT balance_after FROM xp_transactions WHERE user_id = ?1 \
                 ORDER BY created_at_ms DESC, rowid DESC LIMIT 1",
                [user_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(balance.unwrap_or(0))
    }

    fn load_xp_transactions(&self, user_id: &str) -> Result<Vec<XpTransaction>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, amount, source, source_id, reason, balance_before, balance_after, \
             created_at_ms FROM xp_transactions WHERE user_id = ?1 ORDER BY created_at_ms, rowid",
        )?;
        let txs = stmt
            .query_map([user_id], |row| {
                let source: String = row.get(2)?;
                Ok(XpTransaction {
                    id: row.get(0)?,
                    user_id: user_id.to_string(),
                    amount: row.get(1)?,
                    source: XpSource::parse(&source).unwrap_or(XpSource::Adjustment),
                    source_id: row.get(3)?,
                    reason: row.get(4)?,
                    balance_before: row.get(5)?,
                    balance_after: row.get(6)?,
                    created_at_ms: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(txs)
    }

    fn load_streak(&self, user_id: &str) -> Result<Option<Streak>> {
        let row = self
            .conn()
            .query_row(
                "SELECT current, longest, last_activity FROM streaks WHERE user_id = ?1",
                [user_id],
                |r| {
                    Ok((
                        r.get::<_, u32>(0)?,
                        r.get::<_, u32>(1)?,
                        r.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;
        Ok(row.map(|(current, longest, last)| Streak {
            user_id: user_id.to_string(),
            current,
            longest,
            last_activity: last.and_then(|d| crate::metrics::parse_day_bucket(&d)),
        }))
    }

    fn save_streak(&self, streak: &Streak) -> Result<()> {
        self.conn().execute(
            "INSERT INTO streaks (user_id, current, longest, last_activity) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(user_id) DO UPDATE SET current = ?2, longest = ?3, last_activity = ?4",
            params![
                streak.user_id,
                streak.current,
                streak.longest,
                streak.last_activity.map(crate::metrics::day_bucket),
            ],
        )?;
        Ok(())
    }

    fn load_unlocked_badges(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT badge_id, unlocked_at_ms, progress FROM user_badges \
             WHERE user_id = ?1 ORDER BY unlocked_at_ms",
        )?;
        let badges = stmt
            .query_map([user_id], |row| {
                Ok(UserBadge {
                    user_id: user_id.to_string(),
                    badge_id: row.get(0)?,
                    unlocked_at_ms: row.get(1)?,
                    progress: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(badges)
    }

    fn save_user_badge(&self, badge: &UserBadge) -> Result<bool> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO user_badges (user_id, badge_id, unlocked_at_ms, progress) \
             VALUES (?1, ?2, ?3, ?4)",
            params![badge.user_id, badge.badge_id, badge.unlocked_at_ms, badge.progress],
        )?;
        Ok(inserted > 0)
    }

    fn save_certificate(&self, cert: &Certificate) -> Result<()> {
        self.conn().execute(
            "INSERT INTO certificates (id, user_id, level, theory_score, practical_score, \
             portfolio_score, final_score, grade, code, verification_hash, skills, stats, \
             issued_at_ms, expires_at_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                cert.id,
                cert.user_id,
                cert.level,
                cert.theory_score,
                cert.practical_score,
                cert.portfolio_score,
                cert.final_score,
                cert.grade.as_str(),
                cert.code,
                cert.verification_hash,
                serde_json::to_string(&cert.skills)?,
                serde_json::to_string(&cert.stats)?,
                cert.issued_at.timestamp_millis(),
                cert.expires_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn find_certificate_by_code(&self, code: &str) -> Result<Option<Certificate>> {
        let cert = self
            .conn()
            .query_row(
                &format!("{SELECT_CERTIFICATE} WHERE code = ?1"),
                [code],
                row_to_certificate,
            )
            .optional()?;
        Ok(cert)
    }

    fn load_certificates(&self, user_id: &str) -> Result<Vec<Certificate>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare(&format!("{SELECT_CERTIFICATE} WHERE user_id = ?1 ORDER BY issued_at_ms"))?;
        let certs = stmt
            .query_map([user_id], row_to_certificate)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(certs)
    }
}

/// SQL schema for the coaching database
const SCHEMA_SQL: &str = r#"
-- Challenge definitions (authoring data, stored whole)
CREATE TABLE IF NOT EXISTS challenges (
    id TEXT PRIMARY KEY,
    payload TEXT NOT NULL
);

-- Challenge attempts (one row per run)
CREATE TABLE IF NOT EXISTS attempts (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    challenge_id TEXT NOT NULL,
    language TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at_ms INTEGER NOT NULL,
    completed_at_ms INTEGER,
    final_dependency_index REAL,
    final_pass_rate REAL,
    final_checklist_score REAL,
    passed INTEGER
);
CREATE INDEX IF NOT EXISTS idx_attempts_user ON attempts(user_id, status);

-- Append-only event logs, keyed by attempt
CREATE TABLE IF NOT EXISTS code_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    attempt_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    lines_added INTEGER NOT NULL DEFAULT 0,
    lines_removed INTEGER NOT NULL DEFAULT 0,
    ai_generated INTEGER NOT NULL DEFAULT 0,
    ai_interaction_id TEXT,
    timestamp_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_code_events_attempt ON code_events(attempt_id);

CREATE TABLE IF NOT EXISTS ai_interactions (
    id TEXT PRIMARY KEY,
    attempt_id TEXT NOT NULL,
    prompt_tokens INTEGER NOT NULL DEFAULT 0,
    completion_tokens INTEGER NOT NULL DEFAULT 0,
    lines_generated INTEGER NOT NULL DEFAULT 0,
    copied INTEGER NOT NULL DEFAULT 0,
    copied_at_ms INTEGER,
    timestamp_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ai_interactions_attempt ON ai_interactions(attempt_id);

CREATE TABLE IF NOT EXISTS trap_detections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    attempt_id TEXT NOT NULL,
    trap_id TEXT NOT NULL,
    reaction_time_ms INTEGER NOT NULL DEFAULT 0,
    fell_into_trap INTEGER NOT NULL DEFAULT 0,
    fixed_after_warning INTEGER NOT NULL DEFAULT 0,
    learned_from INTEGER NOT NULL DEFAULT 0,
    UNIQUE(attempt_id, trap_id)
);

-- Latest test / checklist readings per attempt
CREATE TABLE IF NOT EXISTS test_results (
    attempt_id TEXT NOT NULL,
    test_id TEXT NOT NULL,
    passed INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (attempt_id, test_id)
);

CREATE TABLE IF NOT EXISTS checklist_results (
    attempt_id TEXT NOT NULL,
    item_id TEXT NOT NULL,
    satisfied INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (attempt_id, item_id)
);

-- Metric snapshot time series (append-only)
CREATE TABLE IF NOT EXISTS snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    attempt_id TEXT NOT NULL,
    session_time_s INTEGER NOT NULL,
    dependency_index REAL NOT NULL,
    pass_rate REAL NOT NULL,
    checklist_score REAL NOT NULL,
    taken_at_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_snapshots_attempt ON snapshots(attempt_id);

-- Rolling aggregate, one row per user
CREATE TABLE IF NOT EXISTS user_metrics (
    user_id TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    updated_at_ms INTEGER NOT NULL
);

-- XP ledger (append-only, strictly ordered per user)
CREATE TABLE IF NOT EXISTS xp_transactions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    amount INTEGER NOT NULL,
    source TEXT NOT NULL,
    source_id TEXT,
    reason TEXT NOT NULL,
    balance_before INTEGER NOT NULL,
    balance_after INTEGER NOT NULL,
    created_at_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_xp_user_time ON xp_transactions(user_id, created_at_ms);

-- Streaks, one row per user
CREATE TABLE IF NOT EXISTS streaks (
    user_id TEXT PRIMARY KEY,
    current INTEGER NOT NULL DEFAULT 0,
    longest INTEGER NOT NULL DEFAULT 0,
    last_activity TEXT
);

-- Badge unlocks; the primary key makes unlocking idempotent
CREATE TABLE IF NOT EXISTS user_badges (
    user_id TEXT NOT NULL,
    badge_id TEXT NOT NULL,
    unlocked_at_ms INTEGER NOT NULL,
    progress REAL NOT NULL DEFAULT 1.0,
    PRIMARY KEY (user_id, badge_id)
);

-- Issued certificates (historical rows are never deleted)
CREATE TABLE IF NOT EXISTS certificates (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    level INTEGER NOT NULL,
    theory_score REAL NOT NULL,
    practical_score REAL NOT NULL,
    portfolio_score REAL NOT NULL,
    final_score REAL NOT NULL,
    grade TEXT NOT NULL,
    code TEXT NOT NULL UNIQUE,
    verification_hash TEXT NOT NULL,
    skills TEXT NOT NULL DEFAULT '[]',
    stats TEXT NOT NULL DEFAULT '{}',
    issued_at_ms INTEGER NOT NULL,
    expires_at_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_certificates_user ON certificates(user_id);

-- Schema version
CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
INSERT OR IGNORE INTO schema_version VALUES (2);
"#;
