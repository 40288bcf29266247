//! Persistence contract
//!
//! The engine is agnostic to storage technology; everything it reads or
//! writes goes through this trait. The bundled [`SqliteStore`] is the
//! default backend; tests point it at a temp file.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::attempt::{ChallengeAttempt, MetricSnapshot};
use crate::badges::UserBadge;
use crate::certificate::Certificate;
use crate::challenge::Challenge;
use crate::events::{
    AiInteraction, AttemptEvent, ChecklistResult, CodeEvent, TestResult, TrapDetection,
};
use crate::ledger::XpTransaction;
use crate::metrics::UserMetrics;
use crate::streak::Streak;
use crate::Result;

/// Everything recorded against one attempt, loaded in one pass
#[derive(Debug, Clone, Default)]
pub struct AttemptEvents {
    pub code_events: Vec<CodeEvent>,
    pub ai_interactions: Vec<AiInteraction>,
    pub trap_detections: Vec<TrapDetection>,
    pub test_results: Vec<TestResult>,
    pub checklist_results: Vec<ChecklistResult>,
}

/// Abstract store the core operates against.
///
/// Append-only tables (events, snapshots, transactions) are never rewritten;
/// singleton-per-user rows (metrics, streaks) are overwritten in place. A
/// backend that cannot be reached reports `Unavailable`; the core propagates
/// it without retrying.
pub trait Store: Send + Sync {
    fn save_challenge(&self, challenge: &Challenge) -> Result<()>;
    fn load_challenge(&self, id: &str) -> Result<Challenge>;

    fn create_attempt(&self, attempt: &ChallengeAttempt) -> Result<()>;
    fn load_attempt(&self, id: &str) -> Result<ChallengeAttempt>;
    fn update_attempt(&self, attempt: &ChallengeAttempt) -> Result<()>;
    fn load_completed_attempts(&self, user_id: &str) -> Result<Vec<ChallengeAttempt>>;

    fn append_event(&self, attempt_id: &str, event: &AttemptEvent) -> Result<()>;
    fn load_attempt_events(&self, attempt_id: &str) -> Result<AttemptEvents>;

    fn append_snapshot(&self, snapshot: &MetricSnapshot) -> Result<()>;
    fn last_snapshot(&self, attempt_id: &str) -> Result<Option<MetricSnapshot>>;
    fn load_snapshots(&self, attempt_id: &str) -> Result<Vec<MetricSnapshot>>;

    fn load_user_metrics(&self, user_id: &str) -> Result<Option<UserMetrics>>;
    fn save_user_metrics(&self, metrics: &UserMetrics) -> Result<()>;

    fn append_xp_transaction(&self, tx: &XpTransaction) -> Result<()>;
    fn load_latest_balance(&self, user_id: &str) -> Result<i64>;
    fn load_xp_transactions(&self, user_id: &str) -> Result<Vec<XpTransaction>>;

    fn load_streak(&self, user_id: &str) -> Result<Option<Streak>>;
    fn save_streak(&self, streak: &Streak) -> Result<()>;

    fn load_unlocked_badges(&self, user_id: &str) -> Result<Vec<UserBadge>>;
    /// Returns true when the row was newly inserted; false when the
    /// (user, badge) pair already existed. Unlocking is idempotent.
    fn save_user_badge(&self, badge: &UserBadge) -> Result<bool>;

    fn save_certificate(&self, cert: &Certificate) -> Result<()>;
    fn find_certificate_by_code(&self, code: &str) -> Result<Option<Certificate>>;
    fn load_certificates(&self, user_id: &str) -> Result<Vec<Certificate>>;
}
