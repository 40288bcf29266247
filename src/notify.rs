//! Notification boundary
//!
//! The engine hands significant transitions to an external sink and moves
//! on: delivery is fire-and-forget, and a failing sink never fails a
//! scoring pass.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Kinds of user-facing notification events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyKind {
    LevelUp,
    BadgeUnlocked,
    StreakExtended,
    StreakAtRisk,
    CertificateIssued,
}

impl NotifyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LevelUp => "level_up",
            Self::BadgeUnlocked => "badge_unlocked",
            Self::StreakExtended => "streak_extended",
            Self::StreakAtRisk => "streak_at_risk",
            Self::CertificateIssued => "certificate_issued",
        }
    }
}

/// External delivery collaborator
pub trait NotificationSink: Send + Sync {
    /// Deliver one event. Errors are the sink's problem to report; the
    /// engine logs and continues.
    fn emit(
        &self,
        user_id: &str,
        kind: NotifyKind,
        payload: serde_json::Value,
    ) -> anyhow::Result<()>;
}

/// Swallow-everything sink for deployments without notifications
#[derive(Debug, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn emit(&self, _: &str, _: NotifyKind, _: serde_json::Value) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Captures events in memory; test double
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, NotifyKind, serde_json::Value)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, NotifyKind, serde_json::Value)> {
        self.events.lock().expect("sink lock").clone()
    }

    pub fn kinds_for(&self, user_id: &str) -> Vec<NotifyKind> {
        self.events()
            .into_iter()
            .filter(|(u, ..)| u == user_id)
            .map(|(_, kind, _)| kind)
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn emit(&self, user_id: &str, kind: NotifyKind, payload: serde_json::Value) -> anyhow::Result<()> {
        self.events
            .lock()
            .expect("sink lock")
            .push((user_id.to_string(), kind, payload));
        Ok(())
    }
}

/// Best-effort emit helper used by the engine
pub(crate) fn emit_quietly(
    sink: &dyn NotificationSink,
    user_id: &str,
    kind: NotifyKind,
    payload: serde_json::Value,
) {
    if let Err(err) = sink.emit(user_id, kind, payload) {
        warn!(user_id, kind = kind.as_str(), %err, "notification sink failed; continuing");
    }
}
