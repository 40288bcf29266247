//! Challenge attempt and metric snapshot records

use serde::{Deserialize, Serialize};

/// Lifecycle state of a challenge attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }
}

/// One user's timed run at one challenge
///
/// Mutated by the metric calculator while in progress; immutable once
/// completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeAttempt {
    pub id: String,
    pub user_id: String,
    pub challenge_id: String,
    pub language: String,
    pub status: AttemptStatus,
    pub started_at_ms: i64,
    pub completed_at_ms: Option<i64>,
    /// Final readings, set on completion
    pub final_dependency_index: Option<f64>,
    pub final_pass_rate: Option<f64>,
    pub final_checklist_score: Option<f64>,
    pub passed: Option<bool>,
}

impl ChallengeAttempt {
    pub fn new(user_id: &str, challenge_id: &str, language: &str, now_ms: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            challenge_id: challenge_id.to_string(),
            language: language.to_string(),
            status: AttemptStatus::InProgress,
            started_at_ms: now_ms,
            completed_at_ms: None,
            final_dependency_index: None,
            final_pass_rate: None,
            final_checklist_score: None,
            passed: None,
        }
    }
}

/// A point-in-time DI/PR/CS reading during an attempt
///
/// Appended only; the series is never rewritten, which is what makes trend
/// charts trustworthy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub attempt_id: String,
    /// Elapsed session time in seconds at the moment of the reading
    pub session_time_s: u64,
    pub dependency_index: f64,
    pub pass_rate: f64,
    pub checklist_score: f64,
    pub taken_at_ms: i64,
}
