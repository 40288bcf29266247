//! Behavioral event model
//!
//! Value types for the raw events a challenge attempt produces: code edits,
//! AI-assistant exchanges, and trap-detection outcomes. All of these are
//! append-only; nothing here is ever mutated after the fact.

use serde::{Deserialize, Serialize};

/// What kind of edit a code event represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeEventKind {
    Typed,
    Pasted,
    Deleted,
    Formatted,
    Saved,
}

impl CodeEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Typed => "typed",
            Self::Pasted => "pasted",
            Self::Deleted => "deleted",
            Self::Formatted => "formatted",
            Self::Saved => "saved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "typed" => Some(Self::Typed),
            "pasted" => Some(Self::Pasted),
            "deleted" => Some(Self::Deleted),
            "formatted" => Some(Self::Formatted),
            "saved" => Some(Self::Saved),
            _ => None,
        }
    }
}

/// One keystroke-granularity edit within an attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeEvent {
    pub attempt_id: String,
    pub kind: CodeEventKind,
    pub lines_added: u32,
    pub lines_removed: u32,
    /// True when the content originated from an AI assistant
    pub ai_generated: bool,
    /// Links a paste back to the AI exchange it copied from
    pub ai_interaction_id: Option<String>,
    /// Unix timestamp in milliseconds
    pub timestamp_ms: i64,
}

impl CodeEvent {
    /// Range checks the core owns (schema validation is the transport's job)
    pub fn check(&self) -> crate::Result<()> {
        if self.attempt_id.is_empty() {
            return Err(crate::CoachError::Validation(
                "code event missing attempt id".to_string(),
            ));
        }
        if self.ai_generated && self.kind == CodeEventKind::Typed {
            return Err(crate::CoachError::Validation(
                "typed events cannot be AI-generated".to_string(),
            ));
        }
        Ok(())
    }
}

/// One exchange with an AI assistant during an attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiInteraction {
    pub id: String,
    pub attempt_id: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub lines_generated: u32,
    /// Whether the user copied the assistant's output
    pub copied: bool,
    pub copied_at_ms: Option<i64>,
    pub timestamp_ms: i64,
}

/// Outcome of one planted anti-pattern ("trap") in a challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrapDetection {
    pub attempt_id: String,
    pub trap_id: String,
    /// Time from trap exposure to first user reaction
    pub reaction_time_ms: u32,
    pub fell_into_trap: bool,
    pub fixed_after_warning: bool,
    /// Acknowledged the explanation and answered the follow-up quiz correctly
    pub learned_from: bool,
}

/// A checklist item's satisfaction state at snapshot time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistResult {
    pub item_id: String,
    pub satisfied: bool,
}

/// A test case's outcome at snapshot time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: String,
    pub passed: bool,
}

/// Envelope for anything `record_event` can append to an attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttemptEvent {
    Code(CodeEvent),
    Ai(AiInteraction),
    Trap(TrapDetection),
    Test(TestResult),
    Checklist(ChecklistResult),
}
