//! Challenge definitions
//!
//! A challenge is static authoring data: weighted test cases, a qualitative
//! checklist, and a passing score. Weight consistency is checked when the
//! challenge is loaded, never at scoring time.

use serde::{Deserialize, Serialize};

/// Tolerance for the test-case weight sum check
const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// One weighted test case of a challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    /// Fraction of the pass rate this test contributes; all weights sum to 1.0
    pub weight: f64,
}

/// One qualitative checklist item (edge case handled, trap avoided, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub description: String,
    /// Set when this item is backed by a planted trap
    pub trap_id: Option<String>,
}

/// A timed coding challenge definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub title: String,
    /// Skill category used for strong/weak area aggregation
    pub category: String,
    pub language: String,
    /// Pass Rate threshold (0-100) above which an attempt counts as passed
    pub passing_score: f64,
    pub test_cases: Vec<TestCase>,
    pub checklist: Vec<ChecklistItem>,
}

impl Challenge {
    /// Validate authoring-time integrity. Call when the challenge is loaded;
    /// a violation here is a data-integrity error, not a scoring error.
    pub fn validate(&self) -> crate::Result<()> {
        if !(0.0..=100.0).contains(&self.passing_score) {
            return Err(crate::CoachError::Validation(format!(
                "challenge {}: passing score {} outside [0, 100]",
                self.id, self.passing_score
            )));
        }
        if let Some(tc) = self.test_cases.iter().find(|tc| tc.weight < 0.0) {
            return Err(crate::CoachError::Validation(format!(
                "challenge {}: test case {} has negative weight {}",
                self.id, tc.id, tc.weight
            )));
        }
        if !self.test_cases.is_empty() {
            let sum: f64 = self.test_cases.iter().map(|tc| tc.weight).sum();
            if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
                return Err(crate::CoachError::Validation(format!(
                    "challenge {}: test case weights sum to {sum}, expected 1.0",
                    self.id
                )));
            }
        }
        Ok(())
    }

    /// Weight of a single test case by id, 0 for unknown ids
    pub fn test_weight(&self, test_id: &str) -> f64 {
        self.test_cases
            .iter()
            .find(|tc| tc.id == test_id)
            .map(|tc| tc.weight)
            .unwrap_or(0.0)
    }
}
