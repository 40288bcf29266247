//! Metric calculation
//!
//! Turns an attempt's raw event stream into the three normalized scores:
//!
//! - **Dependency Index (DI)**: how much of the solution is AI-sourced vs.
//!   manually written, penalized when AI output is pasted and never reworked
//! - **Pass Rate (PR)**: weighted fraction of test cases passing
//! - **Checklist Score (CS)**: fraction of qualitative checklist items
//!   satisfied, with traps folded in
//!
//! All three live in [0, 100]. Degenerate input (no events, no tests, no
//! checklist) scores 0, never a division error.

mod rolling;
mod week_bucket;

pub use rolling::{CategoryScore, UserMetrics, WeeklyTrendPoint, recompute_user_metrics};
pub use week_bucket::{day_bucket, parse_day_bucket, week_bucket};

use crate::attempt::MetricSnapshot;
use crate::challenge::Challenge;
use crate::events::{AiInteraction, ChecklistResult, CodeEvent, CodeEventKind, TestResult, TrapDetection};

/// How much an unreworked AI paste weighs against a reworked one. A fully
/// AI-sourced solution scores between 70 (heavily reworked) and 100
/// (untouched paste).
const DI_BASE_WEIGHT: f64 = 0.7;
const DI_UNTOUCHED_WEIGHT: f64 = 0.3;

/// Everything the calculator reads for one snapshot
#[derive(Debug, Clone, Copy)]
pub struct SnapshotInput<'a> {
    pub code_events: &'a [CodeEvent],
    pub ai_interactions: &'a [AiInteraction],
    pub trap_detections: &'a [TrapDetection],
    pub test_results: &'a [TestResult],
    pub checklist_results: &'a [ChecklistResult],
    /// Elapsed session time in seconds
    pub session_time_s: u64,
}

/// Stateless metric calculator
pub struct MetricCalculator;

impl MetricCalculator {
    /// Compute one DI/PR/CS reading for an attempt.
    ///
    /// Pure over its inputs; appending the snapshot (and enforcing the
    /// per-attempt chronological order of the series) is the engine's job.
    pub fn compute_snapshot(
        challenge: &Challenge,
        attempt_id: &str,
        input: &SnapshotInput<'_>,
        now_ms: i64,
    ) -> MetricSnapshot {
        MetricSnapshot {
            attempt_id: attempt_id.to_string(),
            session_time_s: input.session_time_s,
            dependency_index: Self::dependency_index(input.code_events),
            pass_rate: Self::pass_rate(challenge, input.test_results),
            checklist_score: Self::checklist_score(
                challenge,
                input.checklist_results,
                input.trap_detections,
            ),
            taken_at_ms: now_ms,
        }
    }

    /// Dependency Index over the attempt's edit stream.
    ///
    /// `ai_share` is the fraction of added lines that came from the
    /// assistant. Manual edits made after the first AI paste count as rework
    /// and shrink the untouched fraction, so pasting a large block and then
    /// rewriting it reads very differently from pasting and submitting.
    pub fn dependency_index(code_events: &[CodeEvent]) -> f64 {
        let ai_lines: u64 = code_events
            .iter()
            .filter(|e| e.ai_generated)
            .map(|e| e.lines_added as u64)
            .sum();
        let manual_lines: u64 = code_events
            .iter()
            .filter(|e| !e.ai_generated && e.kind == CodeEventKind::Typed)
            .map(|e| e.lines_added as u64)
            .sum();

        let total = ai_lines + manual_lines;
        if total == 0 || ai_lines == 0 {
            return 0.0;
        }
        let ai_share = ai_lines as f64 / total as f64;

        let first_paste_ms = code_events
            .iter()
            .filter(|e| e.ai_generated)
            .map(|e| e.timestamp_ms)
            .min()
            .unwrap_or(i64::MAX);
        let reworked: u64 = code_events
            .iter()
            .filter(|e| {
                !e.ai_generated
                    && e.timestamp_ms > first_paste_ms
                    && matches!(e.kind, CodeEventKind::Typed | CodeEventKind::Deleted)
            })
            .map(|e| (e.lines_added + e.lines_removed) as u64)
            .sum();
        let untouched = ai_lines.saturating_sub(reworked) as f64 / ai_lines as f64;

        clamp_score(100.0 * ai_share * (DI_BASE_WEIGHT + DI_UNTOUCHED_WEIGHT * untouched))
    }

    /// Weighted Pass Rate in [0, 100]. Zero test cases scores 0.
    pub fn pass_rate(challenge: &Challenge, test_results: &[TestResult]) -> f64 {
        if challenge.test_cases.is_empty() {
            return 0.0;
        }
        let passed_weight: f64 = test_results
            .iter()
            .filter(|r| r.passed)
            .map(|r| challenge.test_weight(&r.test_id))
            .sum();
        clamp_score(passed_weight * 100.0)
    }

    /// Checklist Score in [0, 100]. Zero checklist items scores 0.
    ///
    /// Per-item credit: satisfied → 1.0. Items backed by a trap follow the
    /// trap outcome instead: fixed after warning → 1.0, never fixed but
    /// learned from (explanation acknowledged + quiz passed) → 0.5, fell in
    /// and ignored → 0.0, avoided entirely → 1.0.
    pub fn checklist_score(
        challenge: &Challenge,
        checklist_results: &[ChecklistResult],
        trap_detections: &[TrapDetection],
    ) -> f64 {
        if challenge.checklist.is_empty() {
            return 0.0;
        }
        let mut credit = 0.0;
        for item in &challenge.checklist {
            if let Some(trap_id) = &item.trap_id {
                let detection = trap_detections.iter().find(|t| &t.trap_id == trap_id);
                credit += match detection {
                    Some(t) if t.fell_into_trap => {
                        if t.fixed_after_warning {
                            1.0
                        } else if t.learned_from {
                            0.5
                        } else {
                            0.0
                        }
                    }
                    // Avoided the trap, or it never triggered
                    Some(_) | None => 1.0,
                };
            } else {
                let satisfied = checklist_results
                    .iter()
                    .any(|r| r.item_id == item.id && r.satisfied);
                if satisfied {
                    credit += 1.0;
                }
            }
        }
        clamp_score(100.0 * credit / challenge.checklist.len() as f64)
    }
}

/// Clamp a score to [0, 100], mapping NaN to 0
fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{ChecklistItem, TestCase};

    fn event(kind: CodeEventKind, lines: u32, ai: bool, ts: i64) -> CodeEvent {
        CodeEvent {
            attempt_id: "a1".to_string(),
            kind,
            lines_added: lines,
            lines_removed: 0,
            ai_generated: ai,
            ai_interaction_id: None,
            timestamp_ms: ts,
        }
    }

    fn challenge() -> Challenge {
        Challenge {
            id: "ch1".to_string(),
            title: "t".to_string(),
            category: "parsing".to_string(),
            language: "rust".to_string(),
            passing_score: 70.0,
            test_cases: vec![
                TestCase { id: "t1".to_string(), weight: 0.5 },
                TestCase { id: "t2".to_string(), weight: 0.3 },
                TestCase { id: "t3".to_string(), weight: 0.2 },
            ],
            checklist: vec![
                ChecklistItem {
                    id: "c1".to_string(),
                    description: "handles empty input".to_string(),
                    trap_id: None,
                },
                ChecklistItem {
                    id: "c2".to_string(),
                    description: "avoids the N+1 query".to_string(),
                    trap_id: Some("trap1".to_string()),
                },
            ],
        }
    }

    #[test]
    fn test_di_fully_manual_is_zero() {
        let events = vec![
            event(CodeEventKind::Typed, 40, false, 1_000),
            event(CodeEventKind::Typed, 10, false, 2_000),
        ];
        assert_eq!(MetricCalculator::dependency_index(&events), 0.0);
    }

    #[test]
    fn test_di_fully_ai_untouched_is_hundred() {
        let events = vec![event(CodeEventKind::Pasted, 60, true, 1_000)];
        assert_eq!(MetricCalculator::dependency_index(&events), 100.0);
    }

    #[test]
    fn test_di_rework_after_paste_lowers_score() {
        let pasted_only = vec![event(CodeEventKind::Pasted, 30, true, 1_000)];
        let reworked = vec![
            event(CodeEventKind::Pasted, 30, true, 1_000),
            event(CodeEventKind::Typed, 20, false, 2_000),
        ];
        let di_pasted = MetricCalculator::dependency_index(&pasted_only);
        let di_reworked = MetricCalculator::dependency_index(&reworked);
        assert!(di_reworked < di_pasted);
        assert!(di_reworked > 0.0);
    }

    #[test]
    fn test_di_empty_events_is_zero_not_nan() {
        assert_eq!(MetricCalculator::dependency_index(&[]), 0.0);
    }

    #[test]
    fn test_pass_rate_weighted() {
        let ch = challenge();
        let results = vec![
            TestResult { test_id: "t1".to_string(), passed: true },
            TestResult { test_id: "t2".to_string(), passed: false },
            TestResult { test_id: "t3".to_string(), passed: true },
        ];
        let pr = MetricCalculator::pass_rate(&ch, &results);
        assert!((pr - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_pass_rate_zero_tests_sentinel() {
        let mut ch = challenge();
        ch.test_cases.clear();
        assert_eq!(MetricCalculator::pass_rate(&ch, &[]), 0.0);
    }

    #[test]
    fn test_checklist_trap_outcomes() {
        let ch = challenge();
        let satisfied = vec![ChecklistResult {
            item_id: "c1".to_string(),
            satisfied: true,
        }];

        // Fell in, never fixed, never learned: trap item scores 0
        let ignored = vec![TrapDetection {
            attempt_id: "a1".to_string(),
            trap_id: "trap1".to_string(),
            reaction_time_ms: 900,
            fell_into_trap: true,
            fixed_after_warning: false,
            learned_from: false,
        }];
        let cs = MetricCalculator::checklist_score(&ch, &satisfied, &ignored);
        assert!((cs - 50.0).abs() < 1e-9);

        // Learned from the trap: partial credit restored
        let learned = vec![TrapDetection {
            learned_from: true,
            ..ignored[0].clone()
        }];
        let cs = MetricCalculator::checklist_score(&ch, &satisfied, &learned);
        assert!((cs - 75.0).abs() < 1e-9);

        // Avoided the trap entirely: full credit
        let avoided = vec![TrapDetection {
            fell_into_trap: false,
            ..ignored[0].clone()
        }];
        let cs = MetricCalculator::checklist_score(&ch, &satisfied, &avoided);
        assert!((cs - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_checklist_empty_sentinel() {
        let mut ch = challenge();
        ch.checklist.clear();
        assert_eq!(MetricCalculator::checklist_score(&ch, &[], &[]), 0.0);
    }

    #[test]
    fn test_snapshot_degenerate_input_in_range() {
        let ch = challenge();
        let input = SnapshotInput {
            code_events: &[],
            ai_interactions: &[],
            trap_detections: &[],
            test_results: &[],
            checklist_results: &[],
            session_time_s: 0,
        };
        let snap = MetricCalculator::compute_snapshot(&ch, "a1", &input, 0);
        for value in [snap.dependency_index, snap.pass_rate, snap.checklist_score] {
            assert!(!value.is_nan());
            assert!((0.0..=100.0).contains(&value));
        }
    }
}
