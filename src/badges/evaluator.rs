//! Badge rule registry and evaluation
//!
//! Each requirement shape maps to a pair of pure functions: a predicate and
//! a progress measure. Evaluation is a lookup plus a call; a catalog entry
//! whose shape has no registered rule is a deployment bug and surfaces as
//! `Configuration`, never as "user doesn't qualify yet".

use std::collections::{HashMap, HashSet};

use crate::attempt::ChallengeAttempt;
use crate::metrics::UserMetrics;
use crate::streak::Streak;
use crate::{CoachError, Result};

use super::definitions::{BADGES, Badge, Requirement, RequirementKind};

/// Everything a rule may read. Assembled once per evaluation pass from
/// already-fetched state; rules never touch the store.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub metrics: &'a UserMetrics,
    /// Completed attempts with their final readings
    pub attempts: &'a [ChallengeAttempt],
    pub streak: &'a Streak,
    pub xp_balance: i64,
    /// Levels of certificates the user holds
    pub certificate_levels: &'a [u32],
    /// Traps avoided or fixed across all attempts
    pub traps_avoided: u32,
}

type MatchFn = fn(&Requirement, &EvalContext<'_>) -> bool;
type ProgressFn = fn(&Requirement, &EvalContext<'_>) -> f64;

struct Rule {
    matches: MatchFn,
    progress: ProgressFn,
}

/// Registry-backed badge evaluator
pub struct BadgeEvaluator {
    rules: HashMap<RequirementKind, Rule>,
}

impl Default for BadgeEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl BadgeEvaluator {
    /// Build an evaluator with all built-in rules registered
    pub fn new() -> Self {
        let mut rules: HashMap<RequirementKind, Rule> = HashMap::new();
        rules.insert(
            RequirementKind::AttemptsCompleted,
            Rule { matches: attempts_completed_matches, progress: attempts_completed_progress },
        );
        rules.insert(
            RequirementKind::LowDependencyAttempts,
            Rule { matches: low_dependency_matches, progress: low_dependency_progress },
        );
        rules.insert(
            RequirementKind::PerfectPassRate,
            Rule { matches: perfect_pass_matches, progress: perfect_pass_progress },
        );
        rules.insert(
            RequirementKind::StreakDays,
            Rule { matches: streak_days_matches, progress: streak_days_progress },
        );
        rules.insert(
            RequirementKind::TrapsAvoided,
            Rule { matches: traps_avoided_matches, progress: traps_avoided_progress },
        );
        rules.insert(
            RequirementKind::CertificateEarned,
            Rule { matches: certificate_matches, progress: certificate_progress },
        );
        rules.insert(
            RequirementKind::ManualMastery,
            Rule { matches: manual_mastery_matches, progress: manual_mastery_progress },
        );
        Self { rules }
    }

    /// An evaluator with no rules, for exercising the configuration path
    #[cfg(test)]
    pub(crate) fn empty() -> Self {
        Self { rules: HashMap::new() }
    }

    /// Evaluate the whole catalog against a user's state.
    ///
    /// Returns badges that newly match; badges already in `unlocked` are
    /// skipped, which is what makes re-evaluation idempotent. Posting the
    /// reward and persisting the unlock belong to the engine.
    pub fn evaluate(
        &self,
        ctx: &EvalContext<'_>,
        unlocked: &HashSet<String>,
    ) -> Result<Vec<&'static Badge>> {
        let mut newly = Vec::new();
        for badge in BADGES {
            if unlocked.contains(badge.id.as_str()) {
                continue;
            }
            let rule = self.rule_for(&badge.requirement)?;
            if (rule.matches)(&badge.requirement, ctx) {
                newly.push(badge);
            }
        }
        Ok(newly)
    }

    /// Progress towards one badge, 0.0..=1.0
    pub fn progress(&self, badge: &Badge, ctx: &EvalContext<'_>) -> Result<f64> {
        let rule = self.rule_for(&badge.requirement)?;
        Ok((rule.progress)(&badge.requirement, ctx).clamp(0.0, 1.0))
    }

    fn rule_for(&self, requirement: &Requirement) -> Result<&Rule> {
        self.rules.get(&requirement.kind()).ok_or_else(|| {
            CoachError::Configuration(format!(
                "no rule registered for requirement shape {:?}",
                requirement.kind()
            ))
        })
    }
}

fn ratio(current: u32, target: u32) -> f64 {
    if target == 0 {
        1.0
    } else {
        (current as f64 / target as f64).min(1.0)
    }
}

fn attempts_completed_matches(req: &Requirement, ctx: &EvalContext<'_>) -> bool {
    let Requirement::AttemptsCompleted { count } = req else { return false };
    ctx.metrics.attempts_completed >= *count
}

fn attempts_completed_progress(req: &Requirement, ctx: &EvalContext<'_>) -> f64 {
    let Requirement::AttemptsCompleted { count } = req else { return 0.0 };
    ratio(ctx.metrics.attempts_completed, *count)
}

fn low_dependency_count(ctx: &EvalContext<'_>, max_di: f64) -> u32 {
    ctx.attempts
        .iter()
        .filter(|a| a.final_dependency_index.is_some_and(|di| di <= max_di))
        .count() as u32
}

fn low_dependency_matches(req: &Requirement, ctx: &EvalContext<'_>) -> bool {
    let Requirement::LowDependencyAttempts { max_di, count } = req else { return false };
    low_dependency_count(ctx, *max_di) >= *count
}

fn low_dependency_progress(req: &Requirement, ctx: &EvalContext<'_>) -> f64 {
    let Requirement::LowDependencyAttempts { max_di, count } = req else { return 0.0 };
    ratio(low_dependency_count(ctx, *max_di), *count)
}

fn perfect_pass_count(ctx: &EvalContext<'_>) -> u32 {
    ctx.attempts
        .iter()
        .filter(|a| a.final_pass_rate.is_some_and(|pr| pr >= 100.0))
        .count() as u32
}

fn perfect_pass_matches(req: &Requirement, ctx: &EvalContext<'_>) -> bool {
    let Requirement::PerfectPassRate { count } = req else { return false };
    perfect_pass_count(ctx) >= *count
}

fn perfect_pass_progress(req: &Requirement, ctx: &EvalContext<'_>) -> f64 {
    let Requirement::PerfectPassRate { count } = req else { return 0.0 };
    ratio(perfect_pass_count(ctx), *count)
}

fn streak_days_matches(req: &Requirement, ctx: &EvalContext<'_>) -> bool {
    let Requirement::StreakDays { days } = req else { return false };
    ctx.streak.current >= *days
}

fn streak_days_progress(req: &Requirement, ctx: &EvalContext<'_>) -> f64 {
    let Requirement::StreakDays { days } = req else { return 0.0 };
    ratio(ctx.streak.current, *days)
}

fn traps_avoided_matches(req: &Requirement, ctx: &EvalContext<'_>) -> bool {
    let Requirement::TrapsAvoided { count } = req else { return false };
    ctx.traps_avoided >= *count
}

fn traps_avoided_progress(req: &Requirement, ctx: &EvalContext<'_>) -> f64 {
    let Requirement::TrapsAvoided { count } = req else { return 0.0 };
    ratio(ctx.traps_avoided, *count)
}

fn certificate_matches(req: &Requirement, ctx: &EvalContext<'_>) -> bool {
    let Requirement::CertificateEarned { level } = req else { return false };
    ctx.certificate_levels.iter().any(|l| l >= level)
}

fn certificate_progress(req: &Requirement, ctx: &EvalContext<'_>) -> f64 {
    if certificate_matches(req, ctx) { 1.0 } else { 0.0 }
}

fn manual_mastery_matches(req: &Requirement, ctx: &EvalContext<'_>) -> bool {
    let Requirement::ManualMastery { max_di, min_pr } = req else { return false };
    ctx.attempts.iter().any(|a| {
        a.final_dependency_index.is_some_and(|di| di <= *max_di)
            && a.final_pass_rate.is_some_and(|pr| pr >= *min_pr)
    })
}

fn manual_mastery_progress(req: &Requirement, ctx: &EvalContext<'_>) -> f64 {
    if manual_mastery_matches(req, ctx) { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::AttemptStatus;
    use crate::badges::{Badge, BadgeId};

    fn attempt(di: f64, pr: f64) -> ChallengeAttempt {
        ChallengeAttempt {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: "u1".to_string(),
            challenge_id: "ch1".to_string(),
            language: "rust".to_string(),
            status: AttemptStatus::Completed,
            started_at_ms: 0,
            completed_at_ms: Some(600_000),
            final_dependency_index: Some(di),
            final_pass_rate: Some(pr),
            final_checklist_score: Some(80.0),
            passed: Some(pr >= 70.0),
        }
    }

    fn context<'a>(
        metrics: &'a UserMetrics,
        attempts: &'a [ChallengeAttempt],
        streak: &'a Streak,
    ) -> EvalContext<'a> {
        EvalContext {
            metrics,
            attempts,
            streak,
            xp_balance: 0,
            certificate_levels: &[],
            traps_avoided: 0,
        }
    }

    #[test]
    fn test_first_challenge_unlocks_after_one_attempt() {
        let attempts = vec![attempt(50.0, 80.0)];
        let metrics = UserMetrics {
            attempts_completed: 1,
            ..Default::default()
        };
        let streak = Streak::new("u1");
        let evaluator = BadgeEvaluator::new();
        let newly = evaluator
            .evaluate(&context(&metrics, &attempts, &streak), &HashSet::new())
            .unwrap();
        assert!(newly.iter().any(|b| b.id == BadgeId::FirstChallenge));
        assert!(!newly.iter().any(|b| b.id == BadgeId::TenChallenges));
    }

    #[test]
    fn test_evaluation_is_idempotent_over_unlocked_set() {
        let attempts = vec![attempt(5.0, 100.0)];
        let metrics = UserMetrics {
            attempts_completed: 1,
            ..Default::default()
        };
        let streak = Streak::new("u1");
        let evaluator = BadgeEvaluator::new();
        let ctx = context(&metrics, &attempts, &streak);

        let first = evaluator.evaluate(&ctx, &HashSet::new()).unwrap();
        assert!(!first.is_empty());

        let unlocked: HashSet<String> =
            first.iter().map(|b| b.id.as_str().to_string()).collect();
        let second = evaluator.evaluate(&ctx, &unlocked).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_manual_mastery_requires_both_thresholds() {
        let metrics = UserMetrics {
            attempts_completed: 1,
            ..Default::default()
        };
        let streak = Streak::new("u1");
        let evaluator = BadgeEvaluator::new();

        let low_di_full_pass = vec![attempt(2.0, 100.0)];
        let newly = evaluator
            .evaluate(&context(&metrics, &low_di_full_pass, &streak), &HashSet::new())
            .unwrap();
        assert!(newly.iter().any(|b| b.id == BadgeId::ManualMastery));

        let low_di_partial_pass = vec![attempt(2.0, 90.0)];
        let newly = evaluator
            .evaluate(&context(&metrics, &low_di_partial_pass, &streak), &HashSet::new())
            .unwrap();
        assert!(!newly.iter().any(|b| b.id == BadgeId::ManualMastery));
    }

    #[test]
    fn test_streak_badge_progress() {
        let metrics = UserMetrics::default();
        let mut streak = Streak::new("u1");
        streak.current = 3;
        let attempts = Vec::new();
        let evaluator = BadgeEvaluator::new();
        let ctx = context(&metrics, &attempts, &streak);
        let progress = evaluator
            .progress(Badge::get(BadgeId::WeekStreak), &ctx)
            .unwrap();
        assert!((progress - 3.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_rule_is_configuration_error() {
        let metrics = UserMetrics::default();
        let streak = Streak::new("u1");
        let attempts = Vec::new();
        let evaluator = BadgeEvaluator::empty();
        let err = evaluator
            .evaluate(&context(&metrics, &attempts, &streak), &HashSet::new())
            .unwrap_err();
        assert!(matches!(err, CoachError::Configuration(_)));
    }
}
