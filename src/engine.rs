//! Engine facade
//!
//! The one entry point callers (an HTTP layer, a CLI) talk to. Wires the
//! calculator, ledger, badge evaluator, streak tracker, and certificate
//! scorer together over the store, and serializes per-user mutations so
//! concurrent completions cannot corrupt a ledger or streak.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info};

use crate::attempt::{AttemptStatus, ChallengeAttempt, MetricSnapshot};
use crate::badges::{BadgeEvaluator, EvalContext, UserBadge};
use crate::certificate::{Certificate, CertificateScorer, VerificationStatus};
use crate::events::AttemptEvent;
use crate::ledger::{XpLedger, XpRewards, XpSource, XpTransaction};
use crate::levels::Level;
use crate::metrics::{MetricCalculator, SnapshotInput, UserMetrics, recompute_user_metrics};
use crate::notify::{NotificationSink, NotifyKind, emit_quietly};
use crate::store::Store;
use crate::streak::{Streak, StreakTransition};
use crate::{CoachError, Result};

/// Everything a completed attempt produced
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub final_snapshot: MetricSnapshot,
    pub metrics: UserMetrics,
    pub xp_transactions: Vec<XpTransaction>,
    pub unlocked_badges: Vec<&'static crate::badges::Badge>,
    pub streak: Streak,
}

/// Central coordinator for scoring and gamification
pub struct CoachEngine {
    store: Arc<dyn Store>,
    sink: Arc<dyn NotificationSink>,
    scorer: CertificateScorer,
    evaluator: BadgeEvaluator,
    ledger: XpLedger,
    /// Per-user mutual exclusion for ledger and streak mutations; users
    /// never contend with each other
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CoachEngine {
    /// `secret` is the server-held signing key for certificate codes,
    /// injected here so the scorer stays free of process-wide state.
    pub fn new(
        store: Arc<dyn Store>,
        sink: Arc<dyn NotificationSink>,
        secret: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            ledger: XpLedger::new(store.clone()),
            store,
            sink,
            scorer: CertificateScorer::new(secret),
            evaluator: BadgeEvaluator::new(),
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().expect("user lock map poisoned");
        locks.entry(user_id.to_string()).or_default().clone()
    }

    /// Start a new attempt at a challenge
    pub fn start_attempt(&self, user_id: &str, challenge_id: &str) -> Result<ChallengeAttempt> {
        let challenge = self.store.load_challenge(challenge_id)?;
        let attempt = ChallengeAttempt::new(
            user_id,
            challenge_id,
            &challenge.language,
            Utc::now().timestamp_millis(),
        );
        self.store.create_attempt(&attempt)?;
        debug!(user_id, challenge_id, attempt_id = %attempt.id, "attempt started");
        Ok(attempt)
    }

    /// Append one behavioral event to an in-progress attempt
    pub fn record_event(&self, attempt_id: &str, event: &AttemptEvent) -> Result<()> {
        let attempt = self.store.load_attempt(attempt_id)?;
        if attempt.status != AttemptStatus::InProgress {
            return Err(CoachError::Conflict(format!(
                "attempt {attempt_id} is {}, events can no longer be recorded",
                attempt.status.as_str()
            )));
        }
        if let AttemptEvent::Code(code_event) = event {
            code_event.check()?;
        }
        self.store.append_event(attempt_id, event)
    }

    /// Compute and append one mid-attempt metric snapshot
    pub fn take_snapshot(&self, attempt_id: &str, session_time_s: u64) -> Result<MetricSnapshot> {
        let attempt = self.store.load_attempt(attempt_id)?;
        let challenge = self.store.load_challenge(&attempt.challenge_id)?;
        self.snapshot(&attempt, &challenge, session_time_s, Utc::now().timestamp_millis())
    }

    fn snapshot(
        &self,
        attempt: &ChallengeAttempt,
        challenge: &crate::challenge::Challenge,
        session_time_s: u64,
        now_ms: i64,
    ) -> Result<MetricSnapshot> {
        // Per-attempt chronological order: the series never goes backwards
        if let Some(last) = self.store.last_snapshot(&attempt.id)? {
            if session_time_s < last.session_time_s {
                return Err(CoachError::Conflict(format!(
                    "snapshot at session time {session_time_s}s precedes last snapshot at {}s",
                    last.session_time_s
                )));
            }
        }

        let events = self.store.load_attempt_events(&attempt.id)?;
        let input = SnapshotInput {
            code_events: &events.code_events,
            ai_interactions: &events.ai_interactions,
            trap_detections: &events.trap_detections,
            test_results: &events.test_results,
            checklist_results: &events.checklist_results,
            session_time_s,
        };
        let snapshot = MetricCalculator::compute_snapshot(challenge, &attempt.id, &input, now_ms);
        self.store.append_snapshot(&snapshot)?;
        Ok(snapshot)
    }

    /// Finalize an attempt: last snapshot, rolling metrics, streak, XP,
    /// badges, and the notifications those produce.
    pub fn complete_attempt(&self, attempt_id: &str) -> Result<CompletionOutcome> {
        self.complete_attempt_at(attempt_id, Utc::now())
    }

    /// Clock-injected variant of [`complete_attempt`](Self::complete_attempt)
    pub fn complete_attempt_at(
        &self,
        attempt_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome> {
        let now_ms = now.timestamp_millis();
        let user_id = self.store.load_attempt(attempt_id)?.user_id;
        let lock = self.user_lock(&user_id);
        let _guard = lock.lock().expect("user lock poisoned");

        // Status is re-read under the lock: a second completion of the same
        // attempt serializes here and conflicts instead of paying out twice
        let mut attempt = self.store.load_attempt(attempt_id)?;
        if attempt.status != AttemptStatus::InProgress {
            return Err(CoachError::Conflict(format!(
                "attempt {attempt_id} already {}",
                attempt.status.as_str()
            )));
        }
        let challenge = self.store.load_challenge(&attempt.challenge_id)?;

        let session_time_s = ((now_ms - attempt.started_at_ms).max(0) / 1000) as u64;
        let final_snapshot = self.snapshot(&attempt, &challenge, session_time_s, now_ms)?;

        let passed = final_snapshot.pass_rate >= challenge.passing_score;
        attempt.status = AttemptStatus::Completed;
        attempt.completed_at_ms = Some(now_ms);
        attempt.final_dependency_index = Some(final_snapshot.dependency_index);
        attempt.final_pass_rate = Some(final_snapshot.pass_rate);
        attempt.final_checklist_score = Some(final_snapshot.checklist_score);
        attempt.passed = Some(passed);
        self.store.update_attempt(&attempt)?;

        let balance_before = self.ledger.balance(&user_id)?;
        let mut xp_transactions = Vec::new();

        // Rolling metrics over all completed attempts
        let completed = self.store.load_completed_attempts(&user_id)?;
        let categories = self.challenge_categories(&completed)?;
        let metrics = recompute_user_metrics(&user_id, &completed, &categories, now_ms);
        self.store.save_user_metrics(&metrics)?;

        // Streak: completing an attempt is a qualifying activity
        let mut streak = self
            .store
            .load_streak(&user_id)?
            .unwrap_or_else(|| Streak::new(&user_id));
        let transition = streak.record_activity(now.date_naive())?;
        self.store.save_streak(&streak)?;
        if transition == StreakTransition::Extended {
            emit_quietly(
                self.sink.as_ref(),
                &user_id,
                NotifyKind::StreakExtended,
                json!({ "streak": streak.current }),
            );
        }

        // Completion XP, plus a streak bonus on the first activity of a day
        let base = if passed {
            XpRewards::ATTEMPT_PASSED
        } else {
            XpRewards::ATTEMPT_COMPLETED
        };
        xp_transactions.push(self.ledger.post(
            &user_id,
            base,
            XpSource::ChallengeCompletion,
            Some(attempt_id),
            if passed { "challenge passed" } else { "challenge completed" },
            now_ms,
        )?);
        if transition != StreakTransition::AlreadyCounted && streak.current > 1 {
            xp_transactions.push(self.ledger.post(
                &user_id,
                XpRewards::streak_bonus(streak.current),
                XpSource::StreakBonus,
                None,
                &format!("day {} streak bonus", streak.current),
                now_ms,
            )?);
        }

        // Badge pass over the fresh state
        let unlocked_badges =
            self.evaluate_badges(&user_id, &metrics, &completed, &streak, now_ms, &mut xp_transactions)?;

        // Level-up falls out of the balance delta, never stored
        let balance_after = self.ledger.balance(&user_id)?;
        let old_level = Level::for_xp(balance_before);
        let new_level = Level::for_xp(balance_after);
        if new_level.level > old_level.level {
            info!(user_id, level = new_level.level, "level up");
            emit_quietly(
                self.sink.as_ref(),
                &user_id,
                NotifyKind::LevelUp,
                json!({ "level": new_level.level, "title": new_level.title }),
            );
        }

        Ok(CompletionOutcome {
            final_snapshot,
            metrics,
            xp_transactions,
            unlocked_badges,
            streak,
        })
    }

    fn challenge_categories(
        &self,
        attempts: &[ChallengeAttempt],
    ) -> Result<HashMap<String, String>> {
        let mut categories = HashMap::new();
        for attempt in attempts {
            if categories.contains_key(&attempt.challenge_id) {
                continue;
            }
            match self.store.load_challenge(&attempt.challenge_id) {
                Ok(challenge) => {
                    categories.insert(attempt.challenge_id.clone(), challenge.category);
                }
                // A deleted challenge leaves its attempts uncategorized
                Err(CoachError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(categories)
    }

    fn traps_avoided(&self, attempts: &[ChallengeAttempt]) -> Result<u32> {
        let mut avoided = 0u32;
        for attempt in attempts {
            let events = self.store.load_attempt_events(&attempt.id)?;
            avoided += events
                .trap_detections
                .iter()
                .filter(|t| !t.fell_into_trap || t.fixed_after_warning)
                .count() as u32;
        }
        Ok(avoided)
    }

    /// One badge evaluation pass: unlock, reward, notify. Must run under the
    /// user's lock. Re-running with identical state is a no-op: the unlock
    /// insert is idempotent and the reward only posts for a fresh insert.
    fn evaluate_badges(
        &self,
        user_id: &str,
        metrics: &UserMetrics,
        completed: &[ChallengeAttempt],
        streak: &Streak,
        now_ms: i64,
        xp_transactions: &mut Vec<XpTransaction>,
    ) -> Result<Vec<&'static crate::badges::Badge>> {
        let unlocked: HashSet<String> = self
            .store
            .load_unlocked_badges(user_id)?
            .into_iter()
            .map(|b| b.badge_id)
            .collect();
        let certificate_levels: Vec<u32> = self
            .store
            .load_certificates(user_id)?
            .iter()
            .map(|c| c.level)
            .collect();
        let ctx = EvalContext {
            metrics,
            attempts: completed,
            streak,
            xp_balance: self.ledger.balance(user_id)?,
            certificate_levels: &certificate_levels,
            traps_avoided: self.traps_avoided(completed)?,
        };

        let newly = self.evaluator.evaluate(&ctx, &unlocked)?;
        let mut confirmed = Vec::new();
        for badge in newly {
            let inserted = self.store.save_user_badge(&UserBadge {
                user_id: user_id.to_string(),
                badge_id: badge.id.as_str().to_string(),
                unlocked_at_ms: now_ms,
                progress: self.evaluator.progress(badge, &ctx)?,
            })?;
            if !inserted {
                // Lost a race with another pass; reward was already paid
                continue;
            }
            confirmed.push(badge);
            info!(user_id, badge = badge.id.as_str(), "badge unlocked");
            xp_transactions.push(self.ledger.post(
                user_id,
                badge.xp_reward,
                XpSource::BadgeReward,
                Some(badge.id.as_str()),
                &format!("badge: {}", badge.name),
                now_ms,
            )?);
            emit_quietly(
                self.sink.as_ref(),
                user_id,
                NotifyKind::BadgeUnlocked,
                json!({
                    "badge": badge.id.as_str(),
                    "name": badge.name,
                    "rarity": badge.rarity.label(),
                    "xp_reward": badge.xp_reward,
                }),
            );
        }
        Ok(confirmed)
    }

    /// Issue a certificate and persist it. Badge rules that key on
    /// certificates are re-checked afterwards.
    #[allow(clippy::too_many_arguments)]
    pub fn issue_certificate(
        &self,
        user_id: &str,
        level: u32,
        theory: f64,
        practical: f64,
        portfolio: f64,
        skills: Vec<String>,
        stats: serde_json::Value,
    ) -> Result<Certificate> {
        let now = Utc::now();
        let cert = self
            .scorer
            .issue(user_id, level, theory, practical, portfolio, skills, stats, now)?;
        self.store.save_certificate(&cert)?;
        info!(user_id, level, grade = cert.grade.as_str(), "certificate issued");
        emit_quietly(
            self.sink.as_ref(),
            user_id,
            NotifyKind::CertificateIssued,
            json!({
                "level": cert.level,
                "grade": cert.grade.as_str(),
                "code": cert.code,
                "expires_at": cert.expires_at.to_rfc3339(),
            }),
        );

        let lock = self.user_lock(user_id);
        let _guard = lock.lock().expect("user lock poisoned");
        let now_ms = now.timestamp_millis();
        let completed = self.store.load_completed_attempts(user_id)?;
        let metrics = self
            .store
            .load_user_metrics(user_id)?
            .unwrap_or_else(|| UserMetrics {
                user_id: user_id.to_string(),
                ..Default::default()
            });
        let streak = self
            .store
            .load_streak(user_id)?
            .unwrap_or_else(|| Streak::new(user_id));
        let mut txs = Vec::new();
        self.evaluate_badges(user_id, &metrics, &completed, &streak, now_ms, &mut txs)?;

        Ok(cert)
    }

    /// Verify a certificate code against the stored record
    pub fn verify_certificate(&self, code: &str) -> Result<VerificationStatus> {
        self.verify_certificate_at(code, Utc::now())
    }

    /// Clock-injected variant of [`verify_certificate`](Self::verify_certificate)
    pub fn verify_certificate_at(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<VerificationStatus> {
        match self.store.find_certificate_by_code(code)? {
            Some(cert) => Ok(self.scorer.check(&cert, code, now)),
            None => Ok(VerificationStatus::Invalid),
        }
    }

    /// Derived streak-risk signal for a reminder sweep. Emits the
    /// notification when the streak would break without activity today;
    /// never mutates the streak itself.
    pub fn check_streak_at_risk(&self, user_id: &str, today: chrono::NaiveDate) -> Result<bool> {
        let Some(streak) = self.store.load_streak(user_id)? else {
            return Ok(false);
        };
        let at_risk = streak.is_at_risk(today);
        if at_risk {
            emit_quietly(
                self.sink.as_ref(),
                user_id,
                NotifyKind::StreakAtRisk,
                json!({ "streak": streak.current }),
            );
        }
        Ok(at_risk)
    }

    /// Read access for callers that render profiles
    pub fn user_metrics(&self, user_id: &str) -> Result<Option<UserMetrics>> {
        self.store.load_user_metrics(user_id)
    }

    pub fn xp_balance(&self, user_id: &str) -> Result<i64> {
        self.ledger.balance(user_id)
    }

    pub fn level(&self, user_id: &str) -> Result<&'static Level> {
        self.ledger.level(user_id)
    }
}
