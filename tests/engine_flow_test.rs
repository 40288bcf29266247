//! Integration tests for the full scoring and gamification flow

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tempfile::tempdir;

use codecoach::{
    AttemptEvent, Challenge, ChecklistItem, CoachEngine, CoachError, CodeEvent, CodeEventKind,
    NotifyKind, RecordingSink, SqliteStore, Store, TestCase, TrapDetection, VerificationStatus,
};
use codecoach::events::{ChecklistResult, TestResult};

fn test_challenge(id: &str) -> Challenge {
    Challenge {
        id: id.to_string(),
        title: "Parse a log file".to_string(),
        category: "parsing".to_string(),
        language: "rust".to_string(),
        passing_score: 70.0,
        test_cases: vec![
            TestCase { id: "t1".to_string(), weight: 0.6 },
            TestCase { id: "t2".to_string(), weight: 0.4 },
        ],
        checklist: vec![
            ChecklistItem {
                id: "c1".to_string(),
                description: "Handles empty input".to_string(),
                trap_id: None,
            },
            ChecklistItem {
                id: "c2".to_string(),
                description: "Avoids the off-by-one trap".to_string(),
                trap_id: Some("trap_obo".to_string()),
            },
        ],
    }
}

fn setup() -> (tempfile::TempDir, Arc<SqliteStore>, Arc<RecordingSink>, CoachEngine) {
    let dir = tempdir().expect("Failed to create temp dir");
    let store = Arc::new(
        SqliteStore::open(&dir.path().join("coach.db")).expect("Failed to open store"),
    );
    let sink = Arc::new(RecordingSink::new());
    let engine = CoachEngine::new(store.clone(), sink.clone(), b"integration-secret".to_vec());
    (dir, store, sink, engine)
}

fn typed(attempt_id: &str, lines: u32, ts: i64) -> AttemptEvent {
    AttemptEvent::Code(CodeEvent {
        attempt_id: attempt_id.to_string(),
        kind: CodeEventKind::Typed,
        lines_added: lines,
        lines_removed: 0,
        ai_generated: false,
        ai_interaction_id: None,
        timestamp_ms: ts,
    })
}

/// Drive one fully-manual attempt to completion: all tests pass, the trap is
/// avoided, no AI is involved.
fn run_manual_attempt(engine: &CoachEngine, store: &dyn Store, challenge_id: &str) -> String {
    store
        .save_challenge(&test_challenge(challenge_id))
        .expect("Failed to save challenge");
    let attempt = engine
        .start_attempt("dana", challenge_id)
        .expect("Failed to start attempt");

    for (lines, ts) in [(10u32, 1_000i64), (15, 60_000), (8, 120_000)] {
        engine
            .record_event(&attempt.id, &typed(&attempt.id, lines, ts))
            .expect("Failed to record code event");
    }
    engine
        .record_event(
            &attempt.id,
            &AttemptEvent::Trap(TrapDetection {
                attempt_id: attempt.id.clone(),
                trap_id: "trap_obo".to_string(),
                reaction_time_ms: 2_500,
                fell_into_trap: false,
                fixed_after_warning: false,
                learned_from: true,
            }),
        )
        .expect("Failed to record trap detection");
    for test_id in ["t1", "t2"] {
        engine
            .record_event(
                &attempt.id,
                &AttemptEvent::Test(TestResult { test_id: test_id.to_string(), passed: true }),
            )
            .expect("Failed to record test result");
    }
    engine
        .record_event(
            &attempt.id,
            &AttemptEvent::Checklist(ChecklistResult {
                item_id: "c1".to_string(),
                satisfied: true,
            }),
        )
        .expect("Failed to record checklist result");

    attempt.id
}

#[test]
fn test_manual_mastery_flow_end_to_end() {
    let (_dir, store, sink, engine) = setup();
    let attempt_id = run_manual_attempt(&engine, store.as_ref(), "ch_logs");

    let now = Utc.with_ymd_and_hms(2024, 3, 10, 14, 0, 0).unwrap();
    let outcome = engine
        .complete_attempt_at(&attempt_id, now)
        .expect("Failed to complete attempt");

    // No AI lines at all: DI is 0, every weighted test passed
    assert_eq!(outcome.final_snapshot.dependency_index, 0.0);
    assert_eq!(outcome.final_snapshot.pass_rate, 100.0);
    // Checklist: c1 satisfied, c2's trap avoided
    assert_eq!(outcome.final_snapshot.checklist_score, 100.0);

    let attempt = store.load_attempt(&attempt_id).expect("Failed to reload attempt");
    assert_eq!(attempt.passed, Some(true), "70% passing score should be met");

    // First ever activity seeds a 1-day streak without an Extended notification
    assert_eq!(outcome.streak.current, 1);

    let badge_ids: Vec<&str> = outcome
        .unlocked_badges
        .iter()
        .map(|b| b.id.as_str())
        .collect();
    assert!(badge_ids.contains(&"first_challenge"), "got {badge_ids:?}");
    assert!(
        badge_ids.contains(&"manual_mastery"),
        "DI 0 with PR 100 should unlock manual mastery, got {badge_ids:?}"
    );

    // 50 (pass) + 25 (first challenge) + 200 (manual mastery) = 275 -> level 3
    assert_eq!(engine.xp_balance("dana").expect("Failed to read balance"), 275);
    assert_eq!(engine.level("dana").expect("Failed to read level").level, 3);

    let kinds = sink.kinds_for("dana");
    assert_eq!(
        kinds.iter().filter(|k| **k == NotifyKind::BadgeUnlocked).count(),
        2,
        "one notification per unlocked badge"
    );
    assert!(kinds.contains(&NotifyKind::LevelUp));
    assert!(!kinds.contains(&NotifyKind::StreakExtended));

    let metrics = engine
        .user_metrics("dana")
        .expect("Failed to load metrics")
        .expect("Metrics should exist after completion");
    assert_eq!(metrics.attempts_completed, 1);
    assert!((metrics.average_pass_rate - 100.0).abs() < 1e-9);
    assert_eq!(metrics.strong_areas, vec!["parsing".to_string()]);
}

#[test]
fn test_second_completion_does_not_redo_unlocks() {
    let (_dir, store, _sink, engine) = setup();
    let day1 = Utc.with_ymd_and_hms(2024, 3, 10, 14, 0, 0).unwrap();

    let first = run_manual_attempt(&engine, store.as_ref(), "ch_a");
    engine.complete_attempt_at(&first, day1).expect("Failed to complete first attempt");
    let balance_after_first = engine.xp_balance("dana").expect("Failed to read balance");

    let second = run_manual_attempt(&engine, store.as_ref(), "ch_b");
    let outcome = engine
        .complete_attempt_at(&second, day1 + Duration::hours(2))
        .expect("Failed to complete second attempt");

    // Same day: streak unchanged, no bonus posting
    assert_eq!(outcome.streak.current, 1);
    let badge_ids: Vec<&str> = outcome.unlocked_badges.iter().map(|b| b.id.as_str()).collect();
    assert!(
        !badge_ids.contains(&"first_challenge") && !badge_ids.contains(&"manual_mastery"),
        "already-unlocked badges must not re-trigger, got {badge_ids:?}"
    );
    // Only the pass reward lands the second time
    assert_eq!(
        engine.xp_balance("dana").expect("Failed to read balance"),
        balance_after_first + 50
    );
}

#[test]
fn test_next_day_completion_extends_streak_with_bonus() {
    let (_dir, store, sink, engine) = setup();
    let day1 = Utc.with_ymd_and_hms(2024, 3, 10, 14, 0, 0).unwrap();
    let day2 = Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap();

    let first = run_manual_attempt(&engine, store.as_ref(), "ch_a");
    engine.complete_attempt_at(&first, day1).expect("Failed to complete first attempt");

    let second = run_manual_attempt(&engine, store.as_ref(), "ch_b");
    let outcome = engine
        .complete_attempt_at(&second, day2)
        .expect("Failed to complete second attempt");

    assert_eq!(outcome.streak.current, 2);
    assert!(sink.kinds_for("dana").contains(&NotifyKind::StreakExtended));
    // 5 XP per streak day on day 2
    assert!(
        outcome
            .xp_transactions
            .iter()
            .any(|tx| tx.amount == 10 && tx.source.as_str() == "streak_bonus"),
        "expected a 10 XP streak bonus, got {:?}",
        outcome.xp_transactions
    );
}

#[test]
fn test_concurrent_completions_pay_out_once() {
    let (_dir, store, _sink, engine) = setup();
    let attempt_id = run_manual_attempt(&engine, store.as_ref(), "ch_a");
    let engine = Arc::new(engine);
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 14, 0, 0).unwrap();

    // Same attempt submitted from two sessions at once
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let engine = engine.clone();
            let attempt_id = attempt_id.clone();
            std::thread::spawn(move || engine.complete_attempt_at(&attempt_id, now))
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("completion thread panicked"))
        .collect();

    assert_eq!(
        results.iter().filter(|r| r.is_ok()).count(),
        1,
        "exactly one completion must win"
    );
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(CoachError::Conflict(_)))),
        "the losing completion must conflict"
    );
    // One pass reward plus the two one-time badge rewards, paid once
    assert_eq!(engine.xp_balance("dana").expect("Failed to read balance"), 275);
}

#[test]
fn test_snapshot_series_never_goes_backwards() {
    let (_dir, store, _sink, engine) = setup();
    let attempt_id = run_manual_attempt(&engine, store.as_ref(), "ch_a");

    let snap = engine
        .take_snapshot(&attempt_id, 100)
        .expect("Failed to take snapshot");
    assert_eq!(snap.session_time_s, 100);

    let err = engine
        .take_snapshot(&attempt_id, 50)
        .expect_err("Regressing session time must fail");
    assert!(matches!(err, CoachError::Conflict(_)), "got {err:?}");

    // Equal session time is allowed; the series is non-decreasing
    engine
        .take_snapshot(&attempt_id, 100)
        .expect("Failed to take equal-time snapshot");
}

#[test]
fn test_completing_twice_is_a_conflict() {
    let (_dir, store, _sink, engine) = setup();
    let attempt_id = run_manual_attempt(&engine, store.as_ref(), "ch_a");
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 14, 0, 0).unwrap();

    engine.complete_attempt_at(&attempt_id, now).expect("Failed to complete attempt");
    let err = engine
        .complete_attempt_at(&attempt_id, now + Duration::minutes(1))
        .expect_err("Second completion must fail");
    assert!(matches!(err, CoachError::Conflict(_)), "got {err:?}");

    // And the completed attempt takes no further events
    let err = engine
        .record_event(&attempt_id, &typed(&attempt_id, 1, 999_000))
        .expect_err("Events after completion must fail");
    assert!(matches!(err, CoachError::Conflict(_)), "got {err:?}");
}

#[test]
fn test_certificate_issue_and_verify_lifecycle() {
    let (_dir, _store, sink, engine) = setup();

    // 95/92/88 weighted = 92.1 -> A+
    let cert = engine
        .issue_certificate(
            "dana",
            2,
            95.0,
            92.0,
            88.0,
            vec!["rust".to_string(), "parsing".to_string()],
            serde_json::json!({ "attempts": 12 }),
        )
        .expect("Failed to issue certificate");
    assert_eq!(cert.grade.as_str(), "A+");

    assert_eq!(
        engine.verify_certificate(&cert.code).expect("Failed to verify"),
        VerificationStatus::Valid
    );
    assert_eq!(
        engine
            .verify_certificate_at(&cert.code, cert.issued_at + Duration::days(731))
            .expect("Failed to verify"),
        VerificationStatus::Expired
    );
    assert_eq!(
        engine
            .verify_certificate("AAAA-BBBB-CCCC")
            .expect("Failed to verify"),
        VerificationStatus::Invalid
    );

    // Holding a certificate unlocks the certification badge
    let kinds = sink.kinds_for("dana");
    assert!(kinds.contains(&NotifyKind::CertificateIssued));
    assert!(
        kinds.contains(&NotifyKind::BadgeUnlocked),
        "certified badge should unlock on issuance"
    );
    assert_eq!(engine.xp_balance("dana").expect("Failed to read balance"), 500);
}

#[test]
fn test_streak_at_risk_sweep() {
    let (_dir, store, sink, engine) = setup();
    let day1 = Utc.with_ymd_and_hms(2024, 3, 10, 14, 0, 0).unwrap();

    let attempt_id = run_manual_attempt(&engine, store.as_ref(), "ch_a");
    engine.complete_attempt_at(&attempt_id, day1).expect("Failed to complete attempt");

    // Active today: nothing to warn about
    assert!(!engine
        .check_streak_at_risk("dana", day1.date_naive())
        .expect("Failed to check streak"));
    // Next day with no activity yet: at risk, reminder emitted
    assert!(engine
        .check_streak_at_risk("dana", day1.date_naive().succ_opt().unwrap())
        .expect("Failed to check streak"));
    assert!(sink.kinds_for("dana").contains(&NotifyKind::StreakAtRisk));
    // Unknown user: no streak, no risk
    assert!(!engine
        .check_streak_at_risk("nobody", day1.date_naive())
        .expect("Failed to check streak"));
}
