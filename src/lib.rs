//! codecoach - metrics and gamification engine for coached coding challenges
//!
//! Turns the raw behavioral events of a timed coding challenge (edits, AI
//! assistant exchanges, planted-trap outcomes, test runs) into normalized
//! scores, and drives the progression loop on top of them: XP ledger,
//! levels, badges, streaks, and verifiable certificates.
//!
//! [`CoachEngine`] is the facade; everything persists through the [`Store`]
//! trait, with [`SqliteStore`] as the bundled backend.

pub mod attempt;
pub mod badges;
pub mod certificate;
pub mod challenge;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod levels;
pub mod metrics;
pub mod notify;
pub mod store;
pub mod streak;

pub use attempt::{AttemptStatus, ChallengeAttempt, MetricSnapshot};
pub use badges::{BADGES, Badge, BadgeEvaluator, BadgeId, UserBadge};
pub use certificate::{Certificate, CertificateScorer, Grade, VerificationStatus};
pub use challenge::{Challenge, ChecklistItem, TestCase};
pub use engine::{CoachEngine, CompletionOutcome};
pub use error::{CoachError, Result};
pub use events::{AiInteraction, AttemptEvent, CodeEvent, CodeEventKind, TrapDetection};
pub use ledger::{XpLedger, XpRewards, XpSource, XpTransaction};
pub use levels::Level;
pub use metrics::{MetricCalculator, UserMetrics};
pub use notify::{NotificationSink, NotifyKind, NullSink, RecordingSink};
pub use store::{SqliteStore, Store};
pub use streak::{Streak, StreakTransition};
