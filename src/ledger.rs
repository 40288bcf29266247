//! XP ledger
//!
//! Append-only, balance-consistent log of XP transactions. Every posting
//! records the balance it saw and the balance it produced, so replaying all
//! amounts from zero reproduces every stored `balance_after`.
//!
//! Negative postings are penalties. A debit that would drive the balance
//! below zero is rejected (`InsufficientBalance`), never clamped; the
//! balance therefore has a hard non-negative floor.
//!
//! The read-then-append sequence is not atomic by itself; callers must
//! serialize postings per user (the engine holds a per-user lock).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::levels::Level;
use crate::store::Store;
use crate::{CoachError, Result};

/// Where a transaction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpSource {
    ChallengeCompletion,
    StreakBonus,
    BadgeReward,
    Penalty,
    Adjustment,
}

impl XpSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChallengeCompletion => "challenge_completion",
            Self::StreakBonus => "streak_bonus",
            Self::BadgeReward => "badge_reward",
            Self::Penalty => "penalty",
            Self::Adjustment => "adjustment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "challenge_completion" => Some(Self::ChallengeCompletion),
            "streak_bonus" => Some(Self::StreakBonus),
            "badge_reward" => Some(Self::BadgeReward),
            "penalty" => Some(Self::Penalty),
            "adjustment" => Some(Self::Adjustment),
            _ => None,
        }
    }
}

/// One atomic change to a user's XP balance, immutable once written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpTransaction {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub source: XpSource,
    /// Badge id, attempt id, or similar, depending on the source
    pub source_id: Option<String>,
    pub reason: String,
    pub balance_before: i64,
    pub balance_after: i64,
    pub created_at_ms: i64,
}

/// Base XP amounts for engine-driven postings
pub struct XpRewards;

impl XpRewards {
    /// XP for completing an attempt that passed
    pub const ATTEMPT_PASSED: i64 = 50;

    /// XP for a completed attempt that did not pass (participation)
    pub const ATTEMPT_COMPLETED: i64 = 10;

    /// Calculate streak bonus XP: 5 per streak day, capped at 50
    pub fn streak_bonus(streak_days: u32) -> i64 {
        (streak_days as i64 * 5).min(50)
    }
}

/// Posts XP transactions against the store
pub struct XpLedger {
    store: Arc<dyn Store>,
}

impl XpLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Append one transaction.
    ///
    /// Reads the latest balance, computes `balance_after`, writes, returns
    /// the written transaction. Must be called under the user's lock.
    pub fn post(
        &self,
        user_id: &str,
        amount: i64,
        source: XpSource,
        source_id: Option<&str>,
        reason: &str,
        now_ms: i64,
    ) -> Result<XpTransaction> {
        let balance_before = self.store.load_latest_balance(user_id)?;
        let balance_after = balance_before + amount;
        if balance_after < 0 {
            return Err(CoachError::InsufficientBalance {
                balance: balance_before,
                requested: -amount,
            });
        }

        let tx = XpTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount,
            source,
            source_id: source_id.map(str::to_string),
            reason: reason.to_string(),
            balance_before,
            balance_after,
            created_at_ms: now_ms,
        };
        self.store.append_xp_transaction(&tx)?;
        Ok(tx)
    }

    /// Current balance (0 for a user with no transactions)
    pub fn balance(&self, user_id: &str) -> Result<i64> {
        self.store.load_latest_balance(user_id)
    }

    /// Level derived from the current balance; never stored
    pub fn level(&self, user_id: &str) -> Result<&'static Level> {
        Ok(Level::for_xp(self.balance(user_id)?))
    }
}
