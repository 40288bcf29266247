//! Streak tracking
//!
//! Day-granularity state machine over consecutive-activity runs. The count
//! only ever decreases through an explicit reset; a gap re-seeds the run at
//! 1 on the next qualifying activity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{CoachError, Result};

/// What a qualifying activity did to the streak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakTransition {
    /// Activity on an already-counted day
    AlreadyCounted,
    /// Consecutive day, count incremented
    Extended,
    /// First qualifying activity after a gap (or ever), count re-seeded to 1
    Started,
}

/// A user's current consecutive-activity run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Streak {
    pub user_id: String,
    pub current: u32,
    pub longest: u32,
    pub last_activity: Option<NaiveDate>,
}

impl Streak {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    /// Apply a qualifying activity on day `date`.
    ///
    /// Same day as the last activity: no-op. The day after: extend. Any
    /// later day: re-seed at 1. A date strictly before the stored last
    /// activity is stale and rejected; out-of-order events are never
    /// silently applied.
    pub fn record_activity(&mut self, date: NaiveDate) -> Result<StreakTransition> {
        let transition = match self.last_activity {
            Some(last) if date < last => {
                return Err(CoachError::Conflict(format!(
                    "streak activity on {date} is older than last recorded activity {last}"
                )));
            }
            Some(last) if date == last => StreakTransition::AlreadyCounted,
            Some(last) if last.succ_opt() == Some(date) => {
                self.current += 1;
                StreakTransition::Extended
            }
            _ => {
                self.current = 1;
                StreakTransition::Started
            }
        };
        if transition != StreakTransition::AlreadyCounted {
            self.last_activity = Some(date);
            self.longest = self.longest.max(self.current);
        }
        Ok(transition)
    }

    /// True when the streak would break without activity today.
    ///
    /// Fires for a live streak with no qualifying activity yet on `today`;
    /// drives the reminder notification without mutating anything.
    pub fn is_at_risk(&self, today: NaiveDate) -> bool {
        if self.current == 0 {
            return false;
        }
        match self.last_activity {
            Some(last) => last < today,
            None => false,
        }
    }

    /// Explicit reset (administrative or inactivity sweep). The only
    /// transition that decreases the count; the row is kept, never deleted.
    /// Clears the anchor day too, so the next qualifying activity always
    /// re-seeds the run at 1 even on the same calendar day.
    pub fn reset(&mut self) {
        self.current = 0;
        self.last_activity = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_consecutive_days_extend() {
        let mut streak = Streak::new("u1");
        assert_eq!(streak.record_activity(day(1)).unwrap(), StreakTransition::Started);
        assert_eq!(streak.current, 1);
        assert_eq!(streak.record_activity(day(2)).unwrap(), StreakTransition::Extended);
        assert_eq!(streak.current, 2);
    }

    #[test]
    fn test_same_day_is_noop() {
        let mut streak = Streak::new("u1");
        streak.record_activity(day(1)).unwrap();
        assert_eq!(
            streak.record_activity(day(1)).unwrap(),
            StreakTransition::AlreadyCounted
        );
        assert_eq!(streak.current, 1);
    }

    #[test]
    fn test_gap_reseeds_to_one() {
        let mut streak = Streak::new("u1");
        streak.record_activity(day(1)).unwrap();
        streak.record_activity(day(2)).unwrap();
        // Day 3 skipped
        assert_eq!(streak.record_activity(day(4)).unwrap(), StreakTransition::Started);
        assert_eq!(streak.current, 1);
        assert_eq!(streak.longest, 2);
    }

    #[test]
    fn test_out_of_order_activity_rejected() {
        let mut streak = Streak::new("u1");
        streak.record_activity(day(2)).unwrap();
        let err = streak.record_activity(day(1)).unwrap_err();
        assert!(matches!(err, CoachError::Conflict(_)));
        // Rejected, not applied
        assert_eq!(streak.current, 1);
        assert_eq!(streak.last_activity, Some(day(2)));
    }

    #[test]
    fn test_at_risk_predicate() {
        let mut streak = Streak::new("u1");
        assert!(!streak.is_at_risk(day(1)));
        streak.record_activity(day(1)).unwrap();
        assert!(!streak.is_at_risk(day(1))); // Counted today
        assert!(streak.is_at_risk(day(2))); // Nothing yet today
        streak.reset();
        assert!(!streak.is_at_risk(day(2))); // No live streak, nothing to lose
    }

    #[test]
    fn test_reset_is_the_only_decrease() {
        let mut streak = Streak::new("u1");
        for d in 1..=5 {
            streak.record_activity(day(d)).unwrap();
        }
        assert_eq!(streak.current, 5);
        streak.reset();
        assert_eq!(streak.current, 0);
        assert_eq!(streak.longest, 5);
        // Next activity starts a fresh run
        assert_eq!(streak.record_activity(day(6)).unwrap(), StreakTransition::Started);
        assert_eq!(streak.current, 1);
    }

    #[test]
    fn test_same_day_activity_after_reset_starts_fresh() {
        let mut streak = Streak::new("u1");
        for d in 1..=5 {
            streak.record_activity(day(d)).unwrap();
        }
        streak.reset();
        // Activity later on the reset day re-seeds the run; it must not be
        // swallowed as already counted
        assert_eq!(streak.record_activity(day(5)).unwrap(), StreakTransition::Started);
        assert_eq!(streak.current, 1);
        assert_eq!(streak.longest, 5);
    }
}
