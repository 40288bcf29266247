//! Badge definitions and metadata
//!
//! The badge catalog is static reference data. Each badge declares its
//! requirement as a value; how requirements are evaluated lives in the
//! registry, not here.

use serde::{Deserialize, Serialize};

/// Unique identifier for each badge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BadgeId {
    FirstChallenge,
    TenChallenges,
    FiftyChallenges,
    SelfReliant,
    ManualMastery,
    Perfectionist,
    WeekStreak,
    MonthStreak,
    TrapSpotter,
    CertifiedDev,
}

impl BadgeId {
    /// Get the string ID for storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstChallenge => "first_challenge",
            Self::TenChallenges => "ten_challenges",
            Self::FiftyChallenges => "fifty_challenges",
            Self::SelfReliant => "self_reliant",
            Self::ManualMastery => "manual_mastery",
            Self::Perfectionist => "perfectionist",
            Self::WeekStreak => "week_streak",
            Self::MonthStreak => "month_streak",
            Self::TrapSpotter => "trap_spotter",
            Self::CertifiedDev => "certified_dev",
        }
    }

    /// Parse from a stored string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "first_challenge" => Some(Self::FirstChallenge),
            "ten_challenges" => Some(Self::TenChallenges),
            "fifty_challenges" => Some(Self::FiftyChallenges),
            "self_reliant" => Some(Self::SelfReliant),
            "manual_mastery" => Some(Self::ManualMastery),
            "perfectionist" => Some(Self::Perfectionist),
            "week_streak" => Some(Self::WeekStreak),
            "month_streak" => Some(Self::MonthStreak),
            "trap_spotter" => Some(Self::TrapSpotter),
            "certified_dev" => Some(Self::CertifiedDev),
            _ => None,
        }
    }
}

/// Badge rarity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Common => "Common",
            Self::Rare => "Rare",
            Self::Epic => "Epic",
            Self::Legendary => "Legendary",
        }
    }
}

/// A badge's unlock requirement: the shape tag plus its parameters.
///
/// Evaluation is dispatched through the registry by `kind()`; adding a
/// variant here without registering a rule is a configuration error caught
/// at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Requirement {
    /// N completed attempts
    AttemptsCompleted { count: u32 },
    /// N completed attempts with DI at or below a threshold
    LowDependencyAttempts { max_di: f64, count: u32 },
    /// N completed attempts with a 100% pass rate
    PerfectPassRate { count: u32 },
    /// K-day activity streak
    StreakDays { days: u32 },
    /// N traps avoided or fixed across all attempts
    TrapsAvoided { count: u32 },
    /// Holds a certificate at this level or higher
    CertificateEarned { level: u32 },
    /// One attempt with DI at or below `max_di` and PR at or above `min_pr`
    ManualMastery { max_di: f64, min_pr: f64 },
}

/// The requirement shape tag the registry dispatches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequirementKind {
    AttemptsCompleted,
    LowDependencyAttempts,
    PerfectPassRate,
    StreakDays,
    TrapsAvoided,
    CertificateEarned,
    ManualMastery,
}

impl Requirement {
    pub fn kind(&self) -> RequirementKind {
        match self {
            Self::AttemptsCompleted { .. } => RequirementKind::AttemptsCompleted,
            Self::LowDependencyAttempts { .. } => RequirementKind::LowDependencyAttempts,
            Self::PerfectPassRate { .. } => RequirementKind::PerfectPassRate,
            Self::StreakDays { .. } => RequirementKind::StreakDays,
            Self::TrapsAvoided { .. } => RequirementKind::TrapsAvoided,
            Self::CertificateEarned { .. } => RequirementKind::CertificateEarned,
            Self::ManualMastery { .. } => RequirementKind::ManualMastery,
        }
    }
}

/// Badge definition with all metadata
#[derive(Debug, Clone)]
pub struct Badge {
    pub id: BadgeId,
    pub name: &'static str,
    pub description: &'static str,
    pub rarity: Rarity,
    pub requirement: Requirement,
    pub xp_reward: i64,
}

/// All badge definitions
pub static BADGES: &[Badge] = &[
    Badge {
        id: BadgeId::FirstChallenge,
        name: "First Steps",
        description: "Complete your first challenge",
        rarity: Rarity::Common,
        requirement: Requirement::AttemptsCompleted { count: 1 },
        xp_reward: 25,
    },
    Badge {
        id: BadgeId::TenChallenges,
        name: "Getting Serious",
        description: "Complete 10 challenges",
        rarity: Rarity::Common,
        requirement: Requirement::AttemptsCompleted { count: 10 },
        xp_reward: 50,
    },
    Badge {
        id: BadgeId::FiftyChallenges,
        name: "Veteran",
        description: "Complete 50 challenges",
        rarity: Rarity::Rare,
        requirement: Requirement::AttemptsCompleted { count: 50 },
        xp_reward: 150,
    },
    Badge {
        id: BadgeId::SelfReliant,
        name: "Self Reliant",
        description: "Complete 5 challenges with a Dependency Index below 30",
        rarity: Rarity::Rare,
        requirement: Requirement::LowDependencyAttempts { max_di: 30.0, count: 5 },
        xp_reward: 100,
    },
    Badge {
        id: BadgeId::ManualMastery,
        name: "Manual Mastery",
        description: "Pass every test on a challenge with almost no AI assistance",
        rarity: Rarity::Epic,
        requirement: Requirement::ManualMastery { max_di: 10.0, min_pr: 100.0 },
        xp_reward: 200,
    },
    Badge {
        id: BadgeId::Perfectionist,
        name: "Perfectionist",
        description: "Score a 100% pass rate on 3 challenges",
        rarity: Rarity::Rare,
        requirement: Requirement::PerfectPassRate { count: 3 },
        xp_reward: 100,
    },
    Badge {
        id: BadgeId::WeekStreak,
        name: "Week Warrior",
        description: "Maintain a 7-day streak",
        rarity: Rarity::Rare,
        requirement: Requirement::StreakDays { days: 7 },
        xp_reward: 75,
    },
    Badge {
        id: BadgeId::MonthStreak,
        name: "Monthly Master",
        description: "Maintain a 30-day streak",
        rarity: Rarity::Epic,
        requirement: Requirement::StreakDays { days: 30 },
        xp_reward: 300,
    },
    Badge {
        id: BadgeId::TrapSpotter,
        name: "Trap Spotter",
        description: "Avoid or fix 10 planted traps",
        rarity: Rarity::Rare,
        requirement: Requirement::TrapsAvoided { count: 10 },
        xp_reward: 100,
    },
    Badge {
        id: BadgeId::CertifiedDev,
        name: "Certified",
        description: "Earn your first certificate",
        rarity: Rarity::Legendary,
        requirement: Requirement::CertificateEarned { level: 1 },
        xp_reward: 500,
    },
];

impl Badge {
    /// Get badge definition by ID
    pub fn get(id: BadgeId) -> &'static Badge {
        BADGES
            .iter()
            .find(|b| b.id == id)
            .expect("all badges should be defined")
    }
}

/// A user's unlock record; at most one per (user, badge)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBadge {
    pub user_id: String,
    pub badge_id: String,
    pub unlocked_at_ms: i64,
    /// Progress at unlock time, 0.0..=1.0
    pub progress: f64,
}
