//! XP level system
//!
//! Level is a pure function of cumulative XP; it is derived on read and
//! never stored next to the balance.

/// Level definition
#[derive(Debug, Clone)]
pub struct Level {
    pub level: u32,
    pub xp_required: i64,
    pub title: &'static str,
}

/// All level definitions (must be sorted by level)
pub static LEVELS: &[Level] = &[
    Level { level: 1, xp_required: 0, title: "Newcomer" },
    Level { level: 2, xp_required: 100, title: "Explorer" },
    Level { level: 3, xp_required: 250, title: "Explorer" },
    Level { level: 4, xp_required: 500, title: "Builder" },
    Level { level: 5, xp_required: 850, title: "Builder" },
    Level { level: 6, xp_required: 1300, title: "Problem Solver" },
    Level { level: 7, xp_required: 1900, title: "Problem Solver" },
    Level { level: 8, xp_required: 2600, title: "Independent Dev" },
    Level { level: 9, xp_required: 3500, title: "Independent Dev" },
    Level { level: 10, xp_required: 4600, title: "Trusted Dev" },
    Level { level: 11, xp_required: 6000, title: "Trusted Dev" },
    Level { level: 12, xp_required: 7700, title: "Mentor" },
    Level { level: 13, xp_required: 9700, title: "Mentor" },
    Level { level: 14, xp_required: 12000, title: "Craftsman" },
    Level { level: 15, xp_required: 15000, title: "Craftsman" },
    Level { level: 16, xp_required: 19000, title: "Master" },
    Level { level: 17, xp_required: 24000, title: "Master" },
    Level { level: 18, xp_required: 30000, title: "Master" },
    Level { level: 19, xp_required: 38000, title: "Grandmaster" },
    Level { level: 20, xp_required: 50000, title: "Grandmaster" },
];

impl Level {
    /// Calculate level and title for given cumulative XP
    pub fn for_xp(xp: i64) -> &'static Level {
        LEVELS
            .iter()
            .rev()
            .find(|l| xp >= l.xp_required)
            .unwrap_or(&LEVELS[0])
    }

    /// Get XP needed for the next level (None if max level)
    pub fn xp_for_next(current_level: u32) -> Option<i64> {
        LEVELS
            .iter()
            .find(|l| l.level == current_level + 1)
            .map(|l| l.xp_required)
    }

    /// Get max level
    pub fn max_level() -> u32 {
        LEVELS.last().map(|l| l.level).unwrap_or(1)
    }
}
