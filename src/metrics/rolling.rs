//! Per-user rolling metric aggregates
//!
//! Rebuilt from scratch after every completed attempt. The snapshot time
//! series stays append-only; this aggregate is the one row per user that
//! gets overwritten.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::week_bucket::week_bucket;
use crate::attempt::ChallengeAttempt;

/// Per-category average score above which the category counts as strong
const STRONG_AREA_THRESHOLD: f64 = 75.0;
/// Below this, the category counts as weak
const WEAK_AREA_THRESHOLD: f64 = 50.0;

/// One ISO-week bucket of the trend series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyTrendPoint {
    /// ISO week, e.g. "2024-W07"
    pub week: String,
    pub avg_dependency_index: f64,
    pub avg_pass_rate: f64,
    pub avg_checklist_score: f64,
    pub attempts: u32,
}

/// Per-category rollup used for strong/weak tagging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    pub avg_pass_rate: f64,
    pub attempts: u32,
}

/// Rolling aggregate per user, recomputed after each completed attempt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetrics {
    pub user_id: String,
    pub attempts_completed: u32,
    pub average_dependency_index: f64,
    pub average_pass_rate: f64,
    pub average_checklist_score: f64,
    pub weekly_trend: Vec<WeeklyTrendPoint>,
    pub first_week_dependency_index: f64,
    pub current_week_dependency_index: f64,
    pub categories: Vec<CategoryScore>,
    pub strong_areas: Vec<String>,
    pub weak_areas: Vec<String>,
    pub updated_at_ms: i64,
}

impl UserMetrics {
    /// Week-over-journey DI delta. Negative means the user depends *less* on
    /// AI than when they started, which is the direction we coach towards.
    pub fn improvement_delta(&self) -> f64 {
        self.current_week_dependency_index - self.first_week_dependency_index
    }
}

/// Rebuild a user's rolling metrics from all completed attempts.
///
/// `challenge_categories` maps challenge id to its skill category; attempts
/// whose challenge is unknown fall into an "uncategorized" bucket rather
/// than being dropped.
pub fn recompute_user_metrics(
    user_id: &str,
    completed: &[ChallengeAttempt],
    challenge_categories: &HashMap<String, String>,
    now_ms: i64,
) -> UserMetrics {
    let mut metrics = UserMetrics {
        user_id: user_id.to_string(),
        updated_at_ms: now_ms,
        ..Default::default()
    };
    if completed.is_empty() {
        return metrics;
    }

    let mut di_sum = 0.0;
    let mut pr_sum = 0.0;
    let mut cs_sum = 0.0;

    // (week, di_sum, pr_sum, cs_sum, count), insertion-ordered by completion
    let mut weeks: Vec<(String, f64, f64, f64, u32)> = Vec::new();
    let mut by_category: HashMap<String, (f64, u32)> = HashMap::new();

    let mut ordered: Vec<&ChallengeAttempt> = completed.iter().collect();
    ordered.sort_by_key(|a| a.completed_at_ms.unwrap_or(a.started_at_ms));

    for attempt in &ordered {
        let di = attempt.final_dependency_index.unwrap_or(0.0);
        let pr = attempt.final_pass_rate.unwrap_or(0.0);
        let cs = attempt.final_checklist_score.unwrap_or(0.0);
        di_sum += di;
        pr_sum += pr;
        cs_sum += cs;

        let week = week_bucket(attempt.completed_at_ms.unwrap_or(attempt.started_at_ms));
        match weeks.iter_mut().find(|(w, ..)| *w == week) {
            Some(entry) => {
                entry.1 += di;
                entry.2 += pr;
                entry.3 += cs;
                entry.4 += 1;
            }
            None => weeks.push((week, di, pr, cs, 1)),
        }

        let category = challenge_categories
            .get(&attempt.challenge_id)
            .cloned()
            .unwrap_or_else(|| "uncategorized".to_string());
        let slot = by_category.entry(category).or_insert((0.0, 0));
        slot.0 += pr;
        slot.1 += 1;
    }

    let n = ordered.len() as f64;
    metrics.attempts_completed = ordered.len() as u32;
    metrics.average_dependency_index = di_sum / n;
    metrics.average_pass_rate = pr_sum / n;
    metrics.average_checklist_score = cs_sum / n;

    metrics.weekly_trend = weeks
        .into_iter()
        .map(|(week, di, pr, cs, count)| WeeklyTrendPoint {
            week,
            avg_dependency_index: di / count as f64,
            avg_pass_rate: pr / count as f64,
            avg_checklist_score: cs / count as f64,
            attempts: count,
        })
        .collect();

    if let Some(first) = metrics.weekly_trend.first() {
        metrics.first_week_dependency_index = first.avg_dependency_index;
    }
    // The current week is whichever bucket `now` falls into; if the user has
    // no activity this week, the latest bucket stands in.
    let this_week = week_bucket(now_ms);
    let current = metrics
        .weekly_trend
        .iter()
        .find(|p| p.week == this_week)
        .or_else(|| metrics.weekly_trend.last());
    if let Some(point) = current {
        metrics.current_week_dependency_index = point.avg_dependency_index;
    }

    let mut categories: Vec<CategoryScore> = by_category
        .into_iter()
        .map(|(category, (pr, count))| CategoryScore {
            category,
            avg_pass_rate: pr / count as f64,
            attempts: count,
        })
        .collect();
    categories.sort_by(|a, b| a.category.cmp(&b.category));

    metrics.strong_areas = categories
        .iter()
        .filter(|c| c.avg_pass_rate >= STRONG_AREA_THRESHOLD)
        .map(|c| c.category.clone())
        .collect();
    metrics.weak_areas = categories
        .iter()
        .filter(|c| c.avg_pass_rate < WEAK_AREA_THRESHOLD)
        .map(|c| c.category.clone())
        .collect();
    metrics.categories = categories;

    metrics
}
