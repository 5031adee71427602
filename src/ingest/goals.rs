use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::Badge;

/// Evaluates a user's active goal against current-month contribution
/// aggregates and awards the level's badge when every target is met.
///
/// The pass is idempotent and re-runnable: it recomputes from aggregates
/// instead of keeping incremental counters, so backfilled or reprocessed
/// contributions cannot cause drift, and it never awards a second badge for
/// the same user, level and calendar month.
pub struct GoalEvaluator {
    store: Arc<dyn Store>,
}

impl GoalEvaluator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Returns the badge if this evaluation awarded one.
    pub fn evaluate(&self, user_id: &str, now: DateTime<Utc>) -> Result<Option<Badge>> {
        let user = self.store.get_user(user_id)?.ok_or(Error::NotFound)?;
        let Some(goal_id) = user.current_active_goal_id else {
            return Ok(None);
        };
        let Some(goal) = self.store.get_goal(&goal_id)? else {
            return Ok(None);
        };

        let targets = self.store.list_goal_targets(&goal.id)?;
        if targets.is_empty() {
            return Ok(None);
        }

        let summary =
            self.store
                .monthly_contribution_summary(user_id, now.year(), now.month())?;
        let achieved: HashMap<String, i64> = summary
            .into_iter()
            .map(|s| (s.contribution_type, s.contribution_count))
            .collect();

        let all_met = targets.iter().all(|target| {
            achieved
                .get(&target.contribution_type)
                .copied()
                .unwrap_or(0)
                >= target.target_count
        });
        if !all_met {
            return Ok(None);
        }

        let (month_start, next_month) = month_bounds(now);
        if self
            .store
            .get_badge_in_range(user_id, &goal.level, month_start, next_month)?
            .is_some()
        {
            return Ok(None);
        }

        let badge = Badge {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            badge_type: goal.level.clone(),
            earned_at: now,
            created_at: now,
        };
        self.store.create_badge(&badge)?;
        info!(
            "user {} earned '{}' badge for {}-{:02}",
            user.github_username,
            goal.level,
            now.year(),
            now.month()
        );

        Ok(Some(badge))
    }
}

fn month_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let (year, month) = (now.year(), now.month());
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    let start = Utc
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let end = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    (start, end)
}
