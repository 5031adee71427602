use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked GitHub account. Rows are only ever created by the login flow;
/// the ingestion pipeline looks users up and skips events for unknown actors.
/// `current_balance` is mutated exclusively through the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub github_id: i64,
    pub github_username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub current_balance: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_active_goal_id: Option<String>,
    pub is_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A repository a tracked user contributed to, created lazily on first
/// observed contribution. The languages/contributors URLs are cached
/// references into the code-host API, not re-fetched per event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub github_repo_id: i64,
    pub repo_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub repo_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub languages_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributors_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pushed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin-curated point value for a contribution type. Read-only to the
/// ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionScore {
    pub id: String,
    pub contribution_type: String,
    pub score: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One scored contribution per distinct source event. `balance_change` is a
/// snapshot of the score at creation time; later score-table edits never
/// retroactively alter past contributions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    pub id: String,
    pub user_id: String,
    pub repository_id: String,
    pub contribution_score_id: String,
    pub contribution_type: String,
    pub balance_change: i64,
    pub contributed_at: DateTime<Utc>,
    pub github_event_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A ledger entry. Exactly one per contribution; created in the same unit
/// of work as the balance update it causes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub contribution_id: String,
    pub is_redeemed: bool,
    pub is_gained: bool,
    pub transacted_balance: i64,
    pub transacted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A named goal level (e.g. "Beginner") composed of per-type targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A per-contribution-type target count belonging to a goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalTarget {
    pub id: String,
    pub goal_id: String,
    pub contribution_score_id: String,
    pub target_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A goal target joined with its contribution type, as consumed by the
/// evaluator and the goal read API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalTargetDetail {
    pub contribution_type: String,
    pub target_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub user_id: String,
    pub badge_type: String,
    pub earned_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Per-type contribution count and coin total for one calendar month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub contribution_type: String,
    pub contribution_count: i64,
    pub total_coins: i64,
}
