mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Outcome of an insert that races against a unique constraint. Callers
/// treat `AlreadyExists` as success by re-reading the winning row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    Created,
    AlreadyExists,
}

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_github_id(&self, github_id: i64) -> Result<Option<User>>;
    fn list_tracked_logins(&self) -> Result<Vec<String>>;
    fn set_active_goal(&self, user_id: &str, goal_id: Option<&str>) -> Result<()>;

    // Repository operations
    fn insert_repository(&self, repo: &Repository) -> Result<Inserted>;
    fn get_repository(&self, id: &str) -> Result<Option<Repository>>;
    fn get_repository_by_github_id(&self, github_repo_id: i64) -> Result<Option<Repository>>;

    // Score operations
    fn create_score(&self, score: &ContributionScore) -> Result<()>;
    fn get_score_by_type(&self, contribution_type: &str) -> Result<Option<ContributionScore>>;
    fn list_scores(&self) -> Result<Vec<ContributionScore>>;

    // Contribution operations
    fn insert_contribution(&self, contribution: &Contribution) -> Result<Inserted>;
    fn get_contribution_by_event_id(&self, github_event_id: &str) -> Result<Option<Contribution>>;
    fn list_user_contributions(&self, user_id: &str) -> Result<Vec<Contribution>>;
    fn monthly_contribution_summary(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<MonthlySummary>>;

    // Ledger operations
    fn get_transaction_by_contribution_id(
        &self,
        contribution_id: &str,
    ) -> Result<Option<Transaction>>;
    /// Inserts the transaction row and applies `transacted_balance` to the
    /// owning user's balance in a single database transaction. A unique
    /// violation on the contribution id reports `AlreadyExists` with no
    /// balance change.
    fn record_transaction(&self, txn: &Transaction) -> Result<Inserted>;

    // Goal operations
    fn create_goal(&self, goal: &Goal) -> Result<()>;
    fn get_goal(&self, id: &str) -> Result<Option<Goal>>;
    fn get_goal_by_level(&self, level: &str) -> Result<Option<Goal>>;
    fn list_goals(&self) -> Result<Vec<Goal>>;
    fn create_goal_target(&self, target: &GoalTarget) -> Result<()>;
    fn list_goal_targets(&self, goal_id: &str) -> Result<Vec<GoalTargetDetail>>;

    // Badge operations
    fn create_badge(&self, badge: &Badge) -> Result<()>;
    fn get_badge_in_range(
        &self,
        user_id: &str,
        badge_type: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<Badge>>;
    fn list_user_badges(&self, user_id: &str) -> Result<Vec<Badge>>;

    fn close(&self) -> Result<()>;
}
