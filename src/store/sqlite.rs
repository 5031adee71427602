use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::schema::SCHEMA;
use super::{Inserted, Store};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

// Only a UNIQUE violation signals a lost insert race; other constraint
// failures (foreign keys, checks) must surface as errors.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        github_id: row.get(1)?,
        github_username: row.get(2)?,
        email: row.get(3)?,
        avatar_url: row.get(4)?,
        current_balance: row.get(5)?,
        current_active_goal_id: row.get(6)?,
        is_deleted: row.get(7)?,
        deleted_at: row.get::<_, Option<String>>(8)?.map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&row.get::<_, String>(9)?),
        updated_at: parse_datetime(&row.get::<_, String>(10)?),
    })
}

fn repository_from_row(row: &Row<'_>) -> rusqlite::Result<Repository> {
    Ok(Repository {
        id: row.get(0)?,
        github_repo_id: row.get(1)?,
        repo_name: row.get(2)?,
        description: row.get(3)?,
        repo_url: row.get(4)?,
        owner_name: row.get(5)?,
        languages_url: row.get(6)?,
        contributors_url: row.get(7)?,
        pushed_at: row.get::<_, Option<String>>(8)?.map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&row.get::<_, String>(9)?),
        updated_at: parse_datetime(&row.get::<_, String>(10)?),
    })
}

fn score_from_row(row: &Row<'_>) -> rusqlite::Result<ContributionScore> {
    Ok(ContributionScore {
        id: row.get(0)?,
        contribution_type: row.get(1)?,
        score: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        updated_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn contribution_from_row(row: &Row<'_>) -> rusqlite::Result<Contribution> {
    Ok(Contribution {
        id: row.get(0)?,
        user_id: row.get(1)?,
        repository_id: row.get(2)?,
        contribution_score_id: row.get(3)?,
        contribution_type: row.get(4)?,
        balance_change: row.get(5)?,
        contributed_at: parse_datetime(&row.get::<_, String>(6)?),
        github_event_id: row.get(7)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?),
        updated_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        contribution_id: row.get(2)?,
        is_redeemed: row.get(3)?,
        is_gained: row.get(4)?,
        transacted_balance: row.get(5)?,
        transacted_at: parse_datetime(&row.get::<_, String>(6)?),
        created_at: parse_datetime(&row.get::<_, String>(7)?),
        updated_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

fn goal_from_row(row: &Row<'_>) -> rusqlite::Result<Goal> {
    Ok(Goal {
        id: row.get(0)?,
        level: row.get(1)?,
        description: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
    })
}

fn badge_from_row(row: &Row<'_>) -> rusqlite::Result<Badge> {
    Ok(Badge {
        id: row.get(0)?,
        user_id: row.get(1)?,
        badge_type: row.get(2)?,
        earned_at: parse_datetime(&row.get::<_, String>(3)?),
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

const USER_COLUMNS: &str = "id, github_id, github_username, email, avatar_url, current_balance, \
     current_active_goal_id, is_deleted, deleted_at, created_at, updated_at";

const REPOSITORY_COLUMNS: &str = "id, github_repo_id, repo_name, description, repo_url, owner_name, \
     languages_url, contributors_url, pushed_at, created_at, updated_at";

const CONTRIBUTION_COLUMNS: &str = "id, user_id, repository_id, contribution_score_id, \
     contribution_type, balance_change, contributed_at, github_event_id, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, user_id, contribution_id, is_redeemed, is_gained, \
     transacted_balance, transacted_at, created_at, updated_at";

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (id, github_id, github_username, email, avatar_url, current_balance,
                 current_active_goal_id, is_deleted, deleted_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                user.id,
                user.github_id,
                user.github_username,
                user.email,
                user.avatar_url,
                user.current_balance,
                user.current_active_goal_id,
                user.is_deleted,
                user.deleted_at.as_ref().map(format_datetime),
                format_datetime(&user.created_at),
                format_datetime(&user.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_github_id(&self, github_id: i64) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE github_id = ?1"),
            params![github_id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_tracked_logins(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT github_username FROM users WHERE is_deleted = 0 ORDER BY github_username",
        )?;

        let rows = stmt.query_map([], |row| row.get(0))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn set_active_goal(&self, user_id: &str, goal_id: Option<&str>) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET current_active_goal_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![goal_id, format_datetime(&Utc::now()), user_id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    // Repository operations

    fn insert_repository(&self, repo: &Repository) -> Result<Inserted> {
        let result = self.conn().execute(
            "INSERT INTO repositories (id, github_repo_id, repo_name, description, repo_url,
                 owner_name, languages_url, contributors_url, pushed_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                repo.id,
                repo.github_repo_id,
                repo.repo_name,
                repo.description,
                repo.repo_url,
                repo.owner_name,
                repo.languages_url,
                repo.contributors_url,
                repo.pushed_at.as_ref().map(format_datetime),
                format_datetime(&repo.created_at),
                format_datetime(&repo.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(Inserted::Created),
            Err(e) if is_unique_violation(&e) => Ok(Inserted::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_repository(&self, id: &str) -> Result<Option<Repository>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {REPOSITORY_COLUMNS} FROM repositories WHERE id = ?1"),
            params![id],
            repository_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_repository_by_github_id(&self, github_repo_id: i64) -> Result<Option<Repository>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {REPOSITORY_COLUMNS} FROM repositories WHERE github_repo_id = ?1"),
            params![github_repo_id],
            repository_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    // Score operations

    fn create_score(&self, score: &ContributionScore) -> Result<()> {
        self.conn().execute(
            "INSERT INTO contribution_scores (id, contribution_type, score, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                score.id,
                score.contribution_type,
                score.score,
                format_datetime(&score.created_at),
                format_datetime(&score.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_score_by_type(&self, contribution_type: &str) -> Result<Option<ContributionScore>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, contribution_type, score, created_at, updated_at
             FROM contribution_scores WHERE contribution_type = ?1",
            params![contribution_type],
            score_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_scores(&self) -> Result<Vec<ContributionScore>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, contribution_type, score, created_at, updated_at
             FROM contribution_scores ORDER BY contribution_type",
        )?;

        let rows = stmt.query_map([], score_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Contribution operations

    fn insert_contribution(&self, contribution: &Contribution) -> Result<Inserted> {
        let result = self.conn().execute(
            "INSERT INTO contributions (id, user_id, repository_id, contribution_score_id,
                 contribution_type, balance_change, contributed_at, github_event_id,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                contribution.id,
                contribution.user_id,
                contribution.repository_id,
                contribution.contribution_score_id,
                contribution.contribution_type,
                contribution.balance_change,
                format_datetime(&contribution.contributed_at),
                contribution.github_event_id,
                format_datetime(&contribution.created_at),
                format_datetime(&contribution.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(Inserted::Created),
            Err(e) if is_unique_violation(&e) => Ok(Inserted::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_contribution_by_event_id(&self, github_event_id: &str) -> Result<Option<Contribution>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {CONTRIBUTION_COLUMNS} FROM contributions WHERE github_event_id = ?1"),
            params![github_event_id],
            contribution_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_user_contributions(&self, user_id: &str) -> Result<Vec<Contribution>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONTRIBUTION_COLUMNS} FROM contributions
             WHERE user_id = ?1 ORDER BY contributed_at DESC"
        ))?;

        let rows = stmt.query_map(params![user_id], contribution_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn monthly_contribution_summary(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<MonthlySummary>> {
        let month_key = format!("{year:04}-{month:02}");

        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT contribution_type, COUNT(*) AS contribution_count,
                    SUM(balance_change) AS total_coins
             FROM contributions
             WHERE user_id = ?1 AND strftime('%Y-%m', contributed_at) = ?2
             GROUP BY contribution_type
             ORDER BY contribution_type",
        )?;

        let rows = stmt.query_map(params![user_id, month_key], |row| {
            Ok(MonthlySummary {
                contribution_type: row.get(0)?,
                contribution_count: row.get(1)?,
                total_coins: row.get(2)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Ledger operations

    fn get_transaction_by_contribution_id(
        &self,
        contribution_id: &str,
    ) -> Result<Option<Transaction>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE contribution_id = ?1"),
            params![contribution_id],
            transaction_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn record_transaction(&self, txn: &Transaction) -> Result<Inserted> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let result = tx.execute(
            "INSERT INTO transactions (id, user_id, contribution_id, is_redeemed, is_gained,
                 transacted_balance, transacted_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                txn.id,
                txn.user_id,
                txn.contribution_id,
                txn.is_redeemed,
                txn.is_gained,
                txn.transacted_balance,
                format_datetime(&txn.transacted_at),
                format_datetime(&txn.created_at),
                format_datetime(&txn.updated_at),
            ],
        );

        match result {
            Ok(_) => {}
            // Lost the race on the contribution id: the winner already
            // credited the balance, so the whole unit is a no-op.
            Err(e) if is_unique_violation(&e) => return Ok(Inserted::AlreadyExists),
            Err(e) => return Err(Error::from(e)),
        }

        let rows = tx.execute(
            "UPDATE users SET current_balance = current_balance + ?1, updated_at = ?2 WHERE id = ?3",
            params![
                txn.transacted_balance,
                format_datetime(&Utc::now()),
                txn.user_id
            ],
        )?;

        if rows == 0 {
            // Dropping the transaction rolls back the insert.
            return Err(Error::NotFound);
        }

        tx.commit()?;
        Ok(Inserted::Created)
    }

    // Goal operations

    fn create_goal(&self, goal: &Goal) -> Result<()> {
        self.conn().execute(
            "INSERT INTO goals (id, level, description, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                goal.id,
                goal.level,
                goal.description,
                format_datetime(&goal.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_goal(&self, id: &str) -> Result<Option<Goal>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, level, description, created_at FROM goals WHERE id = ?1",
            params![id],
            goal_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_goal_by_level(&self, level: &str) -> Result<Option<Goal>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, level, description, created_at FROM goals WHERE level = ?1",
            params![level],
            goal_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_goals(&self) -> Result<Vec<Goal>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, level, description, created_at FROM goals ORDER BY level")?;

        let rows = stmt.query_map([], goal_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn create_goal_target(&self, target: &GoalTarget) -> Result<()> {
        self.conn().execute(
            "INSERT INTO goal_targets (id, goal_id, contribution_score_id, target_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                target.id,
                target.goal_id,
                target.contribution_score_id,
                target.target_count,
                format_datetime(&target.created_at),
            ],
        )?;
        Ok(())
    }

    fn list_goal_targets(&self, goal_id: &str) -> Result<Vec<GoalTargetDetail>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT s.contribution_type, t.target_count
             FROM goal_targets t
             JOIN contribution_scores s ON s.id = t.contribution_score_id
             WHERE t.goal_id = ?1
             ORDER BY s.contribution_type",
        )?;

        let rows = stmt.query_map(params![goal_id], |row| {
            Ok(GoalTargetDetail {
                contribution_type: row.get(0)?,
                target_count: row.get(1)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Badge operations

    fn create_badge(&self, badge: &Badge) -> Result<()> {
        self.conn().execute(
            "INSERT INTO badges (id, user_id, badge_type, earned_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                badge.id,
                badge.user_id,
                badge.badge_type,
                format_datetime(&badge.earned_at),
                format_datetime(&badge.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_badge_in_range(
        &self,
        user_id: &str,
        badge_type: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<Badge>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, user_id, badge_type, earned_at, created_at
             FROM badges
             WHERE user_id = ?1 AND badge_type = ?2 AND earned_at >= ?3 AND earned_at < ?4
             ORDER BY earned_at LIMIT 1",
            params![
                user_id,
                badge_type,
                format_datetime(&from),
                format_datetime(&until)
            ],
            badge_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_user_badges(&self, user_id: &str) -> Result<Vec<Badge>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, badge_type, earned_at, created_at
             FROM badges WHERE user_id = ?1 ORDER BY earned_at DESC",
        )?;

        let rows = stmt.query_map(params![user_id], badge_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;

    fn test_store() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        (temp, store)
    }

    fn sample_user(github_id: i64, login: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4().to_string(),
            github_id,
            github_username: login.to_string(),
            email: None,
            avatar_url: None,
            current_balance: 0,
            current_active_goal_id: None,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_repository(github_repo_id: i64) -> Repository {
        let now = Utc::now();
        Repository {
            id: Uuid::new_v4().to_string(),
            github_repo_id,
            repo_name: "octo/widgets".to_string(),
            description: None,
            repo_url: "https://api.github.com/repos/octo/widgets".to_string(),
            owner_name: Some("octo".to_string()),
            languages_url: None,
            contributors_url: None,
            pushed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_score(contribution_type: &str, score: i64) -> ContributionScore {
        let now = Utc::now();
        ContributionScore {
            id: Uuid::new_v4().to_string(),
            contribution_type: contribution_type.to_string(),
            score,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_contribution(
        user: &User,
        repo: &Repository,
        score: &ContributionScore,
        event_id: &str,
        contributed_at: DateTime<Utc>,
    ) -> Contribution {
        let now = Utc::now();
        Contribution {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            repository_id: repo.id.clone(),
            contribution_score_id: score.id.clone(),
            contribution_type: score.contribution_type.clone(),
            balance_change: score.score,
            contributed_at,
            github_event_id: event_id.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_initialize_creates_tables() {
        let (_temp, store) = test_store();

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"repositories".to_string()));
        assert!(tables.contains(&"contribution_scores".to_string()));
        assert!(tables.contains(&"contributions".to_string()));
        assert!(tables.contains(&"transactions".to_string()));
        assert!(tables.contains(&"goals".to_string()));
        assert!(tables.contains(&"goal_targets".to_string()));
        assert!(tables.contains(&"badges".to_string()));
    }

    #[test]
    fn test_user_lookup_by_github_id() {
        let (_temp, store) = test_store();

        let user = sample_user(42, "octocat");
        store.create_user(&user).unwrap();

        let fetched = store.get_user_by_github_id(42).unwrap().unwrap();
        assert_eq!(fetched.id, user.id);
        assert_eq!(fetched.github_username, "octocat");
        assert_eq!(fetched.current_balance, 0);

        assert!(store.get_user_by_github_id(43).unwrap().is_none());
    }

    #[test]
    fn test_tracked_logins_exclude_soft_deleted() {
        let (_temp, store) = test_store();

        store.create_user(&sample_user(1, "alice")).unwrap();
        let mut bob = sample_user(2, "bob");
        bob.is_deleted = true;
        bob.deleted_at = Some(Utc::now());
        store.create_user(&bob).unwrap();

        let logins = store.list_tracked_logins().unwrap();
        assert_eq!(logins, vec!["alice".to_string()]);
    }

    #[test]
    fn test_repository_insert_reports_race() {
        let (_temp, store) = test_store();

        let repo = sample_repository(7);
        assert_eq!(store.insert_repository(&repo).unwrap(), Inserted::Created);

        let mut rival = sample_repository(7);
        rival.repo_name = "octo/widgets-fork".to_string();
        assert_eq!(
            store.insert_repository(&rival).unwrap(),
            Inserted::AlreadyExists
        );

        let winner = store.get_repository_by_github_id(7).unwrap().unwrap();
        assert_eq!(winner.id, repo.id);
        assert_eq!(winner.repo_name, "octo/widgets");

        let by_id = store.get_repository(&repo.id).unwrap().unwrap();
        assert_eq!(by_id.github_repo_id, 7);
    }

    #[test]
    fn test_contribution_dedup_by_event_id() {
        let (_temp, store) = test_store();

        let user = sample_user(42, "octocat");
        store.create_user(&user).unwrap();
        let repo = sample_repository(7);
        store.insert_repository(&repo).unwrap();
        let score = sample_score("PullRequestMerged", 10);
        store.create_score(&score).unwrap();

        let contribution = sample_contribution(&user, &repo, &score, "E1", Utc::now());
        assert_eq!(
            store.insert_contribution(&contribution).unwrap(),
            Inserted::Created
        );

        let replay = sample_contribution(&user, &repo, &score, "E1", Utc::now());
        assert_eq!(
            store.insert_contribution(&replay).unwrap(),
            Inserted::AlreadyExists
        );

        let stored = store.get_contribution_by_event_id("E1").unwrap().unwrap();
        assert_eq!(stored.id, contribution.id);
    }

    #[test]
    fn test_record_transaction_credits_balance_once() {
        let (_temp, store) = test_store();

        let user = sample_user(42, "octocat");
        store.create_user(&user).unwrap();
        let repo = sample_repository(7);
        store.insert_repository(&repo).unwrap();
        let score = sample_score("PullRequestMerged", 10);
        store.create_score(&score).unwrap();
        let contribution = sample_contribution(&user, &repo, &score, "E1", Utc::now());
        store.insert_contribution(&contribution).unwrap();

        let now = Utc::now();
        let txn = Transaction {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            contribution_id: contribution.id.clone(),
            is_redeemed: false,
            is_gained: true,
            transacted_balance: 10,
            transacted_at: contribution.contributed_at,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(store.record_transaction(&txn).unwrap(), Inserted::Created);
        assert_eq!(store.get_user(&user.id).unwrap().unwrap().current_balance, 10);

        let mut replay = txn.clone();
        replay.id = Uuid::new_v4().to_string();
        assert_eq!(
            store.record_transaction(&replay).unwrap(),
            Inserted::AlreadyExists
        );
        assert_eq!(store.get_user(&user.id).unwrap().unwrap().current_balance, 10);

        let stored = store
            .get_transaction_by_contribution_id(&contribution.id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, txn.id);
        assert!(stored.is_gained);
        assert!(!stored.is_redeemed);
    }

    #[test]
    fn test_record_transaction_rolls_back_on_missing_user() {
        let (_temp, store) = test_store();

        let user = sample_user(42, "octocat");
        store.create_user(&user).unwrap();
        let repo = sample_repository(7);
        store.insert_repository(&repo).unwrap();
        let score = sample_score("IssueOpened", 3);
        store.create_score(&score).unwrap();
        let contribution = sample_contribution(&user, &repo, &score, "E1", Utc::now());
        store.insert_contribution(&contribution).unwrap();

        let now = Utc::now();
        let txn = Transaction {
            id: Uuid::new_v4().to_string(),
            user_id: "nope".to_string(),
            contribution_id: contribution.id.clone(),
            is_redeemed: false,
            is_gained: true,
            transacted_balance: 3,
            transacted_at: now,
            created_at: now,
            updated_at: now,
        };

        // FK on user_id fires before the balance update is attempted; either
        // way no transaction row may survive.
        let _ = store.record_transaction(&txn);
        assert!(
            store
                .get_transaction_by_contribution_id(&contribution.id)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_monthly_summary_groups_by_type() {
        let (_temp, store) = test_store();

        let user = sample_user(42, "octocat");
        store.create_user(&user).unwrap();
        let repo = sample_repository(7);
        store.insert_repository(&repo).unwrap();
        let merged = sample_score("PullRequestMerged", 10);
        store.create_score(&merged).unwrap();
        let comment = sample_score("IssueComment", 1);
        store.create_score(&comment).unwrap();

        let in_march = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let late_march = Utc.with_ymd_and_hms(2026, 3, 28, 9, 30, 0).unwrap();
        let in_april = Utc.with_ymd_and_hms(2026, 4, 2, 8, 0, 0).unwrap();

        for (event_id, score, at) in [
            ("E1", &merged, in_march),
            ("E2", &merged, late_march),
            ("E3", &comment, in_march),
            ("E4", &merged, in_april),
        ] {
            store
                .insert_contribution(&sample_contribution(&user, &repo, score, event_id, at))
                .unwrap();
        }

        let summary = store
            .monthly_contribution_summary(&user.id, 2026, 3)
            .unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].contribution_type, "IssueComment");
        assert_eq!(summary[0].contribution_count, 1);
        assert_eq!(summary[0].total_coins, 1);
        assert_eq!(summary[1].contribution_type, "PullRequestMerged");
        assert_eq!(summary[1].contribution_count, 2);
        assert_eq!(summary[1].total_coins, 20);

        let april = store
            .monthly_contribution_summary(&user.id, 2026, 4)
            .unwrap();
        assert_eq!(april.len(), 1);
        assert_eq!(april[0].contribution_count, 1);
    }

    #[test]
    fn test_badge_range_lookup() {
        let (_temp, store) = test_store();

        let user = sample_user(42, "octocat");
        store.create_user(&user).unwrap();

        let earned = Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap();
        let badge = Badge {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            badge_type: "Beginner".to_string(),
            earned_at: earned,
            created_at: earned,
        };
        store.create_badge(&badge).unwrap();

        let march_start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let april_start = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();

        let found = store
            .get_badge_in_range(&user.id, "Beginner", march_start, april_start)
            .unwrap();
        assert!(found.is_some());

        // A different level in the same month is not a hit.
        let other_level = store
            .get_badge_in_range(&user.id, "Intermediate", march_start, april_start)
            .unwrap();
        assert!(other_level.is_none());

        let may_start = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let next_month = store
            .get_badge_in_range(&user.id, "Beginner", april_start, may_start)
            .unwrap();
        assert!(next_month.is_none());
    }

    #[test]
    fn test_goal_targets_join_contribution_types() {
        let (_temp, store) = test_store();

        let merged = sample_score("PullRequestMerged", 10);
        store.create_score(&merged).unwrap();
        let opened = sample_score("PullRequestOpened", 5);
        store.create_score(&opened).unwrap();

        let now = Utc::now();
        let goal = Goal {
            id: Uuid::new_v4().to_string(),
            level: "Beginner".to_string(),
            description: None,
            created_at: now,
        };
        store.create_goal(&goal).unwrap();

        for (score, count) in [(&merged, 2), (&opened, 4)] {
            store
                .create_goal_target(&GoalTarget {
                    id: Uuid::new_v4().to_string(),
                    goal_id: goal.id.clone(),
                    contribution_score_id: score.id.clone(),
                    target_count: count,
                    created_at: now,
                })
                .unwrap();
        }

        let by_level = store.get_goal_by_level("Beginner").unwrap().unwrap();
        assert_eq!(by_level.id, goal.id);

        let targets = store.list_goal_targets(&goal.id).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].contribution_type, "PullRequestMerged");
        assert_eq!(targets[0].target_count, 2);
        assert_eq!(targets[1].contribution_type, "PullRequestOpened");
        assert_eq!(targets[1].target_count, 4);
    }
}
