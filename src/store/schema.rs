pub const SCHEMA: &str = r#"
-- Tracked accounts. Only the login flow inserts rows here; the ingestion
-- pipeline never creates users from event data.
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    github_id INTEGER NOT NULL UNIQUE,
    github_username TEXT NOT NULL,
    email TEXT,
    avatar_url TEXT,

    -- Mutated only by the ledger, inside the same transaction as the
    -- transactions row it derives from.
    current_balance INTEGER NOT NULL DEFAULT 0,

    current_active_goal_id TEXT REFERENCES goals(id) ON DELETE SET NULL,

    -- Soft delete
    is_deleted INTEGER NOT NULL DEFAULT 0,
    deleted_at TEXT,

    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Repositories, created lazily at most once per external repo id.
CREATE TABLE IF NOT EXISTS repositories (
    id TEXT PRIMARY KEY,
    github_repo_id INTEGER NOT NULL UNIQUE,
    repo_name TEXT NOT NULL,
    description TEXT,
    repo_url TEXT NOT NULL,
    owner_name TEXT,

    -- Cached code-host API references
    languages_url TEXT,
    contributors_url TEXT,

    pushed_at TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Admin-curated score table; read-only to the ingestion pipeline.
CREATE TABLE IF NOT EXISTS contribution_scores (
    id TEXT PRIMARY KEY,
    contribution_type TEXT NOT NULL UNIQUE,
    score INTEGER NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- One row per distinct source event; github_event_id is the dedup key.
CREATE TABLE IF NOT EXISTS contributions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    repository_id TEXT NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    contribution_score_id TEXT NOT NULL REFERENCES contribution_scores(id),
    contribution_type TEXT NOT NULL,

    -- Snapshot of the score at creation time
    balance_change INTEGER NOT NULL,

    contributed_at TEXT NOT NULL,
    github_event_id TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Ledger entries; exactly one per contribution.
CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    contribution_id TEXT NOT NULL UNIQUE REFERENCES contributions(id) ON DELETE CASCADE,
    is_redeemed INTEGER NOT NULL DEFAULT 0,
    is_gained INTEGER NOT NULL DEFAULT 1,
    transacted_balance INTEGER NOT NULL,
    transacted_at TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Goal levels and their per-type target counts.
CREATE TABLE IF NOT EXISTS goals (
    id TEXT PRIMARY KEY,
    level TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS goal_targets (
    id TEXT PRIMARY KEY,
    goal_id TEXT NOT NULL REFERENCES goals(id) ON DELETE CASCADE,
    contribution_score_id TEXT NOT NULL REFERENCES contribution_scores(id) ON DELETE CASCADE,
    target_count INTEGER NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(goal_id, contribution_score_id)
);

-- Month-uniqueness per user and level is enforced by a date-range
-- existence check before insert, not by a constraint.
CREATE TABLE IF NOT EXISTS badges (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    badge_type TEXT NOT NULL,
    earned_at TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_contributions_user ON contributions(user_id);
CREATE INDEX IF NOT EXISTS idx_contributions_contributed_at ON contributions(contributed_at);
CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id);
CREATE INDEX IF NOT EXISTS idx_goal_targets_goal ON goal_targets(goal_id);
CREATE INDEX IF NOT EXISTS idx_badges_user ON badges(user_id);
CREATE INDEX IF NOT EXISTS idx_badges_earned_at ON badges(earned_at);
"#;
