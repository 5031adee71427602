use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use anyhow::bail;
use chrono::{DateTime, Datelike, Days, TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use kudos::config::Config;
use kudos::github::CodeHostClient;
use kudos::ingest::Pipeline;
use kudos::server::{AppState, create_router};
use kudos::source::WarehouseClient;
use kudos::store::{SqliteStore, Store};
use kudos::types::{ContributionScore, ContributionType, Goal, GoalTarget};

/// Default point values seeded into the admin-curated score table. Covers
/// every classifier output; admins adjust the rows afterwards.
const DEFAULT_SCORES: [(ContributionType, i64); 7] = [
    (ContributionType::PullRequestMerged, 10),
    (ContributionType::PullRequestOpened, 5),
    (ContributionType::PullRequestUpdated, 1),
    (ContributionType::IssueOpened, 3),
    (ContributionType::IssueClosed, 2),
    (ContributionType::IssueResolved, 5),
    (ContributionType::IssueComment, 1),
];

const DEFAULT_GOALS: [(&str, &[(ContributionType, i64)]); 2] = [
    (
        "Beginner",
        &[
            (ContributionType::IssueOpened, 1),
            (ContributionType::IssueComment, 3),
        ],
    ),
    (
        "Intermediate",
        &[
            (ContributionType::PullRequestOpened, 2),
            (ContributionType::PullRequestMerged, 1),
            (ContributionType::IssueResolved, 2),
        ],
    ),
];

// The daily batch fires at 01:00 UTC, once yesterday's archive partition
// is complete.
const DAILY_RUN_HOUR: u32 = 1;

#[derive(Parser)]
#[command(name = "kudos")]
#[command(about = "A GitHub contribution rewards service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Run one ingestion batch and print the summary
    Run {
        /// Path to the configuration file
        #[arg(long, default_value = "kudos.toml")]
        config: String,
    },

    /// Serve the read API and the daily ingestion scheduler
    Serve {
        /// Path to the configuration file
        #[arg(long, default_value = "kudos.toml")]
        config: String,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the database and seed the score table and goal levels
    Init {
        /// Path to the configuration file
        #[arg(long, default_value = "kudos.toml")]
        config: String,
    },
}

fn open_store(config: &Config) -> anyhow::Result<Arc<SqliteStore>> {
    if let Some(parent) = config.database_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let store = SqliteStore::new(&config.database_path)?;
    Ok(Arc::new(store))
}

fn run_init(config_path: &str) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let store = open_store(&config)?;
    store.initialize()?;

    if !store.list_scores()?.is_empty() {
        bail!(
            "Database at {} is already initialized.",
            config.database_path.display()
        );
    }

    let now = Utc::now();
    let mut score_ids: HashMap<ContributionType, String> = HashMap::new();

    for (contribution_type, value) in DEFAULT_SCORES {
        let score = ContributionScore {
            id: Uuid::new_v4().to_string(),
            contribution_type: contribution_type.as_str().to_string(),
            score: value,
            created_at: now,
            updated_at: now,
        };
        store.create_score(&score)?;
        score_ids.insert(contribution_type, score.id);
    }

    for (level, targets) in DEFAULT_GOALS {
        let goal = Goal {
            id: Uuid::new_v4().to_string(),
            level: level.to_string(),
            description: None,
            created_at: now,
        };
        store.create_goal(&goal)?;

        for (contribution_type, count) in targets {
            store.create_goal_target(&GoalTarget {
                id: Uuid::new_v4().to_string(),
                goal_id: goal.id.clone(),
                contribution_score_id: score_ids[contribution_type].clone(),
                target_count: *count,
                created_at: now,
            })?;
        }
    }

    println!(
        "Initialized database at {} with {} score entries and {} goal levels.",
        config.database_path.display(),
        DEFAULT_SCORES.len(),
        DEFAULT_GOALS.len()
    );

    Ok(())
}

fn build_pipeline(config: &Config, store: Arc<SqliteStore>) -> anyhow::Result<Arc<Pipeline>> {
    let warehouse = WarehouseClient::new(&config.warehouse)?;
    let code_host = CodeHostClient::new(&config.github)?;

    Ok(Arc::new(Pipeline::new(
        store,
        Arc::new(warehouse),
        Arc::new(code_host),
    )))
}

fn until_daily_run(now: DateTime<Utc>) -> std::time::Duration {
    let today_run = Utc
        .with_ymd_and_hms(now.year(), now.month(), now.day(), DAILY_RUN_HOUR, 0, 0)
        .single()
        .unwrap_or(now);

    let next_run = if today_run > now {
        today_run
    } else {
        today_run
            .checked_add_days(Days::new(1))
            .unwrap_or(today_run)
    };

    (next_run - now)
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(60))
}

async fn run_batch(pipeline: Arc<Pipeline>) {
    let result = tokio::task::spawn_blocking(move || pipeline.run()).await;

    match result {
        Ok(Ok(summary)) => {
            if !summary.failed.is_empty() {
                error!("batch finished with failed events: {:?}", summary.failed);
            }
        }
        Ok(Err(e)) => error!("batch run failed: {e}"),
        Err(e) => error!("batch task panicked: {e}"),
    }
}

async fn run_serve(
    config: Config,
    store: Arc<SqliteStore>,
    pipeline: Arc<Pipeline>,
) -> anyhow::Result<()> {
    let scheduled = pipeline.clone();
    tokio::spawn(async move {
        loop {
            let wait = until_daily_run(Utc::now());
            info!("next scheduled batch in {:?}", wait);
            tokio::time::sleep(wait).await;
            run_batch(scheduled.clone()).await;
        }
    });

    let state = Arc::new(AppState { store, pipeline });

    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("kudos=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init { config } => {
                run_init(&config)?;
            }
        },
        Commands::Run { config } => {
            let config = Config::load(&config)?;
            let store = open_store(&config)?;
            store.initialize()?;
            let pipeline = build_pipeline(&config, store)?;

            let summary = pipeline.run()?;
            println!(
                "Batch complete: {} processed, {} skipped, {} failed.",
                summary.processed,
                summary.skipped,
                summary.failed.len()
            );
            if !summary.failed.is_empty() {
                println!("Failed event ids: {}", summary.failed.join(", "));
            }
        }
        Commands::Serve { config } => {
            let config = Config::load(&config)?;
            let store = open_store(&config)?;
            store.initialize()?;
            // Blocking clients are built before the runtime starts; the
            // pipeline itself only ever runs on the blocking pool.
            let pipeline = build_pipeline(&config, store.clone())?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(run_serve(config, store, pipeline))?;
        }
    }

    Ok(())
}
