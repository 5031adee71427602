use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::github::RepoMetadataSource;
use crate::source::{EventSource, FetchWindow};
use crate::store::Store;
use crate::types::{EventPayload, RawEvent};

use super::classify::classify;
use super::goals::GoalEvaluator;
use super::ledger::Ledger;
use super::recorder::Recorder;
use super::resolver::Resolver;

/// Result of one batch run. Events are isolated: a failing event is
/// reported here instead of aborting the remainder of the batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
}

enum EventOutcome {
    Credited { user_id: String },
    Skipped,
}

/// Drives one ingestion batch: fetch the window, then classify, resolve,
/// record and credit each event, and finally re-evaluate goals for every
/// user the batch credited.
pub struct Pipeline {
    store: Arc<dyn Store>,
    source: Arc<dyn EventSource>,
    resolver: Resolver,
    recorder: Recorder,
    ledger: Ledger,
    evaluator: GoalEvaluator,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn Store>,
        source: Arc<dyn EventSource>,
        metadata: Arc<dyn RepoMetadataSource>,
    ) -> Self {
        Self {
            resolver: Resolver::new(store.clone(), metadata),
            recorder: Recorder::new(store.clone()),
            ledger: Ledger::new(store.clone()),
            evaluator: GoalEvaluator::new(store.clone()),
            store,
            source,
        }
    }

    /// Runs one full batch over yesterday's window.
    pub fn run(&self) -> Result<BatchSummary> {
        self.run_window(FetchWindow::yesterday())
    }

    pub fn run_window(&self, window: FetchWindow) -> Result<BatchSummary> {
        let logins = self.store.list_tracked_logins()?;
        if logins.is_empty() {
            info!("no tracked users, nothing to ingest");
            return Ok(BatchSummary::default());
        }

        // A transport failure here aborts the whole batch. Everything past
        // this point is isolated per event.
        let events = self.source.fetch_window(&logins, window)?;
        info!(
            "fetched {} events for {} tracked users ({})",
            events.len(),
            logins.len(),
            window.date
        );

        let mut summary = BatchSummary::default();
        let mut credited: BTreeSet<String> = BTreeSet::new();

        for event in &events {
            match self.process_event(event) {
                Ok(EventOutcome::Credited { user_id }) => {
                    summary.processed += 1;
                    credited.insert(user_id);
                }
                Ok(EventOutcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    error!("event {}: {}", event.id, e);
                    summary.failed.push(event.id.clone());
                }
            }
        }

        // One idempotent goal pass per credited user, after the ledger has
        // settled, instead of once per event.
        for user_id in &credited {
            if let Err(e) = self.evaluator.evaluate(user_id, Utc::now()) {
                error!("goal evaluation failed for user {}: {}", user_id, e);
            }
        }

        info!(
            "batch complete: {} processed, {} skipped, {} failed",
            summary.processed,
            summary.skipped,
            summary.failed.len()
        );
        Ok(summary)
    }

    fn process_event(&self, event: &RawEvent) -> Result<EventOutcome> {
        // Dedup gate: a replayed event must not re-fetch metadata or
        // re-classify; it only needs its ledger entry confirmed.
        if let Some(existing) = self.store.get_contribution_by_event_id(&event.id)? {
            self.ledger.apply(&existing)?;
            return Ok(EventOutcome::Credited {
                user_id: existing.user_id,
            });
        }

        let payload = match EventPayload::decode(&event.payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("event {}: malformed payload, skipping: {}", event.id, e);
                return Ok(EventOutcome::Skipped);
            }
        };

        let Some(contribution_type) = classify(&event.kind, &payload) else {
            debug!("event {}: unclassified {} event", event.id, event.kind);
            return Ok(EventOutcome::Skipped);
        };

        let user = match self.resolver.resolve_user(event.actor_id) {
            Ok(user) => user,
            Err(Error::UserNotTracked(actor_id)) => {
                debug!("event {}: actor {} not tracked", event.id, actor_id);
                return Ok(EventOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        let repo = self.resolver.resolve_repository(event)?;
        let contribution = self
            .recorder
            .record(event, contribution_type, &repo, &user)?;
        self.ledger.apply(&contribution)?;

        Ok(EventOutcome::Credited { user_id: user.id })
    }
}
