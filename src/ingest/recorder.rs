use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::{Inserted, Store};
use crate::types::{Contribution, ContributionType, RawEvent, Repository, User};

/// Persists scored contributions, deduplicated by source event id.
pub struct Recorder {
    store: Arc<dyn Store>,
}

impl Recorder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Records one contribution for a classified event. Replays of the same
    /// source event return the existing row unchanged; the dedup check runs
    /// before anything else. `balance_change` is snapshotted from the score
    /// table at insert time.
    pub fn record(
        &self,
        event: &RawEvent,
        contribution_type: ContributionType,
        repo: &Repository,
        user: &User,
    ) -> Result<Contribution> {
        if let Some(existing) = self.store.get_contribution_by_event_id(&event.id)? {
            return Ok(existing);
        }

        let score = self
            .store
            .get_score_by_type(contribution_type.as_str())?
            .ok_or_else(|| Error::ScoreNotFound(contribution_type.as_str().to_string()))?;

        let now = Utc::now();
        let contribution = Contribution {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            repository_id: repo.id.clone(),
            contribution_score_id: score.id,
            contribution_type: score.contribution_type,
            balance_change: score.score,
            contributed_at: event.created_at,
            github_event_id: event.id.clone(),
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_contribution(&contribution)? {
            Inserted::Created => Ok(contribution),
            // Lost the race on the event id; the winning row is the record.
            Inserted::AlreadyExists => self
                .store
                .get_contribution_by_event_id(&event.id)?
                .ok_or(Error::NotFound),
        }
    }
}
