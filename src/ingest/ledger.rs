use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::{Inserted, Store};
use crate::types::{Contribution, Transaction};

/// Credits contributions to the coin ledger. The transaction row and the
/// balance update happen in one database transaction; either both land or
/// neither does.
pub struct Ledger {
    store: Arc<dyn Store>,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Applies a contribution to the ledger exactly once. Re-applying a
    /// contribution that already has a transaction returns it unchanged.
    pub fn apply(&self, contribution: &Contribution) -> Result<Transaction> {
        if let Some(existing) = self
            .store
            .get_transaction_by_contribution_id(&contribution.id)?
        {
            return Ok(existing);
        }

        let now = Utc::now();
        let txn = Transaction {
            id: Uuid::new_v4().to_string(),
            user_id: contribution.user_id.clone(),
            contribution_id: contribution.id.clone(),
            is_redeemed: false,
            is_gained: true,
            transacted_balance: contribution.balance_change,
            transacted_at: contribution.contributed_at,
            created_at: now,
            updated_at: now,
        };

        match self.store.record_transaction(&txn)? {
            Inserted::Created => Ok(txn),
            Inserted::AlreadyExists => self
                .store
                .get_transaction_by_contribution_id(&contribution.id)?
                .ok_or(Error::NotFound),
        }
    }
}
