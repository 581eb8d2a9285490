//! Pushes ledger totals to the shared store.

use chrono::{NaiveDate, Utc};
use circle_remote::RemoteStore;
use circle_storage::Profile;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::identity::IdentityProvider;
use crate::ledger::LocalLedger;
use crate::locks::DateLocks;
use crate::paths;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// The shared store now holds `total_seconds` for the date.
    Pushed { total_seconds: u64 },
    /// The ledger has no record for the date.
    NothingToPush,
}

/// Last-writer-wins push of the local total for a date.
///
/// Failures never modify the ledger; the caller decides whether to retry from
/// [`SyncError::is_retryable`].
pub struct Reconciler {
    ledger: Arc<LocalLedger>,
    remote: Arc<dyn RemoteStore>,
    identity: Arc<dyn IdentityProvider>,
    locks: DateLocks,
}

impl Reconciler {
    pub fn new(
        ledger: Arc<LocalLedger>,
        remote: Arc<dyn RemoteStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            ledger,
            remote,
            identity,
            locks: DateLocks::default(),
        }
    }

    pub fn ledger(&self) -> &Arc<LocalLedger> {
        &self.ledger
    }

    /// Write the ledger's current total for `date` to `users/{uid}/usage/{date}`.
    pub async fn push(&self, date: NaiveDate) -> Result<PushOutcome, SyncError> {
        let user_id = self
            .identity
            .current_user_id()
            .ok_or_else(SyncError::unauthenticated)?;
        let _guard = self.locks.acquire(date).await;

        let Some(record) = self.ledger.get(date).await? else {
            return Ok(PushOutcome::NothingToPush);
        };
        let total_seconds = record.total_seconds;

        self.remote
            .write(&paths::user_usage(&user_id, date), json!(total_seconds))
            .await
            .map_err(|e| {
                warn!(%date, error = %e, "push failed");
                SyncError::from(e)
            })?;

        self.ledger
            .mark_synced(date, total_seconds, Utc::now())
            .await?;
        debug!(%date, total_seconds, "pushed usage");
        Ok(PushOutcome::Pushed { total_seconds })
    }

    /// Push every date the shared store has not confirmed yet.
    ///
    /// A fatal error stops immediately. Retryable errors do not stop the
    /// remaining dates; the first one is returned after all were attempted.
    pub async fn push_pending(&self) -> Result<Vec<(NaiveDate, PushOutcome)>, SyncError> {
        if self.identity.current_user_id().is_none() {
            return Err(SyncError::unauthenticated());
        }

        let pending = self.ledger.pending().await?;
        let mut outcomes = Vec::with_capacity(pending.len());
        let mut first_retryable = None;

        for record in pending {
            match self.push(record.date).await {
                Ok(outcome) => outcomes.push((record.date, outcome)),
                Err(e) if e.is_retryable() => {
                    first_retryable.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }

        info!(pushed = outcomes.len(), "pushed pending usage");
        match first_retryable {
            Some(e) => Err(e),
            None => Ok(outcomes),
        }
    }

    /// Publish the display profile other members see.
    pub async fn push_profile(&self, profile: &Profile) -> Result<(), SyncError> {
        let user_id = self
            .identity
            .current_user_id()
            .ok_or_else(SyncError::unauthenticated)?;
        let value = serde_json::to_value(profile)
            .map_err(|e| SyncError::Fatal(format!("profile encoding: {e}")))?;
        // Whole-node write, so a cleared email disappears
        self.remote
            .write(&paths::user_profile(&user_id), value)
            .await?;
        Ok(())
    }
}
