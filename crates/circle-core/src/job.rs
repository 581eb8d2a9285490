//! Entry point for the external scheduler.

use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::collector::UsageCollector;
use crate::error::{ActivityError, CollectError};
use crate::identity::IdentityProvider;
use crate::reconciler::Reconciler;

/// What the scheduler should do after a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    /// Run again later, typically with backoff.
    Retry,
    /// Do not retry until the user signs in again.
    Fatal,
}

/// One scheduled sync: collect new activity, then push every pending date.
pub struct SyncJob {
    reconciler: Arc<Reconciler>,
    identity: Arc<dyn IdentityProvider>,
    collector: Option<UsageCollector>,
}

impl SyncJob {
    pub fn new(reconciler: Arc<Reconciler>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            reconciler,
            identity,
            collector: None,
        }
    }

    pub fn with_collector(mut self, collector: UsageCollector) -> Self {
        self.collector = Some(collector);
        self
    }

    pub async fn run(&self, now: DateTime<Local>) -> JobOutcome {
        let Some(user_id) = self.identity.current_user_id() else {
            warn!("sync skipped: no signed-in user");
            return JobOutcome::Fatal;
        };

        if let Some(collector) = &self.collector {
            match collector.collect(now).await {
                Ok(dates) => info!(user_id = %user_id, dates = dates.len(), "collected usage"),
                Err(CollectError::Activity(ActivityError::PermissionDenied)) => {
                    // Nothing to gain from retrying until the user grants access
                    warn!("usage statistics permission missing, skipping sync");
                    return JobOutcome::Success;
                }
                Err(CollectError::Activity(e)) => {
                    warn!(error = %e, "usage collection failed");
                    return JobOutcome::Retry;
                }
                Err(CollectError::Storage(e)) => {
                    error!(error = %e, "ledger write failed during collection");
                    return JobOutcome::Retry;
                }
            }
        }

        match self.reconciler.push_pending().await {
            Ok(pushed) => {
                info!(user_id = %user_id, pushed = pushed.len(), "sync finished");
                JobOutcome::Success
            }
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "sync will retry");
                JobOutcome::Retry
            }
            Err(e) => {
                error!(error = %e, "sync failed permanently");
                JobOutcome::Fatal
            }
        }
    }
}
