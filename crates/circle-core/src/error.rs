use circle_remote::RemoteError;
use circle_storage::StoreError;
use thiserror::Error;

/// Local persistence failed. Never swallowed: the ledger is the only record
/// of time not yet pushed.
#[derive(Debug, Error)]
#[error("local storage failed: {0}")]
pub struct StorageError(#[from] pub StoreError);

/// Outcome classes of a failed remote operation, as seen by the scheduler.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Try again on a later run.
    #[error("sync failed, will retry: {0}")]
    Retryable(String),
    /// Do not retry until the condition (e.g. sign-in) changes.
    #[error("sync failed: {0}")]
    Fatal(String),
}

impl SyncError {
    pub fn unauthenticated() -> Self {
        SyncError::Fatal("no authenticated user".to_string())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Retryable(_))
    }
}

impl From<RemoteError> for SyncError {
    fn from(e: RemoteError) -> Self {
        if e.is_transient() {
            SyncError::Retryable(e.to_string())
        } else {
            SyncError::Fatal(e.to_string())
        }
    }
}

impl From<StorageError> for SyncError {
    fn from(e: StorageError) -> Self {
        SyncError::Retryable(e.to_string())
    }
}

/// Failure of the OS usage-statistics facility.
#[derive(Debug, Error)]
pub enum ActivityError {
    /// The user has not granted access to usage statistics.
    #[error("usage statistics permission not granted")]
    PermissionDenied,
    #[error("usage statistics unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Activity(#[from] ActivityError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
