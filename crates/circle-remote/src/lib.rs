//! Shared remote store abstraction for screencircle.
//!
//! The remote store is the multi-writer authority every group member reads
//! and writes. This crate defines the [`RemoteStore`] trait so the sync core
//! can run against different implementations:
//! - Memory (single process, tests and local development)
//! - SQLite (single host, several local clients sharing one database file)
//!
//! Values are JSON trees addressed by slash-delimited [`StorePath`]s. Writing
//! an object replaces the whole subtree at that path (last writer wins per key).

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use thiserror::Error;

mod path;
mod registry;
pub mod tree;

pub use path::StorePath;
pub use registry::SubscriberRegistry;

/// Notification that the value at `path` changed.
///
/// Delivered to every subscriber whose path is `path`, an ancestor of it, or a
/// descendant of it. `value` is the new value at `path`; `None` means removed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub path: StorePath,
    pub value: Option<Value>,
}

/// Error type for remote store operations
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
    #[error("remote operation timed out")]
    Timeout,
    #[error("not authenticated")]
    Unauthenticated,
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl RemoteError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::Unavailable(_) | RemoteError::Timeout | RemoteError::Backend(_)
        )
    }
}

/// Stream of change notifications for one subscription.
pub type ChangeStream = Pin<Box<dyn Stream<Item = ChangeEvent> + Send>>;

/// Key-value + pub/sub hybrid shared by all devices of all group members.
///
/// Implementations provide per-key atomic last-writer-wins semantics.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Replace the value (or whole subtree) at `path`.
    ///
    /// Writing `Value::Null` is equivalent to [`RemoteStore::remove`].
    async fn write(&self, path: &StorePath, value: Value) -> Result<(), RemoteError>;

    /// Read the value (or assembled subtree) at `path`.
    async fn read(&self, path: &StorePath) -> Result<Option<Value>, RemoteError>;

    /// Remove the value and everything below `path`.
    async fn remove(&self, path: &StorePath) -> Result<(), RemoteError>;

    /// Subscribe to changes at, above, or below `path`.
    ///
    /// Only changes made after the call returns are delivered; callers that
    /// need the current value read it after subscribing.
    async fn subscribe(&self, path: &StorePath) -> Result<ChangeStream, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RemoteError::Unavailable("offline".into()).is_transient());
        assert!(RemoteError::Timeout.is_transient());
        assert!(RemoteError::Backend("io".into()).is_transient());
        assert!(!RemoteError::Unauthenticated.is_transient());
        assert!(!RemoteError::PermissionDenied("rules".into()).is_transient());
        assert!(!RemoteError::InvalidPath("".into()).is_transient());
    }

    #[test]
    fn test_remote_error_display() {
        let error = RemoteError::Unavailable("connection refused".to_string());
        let display = error.to_string();
        assert!(display.contains("unavailable"));
        assert!(display.contains("connection refused"));
    }

    #[test]
    fn test_change_event_serialization() {
        let event = ChangeEvent {
            path: StorePath::root("users").child("alice"),
            value: Some(Value::from(42)),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
