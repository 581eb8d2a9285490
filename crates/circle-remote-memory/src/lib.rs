//! In-memory remote store implementation.
//!
//! This implementation is suitable for:
//! - Development and testing
//! - Single-process setups where every client shares one store instance
//!
//! Data is lost when the process exits. For several local clients sharing
//! state, use the SQLite remote store instead.

use async_trait::async_trait;
use circle_remote::{tree, ChangeStream, RemoteError, RemoteStore, StorePath, SubscriberRegistry};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::trace;

/// In-memory remote store holding flattened leaves in path order.
#[derive(Default)]
pub struct MemoryRemoteStore {
    entries: RwLock<BTreeMap<StorePath, Value>>,
    subscribers: SubscriberRegistry,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored leaves.
    pub fn len(&self) -> usize {
        self.read_entries().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_entries(&self) -> Result<RwLockReadGuard<'_, BTreeMap<StorePath, Value>>, RemoteError> {
        self.entries
            .read()
            .map_err(|_| RemoteError::Backend("entries lock poisoned".into()))
    }

    fn write_entries(
        &self,
    ) -> Result<RwLockWriteGuard<'_, BTreeMap<StorePath, Value>>, RemoteError> {
        self.entries
            .write()
            .map_err(|_| RemoteError::Backend("entries lock poisoned".into()))
    }
}

/// Drop the leaf at `path` and every leaf below it.
fn remove_subtree(entries: &mut BTreeMap<StorePath, Value>, path: &StorePath) {
    entries.remove(path);
    let below: Vec<StorePath> = entries
        .range(path.clone()..)
        .map(|(key, _)| key)
        .skip_while(|key| *key == path)
        .take_while(|key| key.as_str().starts_with(path.as_str()))
        .filter(|key| path.is_ancestor_of(key))
        .cloned()
        .collect();
    for key in below {
        entries.remove(&key);
    }
}

/// A leaf stored at an ancestor would shadow the new subtree.
fn remove_ancestor_leaves(entries: &mut BTreeMap<StorePath, Value>, path: &StorePath) {
    let mut ancestor = path.parent();
    while let Some(current) = ancestor {
        entries.remove(&current);
        ancestor = current.parent();
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn write(&self, path: &StorePath, value: Value) -> Result<(), RemoteError> {
        if value.is_null() {
            return self.remove(path).await;
        }

        let leaves = tree::flatten(path, value.clone());
        {
            let mut entries = self.write_entries()?;
            remove_subtree(&mut entries, path);
            remove_ancestor_leaves(&mut entries, path);
            entries.extend(leaves);
        }
        trace!(path = %path, "remote write");

        self.subscribers.notify(path, Some(&value));
        Ok(())
    }

    async fn read(&self, path: &StorePath) -> Result<Option<Value>, RemoteError> {
        let entries = self.read_entries()?;
        let leaves = entries
            .range(path.clone()..)
            .take_while(|(key, _)| key.as_str().starts_with(path.as_str()));
        Ok(tree::assemble(path, leaves))
    }

    async fn remove(&self, path: &StorePath) -> Result<(), RemoteError> {
        {
            let mut entries = self.write_entries()?;
            remove_subtree(&mut entries, path);
        }
        trace!(path = %path, "remote remove");

        self.subscribers.notify(path, None);
        Ok(())
    }

    async fn subscribe(&self, path: &StorePath) -> Result<ChangeStream, RemoteError> {
        Ok(self.subscribers.subscribe(path))
    }
}
