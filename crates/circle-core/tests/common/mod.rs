//! Shared fixtures for circle-core integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use circle_core::{ActivityError, ActivitySource, LocalLedger};
use circle_remote::{ChangeStream, RemoteError, RemoteStore, StorePath};
use circle_remote_memory::MemoryRemoteStore;
use circle_store_sqlite::SqliteStore;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

pub async fn memory_ledger() -> Arc<LocalLedger> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    Arc::new(LocalLedger::new(Arc::new(store)))
}

/// In-memory remote store whose member reads (`users/{uid}/profile`) can be
/// held back, failed or hung per user. Writes can be held back too, and are
/// logged in the order they reach the store.
#[derive(Default)]
pub struct GatedRemote {
    inner: MemoryRemoteStore,
    gated: AtomicBool,
    writes_gated: AtomicBool,
    opened: Notify,
    started: AtomicUsize,
    read_started: Notify,
    writes_begun: AtomicUsize,
    write_started: Notify,
    write_log: Mutex<Vec<(StorePath, Value)>>,
    read_log: Mutex<Vec<StorePath>>,
    failing: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
}

impl GatedRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hold member reads until [`GatedRemote::open`].
    pub fn close(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    /// Hold writes until [`GatedRemote::open`].
    pub fn close_writes(&self) {
        self.writes_gated.store(true, Ordering::SeqCst);
    }

    /// Release held reads and writes.
    pub fn open(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.writes_gated.store(false, Ordering::SeqCst);
        self.opened.notify_waiters();
    }

    pub fn fail_reads_of(&self, user_id: &str) {
        self.failing.lock().unwrap().insert(user_id.to_string());
    }

    pub fn hang_reads_of(&self, user_id: &str) {
        self.hanging.lock().unwrap().insert(user_id.to_string());
    }

    /// Member reads issued so far.
    pub fn reads_started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` member reads have been issued.
    pub async fn wait_for_reads(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.read_started.notified();
                if self.reads_started() >= n {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("member reads were not issued in time");
    }

    /// Writes issued so far, including held ones.
    pub fn writes_started(&self) -> usize {
        self.writes_begun.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` writes have been issued.
    pub async fn wait_for_writes(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.write_started.notified();
                if self.writes_started() >= n {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("writes were not issued in time");
    }

    /// Writes that reached the store, oldest first.
    pub fn write_log(&self) -> Vec<(StorePath, Value)> {
        self.write_log.lock().unwrap().clone()
    }

    /// Every path read so far, oldest first.
    pub fn read_log(&self) -> Vec<StorePath> {
        self.read_log.lock().unwrap().clone()
    }

    async fn wait_until_open(&self, gate: &AtomicBool) {
        loop {
            let notified = self.opened.notified();
            if !gate.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

/// `Some(uid)` for a member profile read (`users/{uid}/profile`).
fn member_read(path: &StorePath) -> Option<String> {
    let segments: Vec<&str> = path.segments().collect();
    match segments.as_slice() {
        ["users", uid, "profile"] => Some(uid.to_string()),
        _ => None,
    }
}

#[async_trait]
impl RemoteStore for GatedRemote {
    async fn write(&self, path: &StorePath, value: Value) -> Result<(), RemoteError> {
        self.writes_begun.fetch_add(1, Ordering::SeqCst);
        self.write_started.notify_waiters();
        self.wait_until_open(&self.writes_gated).await;

        self.write_log
            .lock()
            .unwrap()
            .push((path.clone(), value.clone()));
        self.inner.write(path, value).await
    }

    async fn read(&self, path: &StorePath) -> Result<Option<Value>, RemoteError> {
        self.read_log.lock().unwrap().push(path.clone());
        if let Some(uid) = member_read(path) {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.read_started.notify_waiters();

            if self.failing.lock().unwrap().contains(&uid) {
                return Err(RemoteError::Unavailable(format!("{uid} unreachable")));
            }
            let hang = self.hanging.lock().unwrap().contains(&uid);
            if hang {
                futures::future::pending::<()>().await;
            }
            self.wait_until_open(&self.gated).await;
        }
        self.inner.read(path).await
    }

    async fn remove(&self, path: &StorePath) -> Result<(), RemoteError> {
        self.inner.remove(path).await
    }

    async fn subscribe(&self, path: &StorePath) -> Result<ChangeStream, RemoteError> {
        self.inner.subscribe(path).await
    }
}

/// Activity source returning a fixed answer.
pub struct FixedActivity(pub Result<u64, fn() -> ActivityError>);

impl FixedActivity {
    pub fn seconds(seconds: u64) -> Self {
        Self(Ok(seconds))
    }

    pub fn permission_denied() -> Self {
        Self(Err(|| ActivityError::PermissionDenied))
    }

    pub fn unavailable() -> Self {
        Self(Err(|| ActivityError::Unavailable("service not running".into())))
    }
}

#[async_trait]
impl ActivitySource for FixedActivity {
    async fn active_seconds_between(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<u64, ActivityError> {
        match &self.0 {
            Ok(seconds) => Ok(*seconds),
            Err(make) => Err(make()),
        }
    }
}
