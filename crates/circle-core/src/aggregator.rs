//! Group leaderboard aggregation.
//!
//! A subscription watches a group's member set and each member's usage for one
//! date. Every change starts a new pass: the pass is stamped with the next
//! generation, reads every member concurrently (each read bounded by a
//! timeout), and publishes a ranked [`GroupSnapshot`] only if no newer pass
//! was requested in the meantime and the subscription is still live.

use chrono::NaiveDate;
use circle_remote::{ChangeStream, RemoteStore};
use circle_storage::{GroupId, UserId};
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio_stream::StreamMap;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::membership::{MemberStream, MembershipIndex};
use crate::paths;

/// Display name for members without a readable profile.
pub const UNKNOWN_NAME: &str = "Unknown";

pub const DEFAULT_MEMBER_READ_TIMEOUT: Duration = Duration::from_secs(12);

#[derive(Clone, Debug)]
pub struct AggregatorConfig {
    /// Upper bound for one member read; slower members get a placeholder.
    pub member_read_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            member_read_timeout: DEFAULT_MEMBER_READ_TIMEOUT,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemberSnapshot {
    pub user_id: UserId,
    pub display_name: String,
    pub today_usage_seconds: u64,
    /// `false` for placeholders produced by a failed or timed-out read.
    pub reachable: bool,
}

impl MemberSnapshot {
    pub fn placeholder(user_id: UserId) -> Self {
        Self {
            user_id,
            display_name: UNKNOWN_NAME.to_string(),
            today_usage_seconds: 0,
            reachable: false,
        }
    }
}

/// Ranked view of one group for one date.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GroupSnapshot {
    pub group_id: GroupId,
    pub date: NaiveDate,
    /// Ascending usage, ties by ascending user id.
    pub members: Vec<MemberSnapshot>,
    pub generation: u64,
}

/// Sort members by ascending usage, ties by ascending user id.
pub fn rank(members: &mut [MemberSnapshot]) {
    members.sort_by(|a, b| {
        a.today_usage_seconds
            .cmp(&b.today_usage_seconds)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    Idle,
    FanningOut { generation: u64 },
    Unsubscribed,
}

#[derive(Default)]
struct Generations {
    requested: u64,
    published: u64,
    unsubscribed: bool,
}

/// State shared by a subscription handle, its driver and its passes.
struct Shared {
    generations: Mutex<Generations>,
    snapshots: watch::Sender<Option<GroupSnapshot>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Generations> {
        self.generations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stamp a new pass. `None` once unsubscribed.
    fn begin_pass(&self) -> Option<u64> {
        let mut generations = self.lock();
        if generations.unsubscribed {
            return None;
        }
        generations.requested += 1;
        Some(generations.requested)
    }

    /// Publish unless superseded or unsubscribed. The check and the send
    /// happen under one lock.
    fn publish(&self, snapshot: GroupSnapshot) -> bool {
        let mut generations = self.lock();
        if generations.unsubscribed || snapshot.generation != generations.requested {
            return false;
        }
        generations.published = snapshot.generation;
        self.snapshots.send_replace(Some(snapshot));
        true
    }

    fn unsubscribe(&self) {
        self.lock().unsubscribed = true;
    }

    fn state(&self) -> SubscriptionState {
        let generations = self.lock();
        if generations.unsubscribed {
            SubscriptionState::Unsubscribed
        } else if generations.requested > generations.published {
            SubscriptionState::FanningOut {
                generation: generations.requested,
            }
        } else {
            SubscriptionState::Idle
        }
    }
}

struct PassContext {
    remote: Arc<dyn RemoteStore>,
    group_id: GroupId,
    date: NaiveDate,
    read_timeout: Duration,
    shared: Arc<Shared>,
}

/// Produces live [`GroupSubscription`]s.
pub struct GroupAggregator {
    remote: Arc<dyn RemoteStore>,
    membership: Arc<MembershipIndex>,
    config: AggregatorConfig,
}

impl GroupAggregator {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        membership: Arc<MembershipIndex>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            remote,
            membership,
            config,
        }
    }

    /// Start aggregating `group_id` for `date`.
    ///
    /// The first pass starts as soon as the current member set is known.
    pub async fn subscribe(
        &self,
        group_id: GroupId,
        date: NaiveDate,
    ) -> Result<GroupSubscription, SyncError> {
        let members = self.membership.watch_members(&group_id).await?;

        let (snapshots_tx, snapshots_rx) = watch::channel(None);
        let shared = Arc::new(Shared {
            generations: Mutex::new(Generations::default()),
            snapshots: snapshots_tx,
        });
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(PassContext {
            remote: self.remote.clone(),
            group_id: group_id.clone(),
            date,
            read_timeout: self.config.member_read_timeout,
            shared: shared.clone(),
        });

        info!(group_id = %group_id, %date, "subscribed to group");
        let driver = tokio::spawn(drive(ctx, members, refresh_rx));

        Ok(GroupSubscription {
            group_id,
            date,
            shared,
            snapshots: snapshots_rx,
            refresh_tx,
            driver,
        })
    }
}

/// Handle to a live aggregation. Dropping it unsubscribes.
pub struct GroupSubscription {
    group_id: GroupId,
    date: NaiveDate,
    shared: Arc<Shared>,
    snapshots: watch::Receiver<Option<GroupSnapshot>>,
    refresh_tx: mpsc::UnboundedSender<()>,
    driver: JoinHandle<()>,
}

impl GroupSubscription {
    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Most recently published snapshot.
    pub fn latest(&self) -> Option<GroupSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Wait for a snapshot newer than the last one returned.
    ///
    /// Returns `None` once unsubscribed.
    pub async fn next_snapshot(&mut self) -> Option<GroupSnapshot> {
        loop {
            if self.shared.state() == SubscriptionState::Unsubscribed {
                return None;
            }
            if self.snapshots.changed().await.is_err() {
                return None;
            }
            if let Some(snapshot) = self.snapshots.borrow_and_update().clone() {
                return Some(snapshot);
            }
        }
    }

    /// A receiver that observes every published snapshot.
    pub fn snapshots(&self) -> watch::Receiver<Option<GroupSnapshot>> {
        self.snapshots.clone()
    }

    /// Start a new pass over the current members.
    pub fn refresh(&self) {
        if self.refresh_tx.send(()).is_err() {
            debug!(group_id = %self.group_id, "refresh after driver stopped");
        }
    }

    pub fn state(&self) -> SubscriptionState {
        self.shared.state()
    }

    /// Stop aggregating. In-flight results are discarded. Idempotent.
    pub fn unsubscribe(&mut self) {
        if self.shared.state() != SubscriptionState::Unsubscribed {
            info!(group_id = %self.group_id, "unsubscribed from group");
        }
        self.shared.unsubscribe();
        self.driver.abort();
    }
}

impl Drop for GroupSubscription {
    fn drop(&mut self) {
        self.shared.unsubscribe();
        self.driver.abort();
    }
}

/// Reacts to member-set changes, member usage changes and refresh requests.
async fn drive(
    ctx: Arc<PassContext>,
    mut members: MemberStream,
    mut refresh_rx: mpsc::UnboundedReceiver<()>,
) {
    let mut current: BTreeSet<UserId> = BTreeSet::new();
    let mut usage_watches: StreamMap<UserId, ChangeStream> = StreamMap::new();
    let mut passes: JoinSet<()> = JoinSet::new();
    let mut members_open = true;

    loop {
        tokio::select! {
            next = members.next(), if members_open => match next {
                Some(set) => {
                    debug!(group_id = %ctx.group_id, members = set.len(), "member set changed");
                    sync_usage_watches(&ctx, &current, &set, &mut usage_watches).await;
                    current = set;
                    start_pass(&ctx, &current, &mut passes);
                }
                None => {
                    warn!(group_id = %ctx.group_id, "member stream ended");
                    members_open = false;
                }
            },
            Some((user_id, _)) = usage_watches.next(), if !usage_watches.is_empty() => {
                debug!(group_id = %ctx.group_id, user_id = %user_id, "member usage changed");
                start_pass(&ctx, &current, &mut passes);
            }
            request = refresh_rx.recv() => match request {
                Some(()) => start_pass(&ctx, &current, &mut passes),
                None => break,
            },
            Some(finished) = passes.join_next(), if !passes.is_empty() => {
                if let Err(e) = finished {
                    if e.is_panic() {
                        warn!(group_id = %ctx.group_id, "aggregation pass panicked");
                    }
                }
            }
        }
    }
}

/// Keep one usage subscription per current member.
async fn sync_usage_watches(
    ctx: &PassContext,
    previous: &BTreeSet<UserId>,
    next: &BTreeSet<UserId>,
    watches: &mut StreamMap<UserId, ChangeStream>,
) {
    for gone in previous.difference(next) {
        watches.remove(gone);
    }
    for added in next.difference(previous) {
        let path = paths::user_usage(added, ctx.date);
        match ctx.remote.subscribe(&path).await {
            Ok(stream) => {
                watches.insert(added.clone(), stream);
            }
            Err(e) => {
                warn!(user_id = %added, error = %e, "could not watch member usage");
            }
        }
    }
}

fn start_pass(ctx: &Arc<PassContext>, members: &BTreeSet<UserId>, passes: &mut JoinSet<()>) {
    let Some(generation) = ctx.shared.begin_pass() else {
        return;
    };
    debug!(group_id = %ctx.group_id, generation, members = members.len(), "starting pass");

    let ctx = ctx.clone();
    let members: Vec<UserId> = members.iter().cloned().collect();
    passes.spawn(run_pass(ctx, generation, members));
}

/// Fan out one read per member, fan in, rank, publish if still current.
async fn run_pass(ctx: Arc<PassContext>, generation: u64, members: Vec<UserId>) {
    let mut reads = JoinSet::new();
    for user_id in &members {
        let ctx = ctx.clone();
        let user_id = user_id.clone();
        reads.spawn(async move { read_member(&ctx, user_id).await });
    }

    let mut results: BTreeMap<UserId, MemberSnapshot> = BTreeMap::new();
    while let Some(read) = reads.join_next().await {
        match read {
            Ok(member) => {
                results.insert(member.user_id.clone(), member);
            }
            Err(e) => warn!(group_id = %ctx.group_id, error = %e, "member read task failed"),
        }
    }

    // Members whose read task died still get an entry
    let mut entries: Vec<MemberSnapshot> = members
        .into_iter()
        .map(|user_id| {
            results
                .remove(&user_id)
                .unwrap_or_else(|| MemberSnapshot::placeholder(user_id))
        })
        .collect();
    rank(&mut entries);

    let count = entries.len();
    let snapshot = GroupSnapshot {
        group_id: ctx.group_id.clone(),
        date: ctx.date,
        members: entries,
        generation,
    };
    if ctx.shared.publish(snapshot) {
        info!(group_id = %ctx.group_id, generation, members = count, "published group snapshot");
    } else {
        debug!(group_id = %ctx.group_id, generation, "discarded stale pass");
    }
}

async fn read_member(ctx: &PassContext, user_id: UserId) -> MemberSnapshot {
    let profile = paths::user_profile(&user_id);
    let usage = paths::user_usage(&user_id, ctx.date);
    let reads = async {
        tokio::try_join!(ctx.remote.read(&profile), ctx.remote.read(&usage))
    };
    match tokio::time::timeout(ctx.read_timeout, reads).await {
        Ok(Ok((profile, usage))) => member_from_parts(user_id, profile.as_ref(), usage.as_ref()),
        Ok(Err(e)) => {
            warn!(user_id = %user_id, error = %e, "member read failed");
            MemberSnapshot::placeholder(user_id)
        }
        Err(_) => {
            warn!(user_id = %user_id, timeout = ?ctx.read_timeout, "member read timed out");
            MemberSnapshot::placeholder(user_id)
        }
    }
}

/// Build a member entry from its `profile` node and its usage leaf for the
/// pass date.
fn member_from_parts(
    user_id: UserId,
    profile: Option<&Value>,
    usage: Option<&Value>,
) -> MemberSnapshot {
    let display_name = profile
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_NAME)
        .to_string();
    let today_usage_seconds = usage.and_then(Value::as_u64).unwrap_or(0);

    MemberSnapshot {
        user_id,
        display_name,
        today_usage_seconds,
        reachable: true,
    }
}
