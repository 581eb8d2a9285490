//! Synchronization core for screencircle.
//!
//! - [`LocalLedger`]: durable per-date accumulator of active seconds.
//! - [`Reconciler`]: pushes ledger totals to the shared store (last writer wins).
//! - [`MembershipIndex`]: group creation, join/leave, live member sets.
//! - [`GroupAggregator`]: fan-out/fan-in of member reads into ranked,
//!   generation-stamped [`GroupSnapshot`]s.
//! - [`SyncJob`]: the single entry point an external scheduler invokes.

pub mod aggregator;
pub mod collector;
pub mod error;
pub mod identity;
pub mod job;
pub mod ledger;
pub mod membership;
pub mod paths;
pub mod reconciler;
pub mod summary;

mod locks;

pub use aggregator::{
    AggregatorConfig, GroupAggregator, GroupSnapshot, GroupSubscription, MemberSnapshot,
    SubscriptionState,
};
pub use collector::{ActivitySource, UsageCollector};
pub use error::{ActivityError, CollectError, StorageError, SyncError};
pub use identity::{IdentityProvider, StaticIdentity};
pub use job::{JobOutcome, SyncJob};
pub use ledger::LocalLedger;
pub use membership::{MemberStream, MembershipIndex};
pub use reconciler::{PushOutcome, Reconciler};
pub use summary::{DailyTotal, WeeklySummary};
