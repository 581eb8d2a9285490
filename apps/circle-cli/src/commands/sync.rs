use chrono::Local;
use circle_core::{JobOutcome, SyncJob};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::context::Context;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

pub async fn cmd_sync(ctx: &Context, daemon: bool) -> Result<(), Box<dyn std::error::Error>> {
    let job = SyncJob::new(Arc::new(ctx.reconciler()), ctx.identity.clone());

    if !daemon {
        let pending = ctx.ledger.pending().await?.len();
        return match job.run(Local::now()).await {
            JobOutcome::Success => {
                println!("Synced {pending} day(s)");
                Ok(())
            }
            JobOutcome::Retry => Err("Sync failed, try again later".into()),
            JobOutcome::Fatal => Err("Not signed in. Run 'circle init' first.".into()),
        };
    }

    run_daemon(&job, ctx).await
}

/// Sync on a fixed interval until interrupted; failed runs are retried with
/// exponential backoff capped at the configured maximum.
async fn run_daemon(job: &SyncJob, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let settings = &ctx.config.sync;
    info!(
        "Sync daemon started, interval {}s, max backoff {}s",
        settings.sync_interval_secs, settings.max_backoff_secs
    );

    // interval() panics on a zero period
    let period = settings.sync_interval().max(Duration::from_secs(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Sync daemon stopping");
                return Ok(());
            }
        }

        let mut backoff = INITIAL_BACKOFF;
        loop {
            match job.run(Local::now()).await {
                JobOutcome::Success => {
                    debug!("Periodic sync complete");
                    break;
                }
                JobOutcome::Fatal => {
                    warn!("Sync cannot proceed until signed in, waiting for next interval");
                    break;
                }
                JobOutcome::Retry => {
                    info!("Sync retrying in {} seconds...", backoff.as_secs());
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = tokio::signal::ctrl_c() => {
                            info!("Sync daemon stopping");
                            return Ok(());
                        }
                    }
                    backoff = next_backoff(backoff, settings.max_backoff());
                }
            }
        }
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_cap() {
        let max = Duration::from_secs(300);
        let mut backoff = INITIAL_BACKOFF;
        let mut seen = Vec::new();
        for _ in 0..10 {
            backoff = next_backoff(backoff, max);
            seen.push(backoff.as_secs());
        }
        assert_eq!(seen, vec![2, 4, 8, 16, 32, 64, 128, 256, 300, 300]);
    }
}
