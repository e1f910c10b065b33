// src/scheduler.rs
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::dispatch::Dispatcher;

/// Spawn the poll loop: one cycle per tick, never two at once.
///
/// A failed cycle is logged and the next tick retries from the persisted
/// watermark. The loop ends when `shutdown` resolves; an in-flight cycle is
/// finished first. The dispatcher is handed back on exit.
pub fn spawn_poll_scheduler<S>(
    mut dispatcher: Dispatcher,
    interval: Duration,
    shutdown: S,
) -> JoinHandle<Dispatcher>
where
    S: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // A slow cycle pushes the schedule back instead of bursting.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!(target: "scheduler", "shutdown requested, stopping poll loop");
                    break;
                }
                _ = ticker.tick() => {}
            }

            match dispatcher.run_cycle().await {
                Ok(report) => tracing::info!(
                    target: "scheduler",
                    found = report.found,
                    delivered = report.delivered,
                    watermark = %report.watermark.to_rfc3339(),
                    "poll cycle finished"
                ),
                Err(e) => tracing::warn!(target: "scheduler", error = %e, "poll cycle failed"),
            }
        }

        dispatcher
    })
}
