//! Cancellable fixed-interval background tasks
//!
//! Each task ticks on its own interval until the shared shutdown token is
//! cancelled. A failing or panicking tick is logged and the next tick still
//! runs.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::panic_message;

/// Body of one tick.
pub type TickFn =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<(), String>> + Send>> + Send + Sync>;

/// Owns the background tasks and their shutdown token.
pub struct Tickers {
    handles: Vec<(&'static str, JoinHandle<()>)>,
    shutdown: CancellationToken,
}

impl Tickers {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            handles: Vec::new(),
            shutdown,
        }
    }

    /// Spawn a task that runs `tick` every `period`, first after one period.
    pub fn spawn(&mut self, name: &'static str, period: Duration, tick: TickFn) {
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            info!(task = name, period_ms = period.as_millis() as u64, "Periodic task started");

            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => {
                        info!(task = name, "Periodic task received shutdown signal");
                        break;
                    }

                    _ = interval.tick() => {
                        tokio::select! {
                            biased;

                            _ = shutdown.cancelled() => {
                                info!(task = name, "Periodic task cancelled mid-tick");
                                break;
                            }

                            outcome = AssertUnwindSafe(tick()).catch_unwind() => match outcome {
                                Ok(Ok(())) => debug!(task = name, "Tick completed"),
                                Ok(Err(e)) => warn!(task = name, error = %e, "Tick failed"),
                                Err(panic) => warn!(
                                    task = name,
                                    panic = %panic_message(panic.as_ref()),
                                    "Tick panicked"
                                ),
                            },
                        }
                    }
                }
            }
        });

        self.handles.push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancel every task and wait for all of them to finish.
    pub async fn stop(self) {
        self.shutdown.cancel();
        info!(count = self.handles.len(), "Waiting for periodic tasks to stop");
        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                warn!(task = name, error = %e, "Periodic task ended abnormally");
            }
        }
    }
}
