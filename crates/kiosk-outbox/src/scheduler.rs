//! Flush scheduler that drains the pending queue.
//!
//! A drain pass snapshots the queue, attempts records in FIFO order and
//! stops at the first failure. Passes run on startup, when connectivity
//! comes back, on manual request and on a fixed timer. Only one pass runs
//! at a time; a trigger that arrives mid-pass is skipped.

use crate::queue::PendingQueue;
use crate::record::CheckInRecord;
use crate::resolver::Deliverer;
use crate::{OutboxError, OutboxResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const TRIGGER_CHANNEL_CAPACITY: usize = 16;

/// Why a drain pass was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    Startup,
    ConnectivityRestored,
    Timer,
    Manual,
}

/// Result of one drain request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Another pass was already running.
    Skipped,
    Completed {
        /// Records handed to the deliverer, including the one that failed.
        attempted: usize,
        delivered: usize,
        /// The pass stopped on a failed record.
        halted: bool,
    },
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct FlushSchedulerConfig {
    /// Period of the recurring flush timer.
    pub interval: Duration,
}

impl Default for FlushSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

/// Clears the in-flight flag when a pass ends, even on panic.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct FlushScheduler {
    queue: Arc<PendingQueue>,
    deliverer: Arc<dyn Deliverer>,
    config: FlushSchedulerConfig,
    draining: AtomicBool,
    sender: mpsc::Sender<FlushTrigger>,
    /// Taken by the loop on start.
    receiver: Mutex<Option<mpsc::Receiver<FlushTrigger>>>,
    shutdown: Notify,
}

impl FlushScheduler {
    pub fn new(
        queue: Arc<PendingQueue>,
        deliverer: Arc<dyn Deliverer>,
        config: FlushSchedulerConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(TRIGGER_CHANNEL_CAPACITY);
        Self {
            queue,
            deliverer,
            config,
            draining: AtomicBool::new(false),
            sender,
            receiver: Mutex::new(Some(receiver)),
            shutdown: Notify::new(),
        }
    }

    /// Handle for sending triggers to the running loop.
    pub fn handle(&self) -> FlushHandle {
        FlushHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Spawn the scheduler loop. Runs a startup pass immediately.
    ///
    /// Fails with [`OutboxError::AlreadyStarted`] on a second call.
    pub fn start(self: &Arc<Self>) -> OutboxResult<JoinHandle<()>> {
        let mut receiver = self
            .receiver
            .lock()
            .take()
            .ok_or(OutboxError::AlreadyStarted)?;

        let scheduler = Arc::clone(self);
        let period = self.config.interval;

        Ok(tokio::spawn(async move {
            scheduler.drain(FlushTrigger::Startup).await;

            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;

                    _ = scheduler.shutdown.notified() => break,
                    maybe_trigger = receiver.recv() => match maybe_trigger {
                        Some(trigger) => {
                            scheduler.drain(trigger).await;
                        }
                        None => break,
                    },
                    _ = ticker.tick() => {
                        scheduler.drain(FlushTrigger::Timer).await;
                    }
                }
            }

            debug!("Flush scheduler stopped");
        }))
    }

    /// Stop the loop once the current pass, if any, finishes.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// One delivery attempt on its own task, so a panicking deliverer fails
    /// the record instead of taking down the scheduler loop.
    async fn attempt(&self, record: &CheckInRecord) -> bool {
        let deliverer = Arc::clone(&self.deliverer);
        let record = record.clone();
        match tokio::spawn(async move { deliverer.attempt(&record).await }).await {
            Ok(delivered) => delivered,
            Err(e) => {
                warn!(error = %e, "Delivery attempt aborted");
                false
            }
        }
    }

    /// Run one drain pass now unless one is already running.
    pub async fn drain(&self, trigger: FlushTrigger) -> DrainOutcome {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(?trigger, "Drain already in progress; skipping");
            return DrainOutcome::Skipped;
        }
        let _guard = DrainGuard(&self.draining);

        let snapshot = self.queue.peek();
        if snapshot.is_empty() {
            return DrainOutcome::Completed {
                attempted: 0,
                delivered: 0,
                halted: false,
            };
        }

        let mut delivered = 0;
        let mut halted = false;
        for record in &snapshot {
            if self.attempt(record).await {
                delivered += 1;
            } else {
                halted = true;
                break;
            }
        }
        let attempted = delivered + usize::from(halted);

        if delivered > 0 {
            match self.queue.writeback(delivered, &snapshot) {
                Ok(remaining) => info!(
                    ?trigger,
                    delivered,
                    remaining,
                    "Flushed pending check-ins"
                ),
                Err(e) => warn!(?trigger, delivered, error = %e, "Queue writeback failed"),
            }
        } else {
            debug!(?trigger, pending = snapshot.len(), "Head of queue not delivered");
        }

        DrainOutcome::Completed {
            attempted,
            delivered,
            halted,
        }
    }
}

/// Cloneable sender of flush triggers.
#[derive(Clone)]
pub struct FlushHandle {
    sender: mpsc::Sender<FlushTrigger>,
}

impl FlushHandle {
    /// Signal that the network came back.
    pub fn notify_connectivity_restored(&self) -> bool {
        self.send(FlushTrigger::ConnectivityRestored)
    }

    /// Ask for a pass outside the timer.
    pub fn request_flush(&self) -> bool {
        self.send(FlushTrigger::Manual)
    }

    /// A full channel already holds pending passes and counts as sent.
    fn send(&self, trigger: FlushTrigger) -> bool {
        match self.sender.try_send(trigger) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(?trigger, "Flush already pending");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}
