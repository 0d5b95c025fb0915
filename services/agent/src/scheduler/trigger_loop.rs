//! services/agent/src/scheduler/trigger_loop.rs
//!
//! The delivery agent. A single poll-based loop that scans the store for due
//! reminders, hands each one to the delivery sink, and writes back its next
//! occurrence. Nothing is held in memory between scans that the store does not
//! also know, so a restarted agent simply resumes.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use futures::future::join_all;
use reminder_core::clock::Clock;
use reminder_core::domain::{Reminder, WakeSignal};
use reminder_core::ports::{DeliverySink, PortError, ReminderStore};
use reminder_core::schedule::Calculator;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

//=========================================================================================
// Status
//=========================================================================================

/// Where the loop is in its `Idle -> Scanning -> Firing -> Idle` cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    #[default]
    Idle,
    Scanning,
    Firing,
}

/// Counters published for the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentStatus {
    pub phase: AgentPhase,
    pub last_scan_at: Option<NaiveDateTime>,
    pub scans: u64,
    pub fired: u64,
    pub delivery_failures: u64,
    pub storage_errors: u64,
}

pub type StatusHandle = Arc<RwLock<AgentStatus>>;

/// How one firing went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed,
    TimedOut,
}

/// The result of one scan, mainly for tests and logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub due: usize,
    pub delivered: usize,
    pub failed: usize,
    pub rescheduled: usize,
}

//=========================================================================================
// The Trigger Loop
//=========================================================================================

pub struct TriggerLoop {
    store: Arc<dyn ReminderStore>,
    sink: Arc<dyn DeliverySink>,
    clock: Arc<dyn Clock>,
    calculator: Calculator,
    scan_interval: Duration,
    delivery_timeout: Duration,
    status: StatusHandle,
}

impl TriggerLoop {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        sink: Arc<dyn DeliverySink>,
        clock: Arc<dyn Clock>,
        calculator: Calculator,
        scan_interval: Duration,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            store,
            sink,
            clock,
            calculator,
            scan_interval,
            delivery_timeout,
            status: StatusHandle::default(),
        }
    }

    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    async fn set_phase(&self, phase: AgentPhase) {
        self.status.write().await.phase = phase;
    }

    /// Runs until `cancel` fires. Scans on every timer tick and whenever a wake
    /// signal arrives; a closed wake channel leaves the timer in charge.
    pub async fn run(&self, mut wake_rx: mpsc::Receiver<WakeSignal>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut wake_open = true;
        info!(interval_secs = self.scan_interval.as_secs(), "Trigger loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.scan_once().await;
                }
                signal = wake_rx.recv(), if wake_open => match signal {
                    Some(signal) => {
                        debug!(
                            owner_id = %signal.owner_id,
                            changed = signal.reminder_ids.len(),
                            "Wake signal received; scanning early"
                        );
                        self.scan_once().await;
                    }
                    None => {
                        debug!("Wake channel closed; relying on the timer");
                        wake_open = false;
                    }
                },
                _ = cancel.cancelled() => {
                    info!("Trigger loop shutting down");
                    break;
                }
            }
        }
    }

    /// One `Scanning -> Firing -> Idle` pass.
    pub async fn scan_once(&self) -> ScanSummary {
        self.set_phase(AgentPhase::Scanning).await;
        let now = self.clock.now();

        let due = match self.store.get_due(now).await {
            Ok(due) => due,
            Err(e) => {
                match &e {
                    PortError::StorageUnavailable(_) => {
                        warn!(error = %e, "Reminder store unavailable; treating as no reminders")
                    }
                    _ => error!(error = %e, "Failed to scan for due reminders"),
                }
                let mut status = self.status.write().await;
                status.storage_errors += 1;
                status.scans += 1;
                status.last_scan_at = Some(now);
                status.phase = AgentPhase::Idle;
                return ScanSummary::default();
            }
        };

        let mut summary = ScanSummary {
            due: due.len(),
            ..ScanSummary::default()
        };

        if !due.is_empty() {
            self.set_phase(AgentPhase::Firing).await;
            debug!(due = due.len(), "Firing due reminders");
            // Each reminder is independent; one failure never stops the rest.
            let results = join_all(due.into_iter().map(|r| self.fire(r, now))).await;
            for (outcome, rescheduled) in results {
                match outcome {
                    DeliveryOutcome::Delivered => summary.delivered += 1,
                    DeliveryOutcome::Failed | DeliveryOutcome::TimedOut => summary.failed += 1,
                }
                if rescheduled {
                    summary.rescheduled += 1;
                }
            }
            info!(
                due = summary.due,
                delivered = summary.delivered,
                failed = summary.failed,
                "Scan complete"
            );
        }

        let mut status = self.status.write().await;
        status.scans += 1;
        status.fired += summary.delivered as u64;
        status.delivery_failures += summary.failed as u64;
        status.last_scan_at = Some(now);
        status.phase = AgentPhase::Idle;
        summary
    }

    /// Delivers one reminder, then moves it to its next occurrence whatever the
    /// delivery outcome. Returns the outcome and whether the write-back stuck.
    ///
    /// Only the firing fields are written back. A reminder deleted, disabled or
    /// replaced while its delivery was in flight keeps whatever the other
    /// writer left.
    async fn fire(&self, reminder: Reminder, now: NaiveDateTime) -> (DeliveryOutcome, bool) {
        let outcome = self.deliver(&reminder).await;
        let next_trigger = self.calculator.next_trigger(&reminder.rule, now, Some(now));

        match self.store.record_firing(&reminder, next_trigger, now).await {
            Ok(true) => {
                debug!(reminder_id = %reminder.id, %next_trigger, "Reminder rescheduled");
                (outcome, true)
            }
            Ok(false) => {
                debug!(
                    reminder_id = %reminder.id,
                    "Reminder changed while firing; leaving the stored row alone"
                );
                (outcome, false)
            }
            Err(e) => {
                error!(reminder_id = %reminder.id, error = %e, "Failed to reschedule reminder");
                (outcome, false)
            }
        }
    }

    /// Runs the sink on its own task, aborted if it outlives the delivery
    /// timeout, so a hung sink never holds up the scan.
    async fn deliver(&self, reminder: &Reminder) -> DeliveryOutcome {
        let sink = self.sink.clone();
        let payload = reminder.payload.clone();
        let mut task = tokio::spawn(async move { sink.deliver(&payload).await });

        match tokio::time::timeout(self.delivery_timeout, &mut task).await {
            Ok(Ok(Ok(()))) => {
                info!(reminder_id = %reminder.id, owner_id = %reminder.owner_id, "Reminder delivered");
                DeliveryOutcome::Delivered
            }
            Ok(Ok(Err(e))) => {
                warn!(reminder_id = %reminder.id, error = %e, "Reminder delivery failed");
                DeliveryOutcome::Failed
            }
            Ok(Err(join_error)) => {
                error!(reminder_id = %reminder.id, error = %join_error, "Delivery task aborted");
                DeliveryOutcome::Failed
            }
            Err(_) => {
                task.abort();
                warn!(
                    reminder_id = %reminder.id,
                    timeout_secs = self.delivery_timeout.as_secs_f64(),
                    "Reminder delivery timed out"
                );
                DeliveryOutcome::TimedOut
            }
        }
    }
}
