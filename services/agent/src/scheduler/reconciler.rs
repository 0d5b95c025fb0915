//! services/agent/src/scheduler/reconciler.rs
//!
//! Replaces an owner's whole reminder set with the one described by newly
//! submitted settings, plus the smaller per-reminder mutations the API exposes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reminder_core::clock::Clock;
use reminder_core::domain::{Category, Reminder, WakeSignal};
use reminder_core::ports::{PayloadProvider, PortError, ReminderStore, WakeChannel};
use reminder_core::schedule::Calculator;
use reminder_core::settings::ReminderSettings;
use tracing::{debug, error, info, warn};

use crate::error::{AgentError, AgentResult};

/// A category left out of the new set because its settings were malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCategory {
    pub category: Category,
    pub reason: String,
}

/// What a successful reconciliation installed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub owner_id: String,
    pub installed: Vec<Reminder>,
    pub skipped: Vec<SkippedCategory>,
    /// True when the upsert failed and the delete-then-insert fallback was used.
    pub used_fallback: bool,
}

pub struct Reconciler {
    store: Arc<dyn ReminderStore>,
    wake: Arc<dyn WakeChannel>,
    payloads: Arc<dyn PayloadProvider>,
    clock: Arc<dyn Clock>,
    calculator: Calculator,
    settle: Duration,
    owner_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        wake: Arc<dyn WakeChannel>,
        payloads: Arc<dyn PayloadProvider>,
        clock: Arc<dyn Clock>,
        calculator: Calculator,
        settle: Duration,
    ) -> Self {
        Self {
            store,
            wake,
            payloads,
            clock,
            calculator,
            settle,
            owner_locks: Mutex::new(HashMap::new()),
        }
    }

    /// One async mutex per owner, so overlapping calls for the same owner queue up.
    fn owner_lock(&self, owner_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.owner_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(owner_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn settle(&self) {
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
    }

    fn notify(&self, owner_id: &str, reminder_ids: Vec<String>) {
        self.wake.notify(WakeSignal {
            owner_id: owner_id.to_string(),
            reminder_ids,
        });
    }

    /// Installs exactly the reminders `settings` describes for `owner_id`.
    ///
    /// Either the whole new set is stored or an error is returned. Categories
    /// with invalid settings are skipped and listed in the report.
    pub async fn reconcile(
        &self,
        owner_id: &str,
        settings: &ReminderSettings,
    ) -> AgentResult<ReconcileReport> {
        let lock = self.owner_lock(owner_id);
        let _guard = lock.lock().await;
        info!(owner_id, "Reconciling reminders");

        // --- 1. Clear the Owner's Current Set ---
        let removed = self.store.delete_all_for_owner(owner_id).await?;
        debug!(owner_id, removed, "Cleared existing reminders");

        // --- 2. Let the Delete Become Visible ---
        self.settle().await;

        let mut report = ReconcileReport {
            owner_id: owner_id.to_string(),
            ..ReconcileReport::default()
        };

        // --- 3. Master Switch ---
        if !settings.enabled {
            info!(owner_id, "Reminders disabled; owner now has none");
            self.notify(owner_id, Vec::new());
            return Ok(report);
        }

        // --- 4. Build the New Set ---
        let now = self.clock.now();
        let mut reminders = Vec::new();
        for (category, resolved) in settings.resolve() {
            match resolved {
                Ok(rule) => {
                    let next_trigger = self.calculator.next_trigger(&rule, now, None);
                    let payload = self.payloads.payload_for(category, &rule);
                    reminders.push(Reminder::new(
                        owner_id,
                        category,
                        rule,
                        payload,
                        next_trigger,
                        now,
                    ));
                }
                Err(e) => {
                    warn!(owner_id, %category, error = %e, "Skipping invalid reminder settings");
                    report.skipped.push(SkippedCategory {
                        category,
                        reason: e.to_string(),
                    });
                }
            }
        }

        // --- 5. Persist, Preferring an Idempotent Upsert ---
        if !reminders.is_empty() {
            if let Err(e) = self.store.put_batch(reminders.clone()).await {
                warn!(owner_id, error = %e, "Upsert failed; retrying with delete and insert");
                report.used_fallback = true;
                self.install_with_fallback(owner_id, reminders.clone()).await?;
            }
        }

        // --- 6. Wake the Trigger Loop ---
        let ids = reminders.iter().map(|r| r.id.clone()).collect();
        self.notify(owner_id, ids);

        info!(
            owner_id,
            installed = reminders.len(),
            skipped = report.skipped.len(),
            "Reconciliation complete"
        );
        report.installed = reminders;
        Ok(report)
    }

    /// The destructive retry: clear again, wait again, then plain insert.
    async fn install_with_fallback(
        &self,
        owner_id: &str,
        reminders: Vec<Reminder>,
    ) -> AgentResult<()> {
        let conflict = |source: PortError| {
            error!(owner_id, error = %source, "Reconciliation failed after fallback");
            AgentError::ReconciliationConflict {
                owner_id: owner_id.to_string(),
                source,
            }
        };

        self.store
            .delete_all_for_owner(owner_id)
            .await
            .map_err(conflict)?;
        self.settle().await;
        self.store.insert_batch(reminders).await.map_err(conflict)?;
        Ok(())
    }

    /// Enables or disables one reminder.
    ///
    /// Re-enabling recomputes `next_trigger` once so a long-disabled reminder
    /// does not fire for an instant that passed while it was off.
    pub async fn set_reminder_enabled(&self, id: &str, enabled: bool) -> AgentResult<Reminder> {
        let owner_id = self.store.get(id).await?.owner_id;
        let lock = self.owner_lock(&owner_id);
        let _guard = lock.lock().await;

        // Re-read under the lock; a reconcile may have replaced the row.
        let mut reminder = self.store.get(id).await?;
        if reminder.enabled == enabled {
            return Ok(reminder);
        }

        let stored = if enabled {
            let now = self.clock.now();
            reminder.enabled = true;
            reminder.next_trigger =
                self.calculator.next_trigger(&reminder.rule, now, reminder.last_triggered);
            self.store.put(reminder).await?
        } else {
            self.store.set_enabled(id, false).await?;
            reminder.enabled = false;
            reminder
        };

        info!(reminder_id = id, enabled, "Reminder toggled");
        self.notify(&stored.owner_id, vec![stored.id.clone()]);
        Ok(stored)
    }

    pub async fn delete_reminder(&self, id: &str) -> AgentResult<()> {
        let owner_id = self.store.get(id).await?.owner_id;
        let lock = self.owner_lock(&owner_id);
        let _guard = lock.lock().await;

        let reminder = self.store.get(id).await?;
        self.store.delete(id).await?;
        info!(reminder_id = id, "Reminder deleted");
        self.notify(&reminder.owner_id, vec![reminder.id]);
        Ok(())
    }

    pub async fn reminders_for(&self, owner_id: &str) -> AgentResult<Vec<Reminder>> {
        Ok(self.store.get_by_owner(owner_id).await?)
    }
}
