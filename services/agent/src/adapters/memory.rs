//! services/agent/src/adapters/memory.rs
//!
//! An in-process implementation of the `ReminderStore` port. Nothing survives a
//! restart, so it backs local development and the test suite.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use reminder_core::domain::Reminder;
use reminder_core::ports::{PortError, PortResult, ReminderStore};
use tokio::sync::RwLock;

/// A `ReminderStore` held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<HashMap<String, Reminder>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates losing the persistence medium. While offline every
    /// operation fails with `StorageUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn check_online(&self) -> PortResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PortError::StorageUnavailable(
                "in-memory store is offline".to_string(),
            ));
        }
        Ok(())
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Upsert keeps the original `created_at`, matching the database adapter.
fn upsert(rows: &mut HashMap<String, Reminder>, mut reminder: Reminder) -> Reminder {
    reminder.updated_at = now();
    if let Some(existing) = rows.get(&reminder.id) {
        reminder.created_at = existing.created_at;
    }
    rows.insert(reminder.id.clone(), reminder.clone());
    reminder
}

#[async_trait]
impl ReminderStore for MemoryStore {
    async fn get(&self, id: &str) -> PortResult<Reminder> {
        self.check_online()?;
        self.rows
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Reminder {} not found", id)))
    }

    async fn put(&self, reminder: Reminder) -> PortResult<Reminder> {
        self.check_online()?;
        let mut rows = self.rows.write().await;
        Ok(upsert(&mut rows, reminder))
    }

    async fn put_batch(&self, reminders: Vec<Reminder>) -> PortResult<()> {
        self.check_online()?;
        let mut rows = self.rows.write().await;
        for reminder in reminders {
            upsert(&mut rows, reminder);
        }
        Ok(())
    }

    async fn insert_batch(&self, reminders: Vec<Reminder>) -> PortResult<()> {
        self.check_online()?;
        let mut rows = self.rows.write().await;
        // All-or-nothing, like the transactional insert in the database adapter.
        if let Some(dup) = reminders.iter().find(|r| rows.contains_key(&r.id)) {
            return Err(PortError::Conflict(format!("Reminder {} already exists", dup.id)));
        }
        let stamp = now();
        for mut reminder in reminders {
            reminder.updated_at = stamp;
            rows.insert(reminder.id.clone(), reminder);
        }
        Ok(())
    }

    async fn get_by_owner(&self, owner_id: &str) -> PortResult<Vec<Reminder>> {
        self.check_online()?;
        let mut owned: Vec<Reminder> = self
            .rows
            .read()
            .await
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(owned)
    }

    async fn get_due(&self, horizon: NaiveDateTime) -> PortResult<Vec<Reminder>> {
        self.check_online()?;
        let mut due: Vec<Reminder> = self
            .rows
            .read()
            .await
            .values()
            .filter(|r| r.enabled && r.next_trigger <= horizon)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.next_trigger.cmp(&b.next_trigger).then_with(|| a.id.cmp(&b.id)));
        Ok(due)
    }

    async fn delete(&self, id: &str) -> PortResult<()> {
        self.check_online()?;
        self.rows.write().await.remove(id);
        Ok(())
    }

    async fn delete_all_for_owner(&self, owner_id: &str) -> PortResult<u64> {
        self.check_online()?;
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|_, r| r.owner_id != owner_id);
        Ok((before - rows.len()) as u64)
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> PortResult<()> {
        self.check_online()?;
        let mut rows = self.rows.write().await;
        let reminder = rows
            .get_mut(id)
            .ok_or_else(|| PortError::NotFound(format!("Reminder {} not found", id)))?;
        reminder.enabled = enabled;
        reminder.updated_at = now();
        Ok(())
    }

    async fn record_firing(
        &self,
        fired: &Reminder,
        next_trigger: NaiveDateTime,
        fired_at: NaiveDateTime,
    ) -> PortResult<bool> {
        self.check_online()?;
        let mut rows = self.rows.write().await;
        let Some(stored) = rows.get_mut(&fired.id) else {
            return Ok(false);
        };
        if stored.created_at != fired.created_at || stored.next_trigger != fired.next_trigger {
            return Ok(false);
        }
        stored.next_trigger = next_trigger;
        stored.last_triggered = Some(fired_at);
        stored.trigger_count = stored.trigger_count.saturating_add(1);
        stored.updated_at = now();
        Ok(true)
    }
}
