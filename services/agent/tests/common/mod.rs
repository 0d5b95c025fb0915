//! Shared fixtures for the agent integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_lib::adapters::{DefaultPayloads, MemoryStore, MpscWake};
use agent_lib::scheduler::{Reconciler, TriggerLoop};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reminder_core::clock::ManualClock;
use reminder_core::domain::{Category, Payload, RecurrenceRule, Reminder, WakeSignal};
use reminder_core::ports::{DeliverySink, PortError, PortResult, ReminderStore};
use reminder_core::schedule::Calculator;
use reminder_core::settings::ReminderSettings;
use tokio::sync::{mpsc, Notify};

/// 2024-01-01 is a Monday, so `at(2, ..)` is a Tuesday and `at(3, ..)` a Wednesday.
pub fn at(day: u32, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(hour, minute, second)
        .unwrap()
}

pub fn settings(json: serde_json::Value) -> ReminderSettings {
    serde_json::from_value(json).unwrap()
}

pub fn reminder(owner: &str, category: Category, rule: RecurrenceRule, next: NaiveDateTime) -> Reminder {
    Reminder::new(
        owner,
        category,
        rule,
        Payload {
            title: format!("{category} reminder"),
            body: "body".into(),
            data: serde_json::json!({ "category": category.key() }),
        },
        next,
        at(1, 0, 0, 0),
    )
}

//=========================================================================================
// Reconciler Harness
//=========================================================================================

pub struct ReconcileHarness {
    pub store: Arc<dyn ReminderStore>,
    pub clock: Arc<ManualClock>,
    pub reconciler: Arc<Reconciler>,
    pub wake_rx: mpsc::Receiver<WakeSignal>,
}

pub fn reconcile_harness(store: Arc<dyn ReminderStore>, now: NaiveDateTime) -> ReconcileHarness {
    let clock = Arc::new(ManualClock::new(now));
    let (wake, wake_rx) = MpscWake::channel(16);
    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        Arc::new(wake),
        Arc::new(DefaultPayloads),
        clock.clone(),
        Calculator::default(),
        Duration::from_millis(5),
    ));
    ReconcileHarness {
        store,
        clock,
        reconciler,
        wake_rx,
    }
}

//=========================================================================================
// Scripted Delivery Sink
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    Succeed,
    Fail,
    Hang,
}

/// Records every payload it sees and answers according to its mode. Payloads
/// whose title is listed in `fail_titles` always fail.
pub struct ScriptedSink {
    mode: Mutex<SinkMode>,
    fail_titles: Vec<String>,
    pub delivered: Mutex<Vec<Payload>>,
}

impl ScriptedSink {
    pub fn new(mode: SinkMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            fail_titles: Vec::new(),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_for(titles: &[&str]) -> Self {
        Self {
            fail_titles: titles.iter().map(|t| t.to_string()).collect(),
            ..Self::new(SinkMode::Succeed)
        }
    }

    pub fn seen(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

#[async_trait]
impl DeliverySink for ScriptedSink {
    async fn deliver(&self, payload: &Payload) -> PortResult<()> {
        self.delivered.lock().unwrap().push(payload.clone());
        let mode = *self.mode.lock().unwrap();
        if self.fail_titles.contains(&payload.title) {
            return Err(PortError::DeliveryFailed("scripted failure".into()));
        }
        match mode {
            SinkMode::Succeed => Ok(()),
            SinkMode::Fail => Err(PortError::DeliveryFailed("scripted failure".into())),
            SinkMode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

/// Holds every delivery open until the test releases it, so other writers
/// can act while a firing is in flight.
#[derive(Default)]
pub struct GatedSink {
    entered: Notify,
    release: Notify,
}

impl GatedSink {
    pub async fn wait_until_delivering(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl DeliverySink for GatedSink {
    async fn deliver(&self, _payload: &Payload) -> PortResult<()> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

pub fn trigger_loop(
    store: Arc<dyn ReminderStore>,
    sink: Arc<dyn DeliverySink>,
    clock: Arc<ManualClock>,
) -> TriggerLoop {
    TriggerLoop::new(
        store,
        sink,
        clock,
        Calculator::default(),
        Duration::from_secs(3600),
        Duration::from_millis(50),
    )
}

//=========================================================================================
// Flaky Store
//=========================================================================================

/// Wraps a `MemoryStore` and injects batch-write failures.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub put_batch_failures: AtomicUsize,
    pub fail_inserts: AtomicBool,
    pub put_batch_calls: AtomicUsize,
    pub insert_batch_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn failing_upserts(count: usize) -> Self {
        let store = Self::default();
        store.put_batch_failures.store(count, Ordering::SeqCst);
        store
    }
}

#[async_trait]
impl ReminderStore for FlakyStore {
    async fn get(&self, id: &str) -> PortResult<Reminder> {
        self.inner.get(id).await
    }

    async fn put(&self, reminder: Reminder) -> PortResult<Reminder> {
        self.inner.put(reminder).await
    }

    async fn put_batch(&self, reminders: Vec<Reminder>) -> PortResult<()> {
        self.put_batch_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.put_batch_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.put_batch_failures.store(remaining - 1, Ordering::SeqCst);
            // Leave a stale row behind, as a half-visible earlier write would.
            if let Some(first) = reminders.first() {
                self.inner.put(first.clone()).await?;
            }
            return Err(PortError::Conflict("stale row".into()));
        }
        self.inner.put_batch(reminders).await
    }

    async fn insert_batch(&self, reminders: Vec<Reminder>) -> PortResult<()> {
        self.insert_batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(PortError::Conflict("insert collided".into()));
        }
        self.inner.insert_batch(reminders).await
    }

    async fn get_by_owner(&self, owner_id: &str) -> PortResult<Vec<Reminder>> {
        self.inner.get_by_owner(owner_id).await
    }

    async fn get_due(&self, horizon: NaiveDateTime) -> PortResult<Vec<Reminder>> {
        self.inner.get_due(horizon).await
    }

    async fn delete(&self, id: &str) -> PortResult<()> {
        self.inner.delete(id).await
    }

    async fn delete_all_for_owner(&self, owner_id: &str) -> PortResult<u64> {
        self.inner.delete_all_for_owner(owner_id).await
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> PortResult<()> {
        self.inner.set_enabled(id, enabled).await
    }

    async fn record_firing(
        &self,
        fired: &Reminder,
        next_trigger: NaiveDateTime,
        fired_at: NaiveDateTime,
    ) -> PortResult<bool> {
        self.inner.record_firing(fired, next_trigger, fired_at).await
    }
}
