mod common;

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use agent_lib::adapters::MemoryStore;
use agent_lib::error::AgentError;
use common::*;
use reminder_core::domain::{Category, MealSlot};
use reminder_core::ports::{PortError, ReminderStore};
use serde_json::json;

async fn categories(store: &Arc<dyn ReminderStore>, owner: &str) -> HashSet<Category> {
    store
        .get_by_owner(owner)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.category)
        .collect()
}

#[tokio::test]
async fn water_reconciled_before_window_fires_at_window_start() {
    let h = reconcile_harness(Arc::new(MemoryStore::new()), at(2, 7, 0, 0));
    let s = settings(json!({
        "water": { "enabled": true, "intervalMinutes": 60, "startTime": "08:00", "endTime": "22:00" }
    }));

    let report = h.reconciler.reconcile("alice", &s).await.unwrap();

    assert_eq!(report.installed.len(), 1);
    assert!(report.skipped.is_empty());
    assert!(!report.used_fallback);
    let stored = h.store.get_by_owner("alice").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].category, Category::Water);
    assert_eq!(stored[0].next_trigger, at(2, 8, 0, 0));
    assert_eq!(stored[0].trigger_count, 0);
    assert!(stored[0].enabled);
}

#[tokio::test]
async fn workout_after_todays_slot_moves_to_next_listed_day() {
    // Tuesday evening, workouts on Mon/Wed/Fri.
    let h = reconcile_harness(Arc::new(MemoryStore::new()), at(2, 19, 0, 0));
    let s = settings(json!({ "workout": { "enabled": true, "time": "18:00", "days": [1, 3, 5] } }));

    let report = h.reconciler.reconcile("alice", &s).await.unwrap();

    assert_eq!(report.installed.len(), 1);
    assert_eq!(report.installed[0].next_trigger, at(3, 18, 0, 0));
}

#[tokio::test]
async fn workout_before_todays_slot_fires_today() {
    // Wednesday morning.
    let h = reconcile_harness(Arc::new(MemoryStore::new()), at(3, 9, 0, 0));
    let s = settings(json!({ "workout": { "enabled": true, "time": "18:00", "days": [1, 3, 5] } }));

    let report = h.reconciler.reconcile("alice", &s).await.unwrap();

    assert_eq!(report.installed[0].next_trigger, at(3, 18, 0, 0));
}

#[tokio::test]
async fn reconciling_twice_leaves_one_reminder_per_category() {
    let h = reconcile_harness(Arc::new(MemoryStore::new()), at(2, 7, 0, 0));
    let s = settings(json!({
        "meals": { "breakfast": { "enabled": true }, "dinner": { "enabled": true, "time": "19:30" } },
        "water": { "enabled": true },
        "streak": { "enabled": true }
    }));

    let first = h.reconciler.reconcile("alice", &s).await.unwrap();
    let second = h.reconciler.reconcile("alice", &s).await.unwrap();

    let stored = h.store.get_by_owner("alice").await.unwrap();
    assert_eq!(stored.len(), 4);
    assert_eq!(first.installed.len(), second.installed.len());
    let ids: HashSet<_> = stored.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids.len(), 4);
    assert!(ids.contains("rem:alice:meal_breakfast"));
    assert!(ids.contains("rem:alice:meal_dinner"));
}

#[tokio::test]
async fn disabling_a_category_removes_its_reminder() {
    let h = reconcile_harness(Arc::new(MemoryStore::new()), at(2, 7, 0, 0));
    let both = settings(json!({ "water": { "enabled": true }, "goal": { "enabled": true } }));
    let water_only = settings(json!({ "water": { "enabled": true }, "goal": { "enabled": false } }));

    h.reconciler.reconcile("alice", &both).await.unwrap();
    assert_eq!(
        categories(&h.store, "alice").await,
        HashSet::from([Category::Water, Category::Goal])
    );

    h.reconciler.reconcile("alice", &water_only).await.unwrap();
    assert_eq!(categories(&h.store, "alice").await, HashSet::from([Category::Water]));
}

#[tokio::test]
async fn master_switch_off_clears_everything() {
    let h = reconcile_harness(Arc::new(MemoryStore::new()), at(2, 7, 0, 0));
    h.reconciler
        .reconcile("alice", &settings(json!({ "water": { "enabled": true } })))
        .await
        .unwrap();

    let report = h
        .reconciler
        .reconcile(
            "alice",
            &settings(json!({ "enabled": false, "water": { "enabled": true } })),
        )
        .await
        .unwrap();

    assert!(report.installed.is_empty());
    assert!(h.store.get_by_owner("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn reconcile_leaves_other_owners_alone() {
    let h = reconcile_harness(Arc::new(MemoryStore::new()), at(2, 7, 0, 0));
    h.reconciler
        .reconcile("bob", &settings(json!({ "summary": { "enabled": true } })))
        .await
        .unwrap();

    h.reconciler
        .reconcile("alice", &settings(json!({ "enabled": false })))
        .await
        .unwrap();

    assert_eq!(categories(&h.store, "bob").await, HashSet::from([Category::Summary]));
}

#[tokio::test]
async fn invalid_category_is_skipped_and_the_rest_installed() {
    let h = reconcile_harness(Arc::new(MemoryStore::new()), at(2, 7, 0, 0));
    let s = settings(json!({
        "meals": { "lunch": { "enabled": true, "time": "25:99" } },
        "workout": { "enabled": true, "days": [1, 9] },
        "water": { "enabled": true, "intervalMinutes": 0 },
        "goal": { "enabled": true }
    }));

    let report = h.reconciler.reconcile("alice", &s).await.unwrap();

    assert_eq!(report.installed.len(), 1);
    assert_eq!(report.installed[0].category, Category::Goal);
    let skipped: HashSet<_> = report.skipped.iter().map(|s| s.category).collect();
    assert_eq!(
        skipped,
        HashSet::from([Category::Meal(MealSlot::Lunch), Category::Workout, Category::Water])
    );
    assert!(report.skipped.iter().all(|s| !s.reason.is_empty()));
    assert_eq!(categories(&h.store, "alice").await, HashSet::from([Category::Goal]));
}

#[tokio::test]
async fn failed_upsert_falls_back_to_delete_and_insert() {
    let flaky = Arc::new(FlakyStore::failing_upserts(1));
    let h = reconcile_harness(flaky.clone(), at(2, 7, 0, 0));
    let s = settings(json!({ "water": { "enabled": true }, "goal": { "enabled": true } }));

    let report = h.reconciler.reconcile("alice", &s).await.unwrap();

    assert!(report.used_fallback);
    assert_eq!(flaky.put_batch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(flaky.insert_batch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        categories(&h.store, "alice").await,
        HashSet::from([Category::Water, Category::Goal])
    );
}

#[tokio::test]
async fn failed_fallback_surfaces_a_conflict() {
    let flaky = Arc::new(FlakyStore::failing_upserts(1));
    flaky.fail_inserts.store(true, Ordering::SeqCst);
    let h = reconcile_harness(flaky.clone(), at(2, 7, 0, 0));
    let s = settings(json!({ "water": { "enabled": true }, "goal": { "enabled": true } }));

    let err = h.reconciler.reconcile("alice", &s).await.unwrap_err();

    match err {
        AgentError::ReconciliationConflict { owner_id, source } => {
            assert_eq!(owner_id, "alice");
            assert!(matches!(source, PortError::Conflict(_)));
        }
        other => panic!("expected a conflict, got {other:?}"),
    }
    // The fallback cleared the stale row before its insert failed.
    assert!(h.store.get_by_owner("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn unavailable_store_is_reported_to_the_caller() {
    let memory = Arc::new(MemoryStore::new());
    memory.set_offline(true);
    let h = reconcile_harness(memory, at(2, 7, 0, 0));

    let err = h
        .reconciler
        .reconcile("alice", &settings(json!({ "water": { "enabled": true } })))
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Port(PortError::StorageUnavailable(_))));
}

#[tokio::test]
async fn reconcile_sends_a_wake_signal() {
    let mut h = reconcile_harness(Arc::new(MemoryStore::new()), at(2, 7, 0, 0));

    h.reconciler
        .reconcile("alice", &settings(json!({ "water": { "enabled": true } })))
        .await
        .unwrap();

    let signal = h.wake_rx.try_recv().unwrap();
    assert_eq!(signal.owner_id, "alice");
    assert_eq!(signal.reminder_ids, vec!["rem:alice:water".to_string()]);
}

#[tokio::test]
async fn overlapping_reconciles_for_one_owner_do_not_interleave() {
    let h = reconcile_harness(Arc::new(MemoryStore::new()), at(2, 7, 0, 0));
    let first = settings(json!({ "water": { "enabled": true }, "goal": { "enabled": true } }));
    let second = settings(json!({ "summary": { "enabled": true } }));

    let a = {
        let reconciler = h.reconciler.clone();
        tokio::spawn(async move { reconciler.reconcile("alice", &first).await })
    };
    let b = {
        let reconciler = h.reconciler.clone();
        tokio::spawn(async move { reconciler.reconcile("alice", &second).await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let installed = categories(&h.store, "alice").await;
    assert!(
        installed == HashSet::from([Category::Water, Category::Goal])
            || installed == HashSet::from([Category::Summary]),
        "got a mix of both settings: {installed:?}"
    );
}

#[tokio::test]
async fn re_enabling_recomputes_the_next_trigger_once() {
    let h = reconcile_harness(Arc::new(MemoryStore::new()), at(2, 7, 0, 0));
    h.reconciler
        .reconcile("alice", &settings(json!({ "goal": { "enabled": true, "time": "09:00" } })))
        .await
        .unwrap();
    let id = "rem:alice:goal";

    let disabled = h.reconciler.set_reminder_enabled(id, false).await.unwrap();
    assert!(!disabled.enabled);
    assert!(!h.store.get(id).await.unwrap().enabled);

    // Two days pass while the reminder is off.
    h.clock.set(at(4, 10, 0, 0));
    let enabled = h.reconciler.set_reminder_enabled(id, true).await.unwrap();

    assert!(enabled.enabled);
    assert_eq!(enabled.next_trigger, at(5, 9, 0, 0));
    assert_eq!(h.store.get(id).await.unwrap().next_trigger, at(5, 9, 0, 0));
}

#[tokio::test]
async fn toggling_an_unknown_reminder_is_not_found() {
    let h = reconcile_harness(Arc::new(MemoryStore::new()), at(2, 7, 0, 0));

    let err = h
        .reconciler
        .set_reminder_enabled("rem:nobody:water", true)
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Port(PortError::NotFound(_))));
}

#[tokio::test]
async fn deleting_a_reminder_removes_only_that_one() {
    let h = reconcile_harness(Arc::new(MemoryStore::new()), at(2, 7, 0, 0));
    h.reconciler
        .reconcile(
            "alice",
            &settings(json!({ "water": { "enabled": true }, "goal": { "enabled": true } })),
        )
        .await
        .unwrap();

    h.reconciler.delete_reminder("rem:alice:water").await.unwrap();

    assert_eq!(categories(&h.store, "alice").await, HashSet::from([Category::Goal]));
    let err = h.reconciler.delete_reminder("rem:alice:water").await.unwrap_err();
    assert!(matches!(err, AgentError::Port(PortError::NotFound(_))));
}
