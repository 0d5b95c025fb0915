//! crates/reminder_core/src/ports.rs
//!
//! Defines the service contracts (traits) the scheduler depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to stay independent of the persistence backend and the delivery mechanism.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::domain::{Category, Payload, RecurrenceRule, Reminder, WakeSignal};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The persistence medium is missing or unreachable.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    /// A write collided with rows that should no longer exist.
    #[error("Conflicting write: {0}")]
    Conflict(String),
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Durable keyed storage for reminders.
///
/// Each single-record write is atomic. Batches are not atomic with respect to
/// each other; the reconciler owns consistency across a whole owner set.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn get(&self, id: &str) -> PortResult<Reminder>;

    /// Upsert by id. Always refreshes `updated_at`; returns the stored row.
    async fn put(&self, reminder: Reminder) -> PortResult<Reminder>;

    /// Upsert every reminder in the batch.
    async fn put_batch(&self, reminders: Vec<Reminder>) -> PortResult<()>;

    /// Plain insert. Fails with `PortError::Conflict` if any id already exists.
    async fn insert_batch(&self, reminders: Vec<Reminder>) -> PortResult<()>;

    async fn get_by_owner(&self, owner_id: &str) -> PortResult<Vec<Reminder>>;

    /// Enabled reminders with `next_trigger <= horizon`, earliest first.
    async fn get_due(&self, horizon: NaiveDateTime) -> PortResult<Vec<Reminder>>;

    async fn delete(&self, id: &str) -> PortResult<()>;

    /// Returns how many rows were removed.
    async fn delete_all_for_owner(&self, owner_id: &str) -> PortResult<u64>;

    async fn set_enabled(&self, id: &str, enabled: bool) -> PortResult<()>;

    /// Records that `fired` went off at `fired_at` and is next due at `next_trigger`.
    ///
    /// Writes only `next_trigger`, `last_triggered`, `trigger_count` and
    /// `updated_at`, and never inserts. The write applies only while the stored
    /// row is the one that fired: same `created_at`, still due at
    /// `fired.next_trigger`. Returns `false` when the row was deleted or
    /// replaced in the meantime.
    async fn record_firing(
        &self,
        fired: &Reminder,
        next_trigger: NaiveDateTime,
        fired_at: NaiveDateTime,
    ) -> PortResult<bool>;
}

#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Presents a notification to the user.
    async fn deliver(&self, payload: &Payload) -> PortResult<()>;
}

/// Fire-and-forget signal to a possibly separate trigger loop.
/// Delivery of the signal is never guaranteed.
pub trait WakeChannel: Send + Sync {
    fn notify(&self, signal: WakeSignal);
}

/// Chooses the title/body/routing data a reminder carries.
pub trait PayloadProvider: Send + Sync {
    fn payload_for(&self, category: Category, rule: &RecurrenceRule) -> Payload;
}
