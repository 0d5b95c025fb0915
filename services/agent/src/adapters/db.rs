//! services/agent/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ReminderStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use reminder_core::domain::{Category, Payload, RecurrenceRule, Reminder};
use reminder_core::ports::{PortError, PortResult, ReminderStore};
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

const COLUMNS: &str = "id, owner_id, category, rule, payload, enabled, next_trigger, \
                       last_triggered, trigger_count, created_at, updated_at";

const INSERT: &str = "INSERT INTO reminders (id, owner_id, category, rule, payload, enabled, \
                      next_trigger, last_triggered, trigger_count, created_at, updated_at) \
                      VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)";

const UPSERT_SUFFIX: &str = " ON CONFLICT (id) DO UPDATE SET \
                             owner_id = EXCLUDED.owner_id, \
                             category = EXCLUDED.category, \
                             rule = EXCLUDED.rule, \
                             payload = EXCLUDED.payload, \
                             enabled = EXCLUDED.enabled, \
                             next_trigger = EXCLUDED.next_trigger, \
                             last_triggered = EXCLUDED.last_triggered, \
                             trigger_count = EXCLUDED.trigger_count, \
                             updated_at = EXCLUDED.updated_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ReminderStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ReminderRecord {
    id: String,
    owner_id: String,
    category: String,
    rule: Json<RecurrenceRule>,
    payload: Json<Payload>,
    enabled: bool,
    next_trigger: NaiveDateTime,
    last_triggered: Option<NaiveDateTime>,
    trigger_count: i32,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl ReminderRecord {
    fn to_domain(self) -> PortResult<Reminder> {
        let category = Category::from_key(&self.category).ok_or_else(|| {
            PortError::Unexpected(format!(
                "Reminder {} has unknown category '{}'",
                self.id, self.category
            ))
        })?;
        Ok(Reminder {
            id: self.id,
            owner_id: self.owner_id,
            category,
            rule: self.rule.0,
            payload: self.payload.0,
            enabled: self.enabled,
            next_trigger: self.next_trigger,
            last_triggered: self.last_triggered,
            trigger_count: u32::try_from(self.trigger_count).unwrap_or(0),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn to_domain_all(records: Vec<ReminderRecord>) -> PortResult<Vec<Reminder>> {
    records.into_iter().map(ReminderRecord::to_domain).collect()
}

/// Binds every column of `reminder`, in `INSERT` order.
fn bind_reminder<'q>(
    query: Query<'q, Postgres, PgArguments>,
    reminder: Reminder,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(reminder.id)
        .bind(reminder.owner_id)
        .bind(reminder.category.key())
        .bind(Json(reminder.rule))
        .bind(Json(reminder.payload))
        .bind(reminder.enabled)
        .bind(reminder.next_trigger)
        .bind(reminder.last_triggered)
        .bind(i32::try_from(reminder.trigger_count).unwrap_or(i32::MAX))
        .bind(reminder.created_at)
        .bind(reminder.updated_at)
}

/// Maps a `sqlx` failure onto the port's error vocabulary.
fn map_db_error(e: sqlx::Error) -> PortError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return PortError::Conflict(db.message().to_string());
        }
    }
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound("Reminder not found".to_string()),
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => PortError::StorageUnavailable(e.to_string()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn touched(mut reminder: Reminder) -> Reminder {
    reminder.updated_at = Local::now().naive_local();
    reminder
}

//=========================================================================================
// `ReminderStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ReminderStore for DbAdapter {
    async fn get(&self, id: &str) -> PortResult<Reminder> {
        let sql = format!("SELECT {COLUMNS} FROM reminders WHERE id = $1");
        let record = sqlx::query_as::<_, ReminderRecord>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => PortError::NotFound(format!("Reminder {} not found", id)),
                other => map_db_error(other),
            })?;
        record.to_domain()
    }

    async fn put(&self, reminder: Reminder) -> PortResult<Reminder> {
        let sql = format!("{INSERT}{UPSERT_SUFFIX} RETURNING {COLUMNS}");
        let query = bind_reminder(sqlx::query(&sql), touched(reminder));
        let row = query.fetch_one(&self.pool).await.map_err(map_db_error)?;
        ReminderRecord::from_row(&row)
            .map_err(map_db_error)?
            .to_domain()
    }

    async fn put_batch(&self, reminders: Vec<Reminder>) -> PortResult<()> {
        let sql = format!("{INSERT}{UPSERT_SUFFIX}");
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;
        for reminder in reminders {
            bind_reminder(sqlx::query(&sql), touched(reminder))
                .execute(&mut *tx)
                .await
                .map_err(map_db_error)?;
        }
        tx.commit().await.map_err(map_db_error)?;
        Ok(())
    }

    async fn insert_batch(&self, reminders: Vec<Reminder>) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;
        for reminder in reminders {
            bind_reminder(sqlx::query(INSERT), touched(reminder))
                .execute(&mut *tx)
                .await
                .map_err(map_db_error)?;
        }
        tx.commit().await.map_err(map_db_error)?;
        Ok(())
    }

    async fn get_by_owner(&self, owner_id: &str) -> PortResult<Vec<Reminder>> {
        let sql = format!("SELECT {COLUMNS} FROM reminders WHERE owner_id = $1 ORDER BY id ASC");
        let records = sqlx::query_as::<_, ReminderRecord>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;
        to_domain_all(records)
    }

    async fn get_due(&self, horizon: NaiveDateTime) -> PortResult<Vec<Reminder>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM reminders WHERE enabled AND next_trigger <= $1 \
             ORDER BY next_trigger ASC"
        );
        let records = sqlx::query_as::<_, ReminderRecord>(&sql)
            .bind(horizon)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;
        to_domain_all(records)
    }

    async fn delete(&self, id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM reminders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn delete_all_for_owner(&self, owner_id: &str) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM reminders WHERE owner_id = $1")
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected())
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> PortResult<()> {
        let result = sqlx::query("UPDATE reminders SET enabled = $1, updated_at = $2 WHERE id = $3")
            .bind(enabled)
            .bind(Local::now().naive_local())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Reminder {} not found", id)));
        }
        Ok(())
    }

    async fn record_firing(
        &self,
        fired: &Reminder,
        next_trigger: NaiveDateTime,
        fired_at: NaiveDateTime,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE reminders SET next_trigger = $1, last_triggered = $2, \
             trigger_count = CASE WHEN trigger_count < 2147483647 \
             THEN trigger_count + 1 ELSE trigger_count END, updated_at = $3 \
             WHERE id = $4 AND created_at = $5 AND next_trigger = $6",
        )
        .bind(next_trigger)
        .bind(fired_at)
        .bind(Local::now().naive_local())
        .bind(&fired.id)
        .bind(fired.created_at)
        .bind(fired.next_trigger)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }
}
