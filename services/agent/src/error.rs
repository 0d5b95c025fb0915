//! services/agent/src/error.rs
//!
//! Defines the primary error type for the entire agent service.

use crate::config::ConfigError;
use reminder_core::ports::PortError;

/// The primary error type for the `agent` service.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// The replacement reminder set could not be installed, even after the
    /// delete-and-insert fallback. The owner's previous set is gone.
    #[error("Reminders for owner {owner_id} could not be installed: {source}")]
    ReconciliationConflict {
        owner_id: String,
        #[source]
        source: PortError,
    },

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error while applying database migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
