//! services/agent/src/scheduler/mod.rs
//!
//! The two moving parts of the agent: the reconciler that installs reminder
//! sets and the trigger loop that fires them.

pub mod reconciler;
pub mod trigger_loop;

pub use reconciler::{ReconcileReport, Reconciler, SkippedCategory};
pub use trigger_loop::{AgentPhase, AgentStatus, ScanSummary, StatusHandle, TriggerLoop};
