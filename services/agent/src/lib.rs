//! services/agent/src/lib.rs
//!
//! The reminder agent: adapters for the core ports, the reconciler and trigger
//! loop, and the REST surface that accepts settings.

pub mod adapters;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod web;
