//! services/agent/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::scheduler::{Reconciler, StatusHandle};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<Reconciler>,
    pub status: StatusHandle,
    pub config: Arc<Config>,
}
