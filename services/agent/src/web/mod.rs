pub mod rest;
pub mod state;

use axum::{
    routing::{get, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use rest::{
    delete_reminder_handler, list_reminders_handler, put_settings_handler, set_enabled_handler,
    status_handler,
};
pub use state::AppState;

/// Builds the API router. CORS and Swagger UI are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/owners/{owner_id}/settings", put(put_settings_handler))
        .route("/owners/{owner_id}/reminders", get(list_reminders_handler))
        .route("/reminders/{id}/enabled", put(set_enabled_handler))
        .route("/reminders/{id}", axum::routing::delete(delete_reminder_handler))
        .route("/agent/status", get(status_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
