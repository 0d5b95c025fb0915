//! services/agent/src/bin/agent.rs

use agent_lib::{
    adapters::{DbAdapter, DefaultPayloads, LogSink, MemoryStore, MpscWake, WebhookSink},
    config::Config,
    error::AgentError,
    scheduler::{Reconciler, TriggerLoop},
    web::{self, rest::ApiDoc, AppState},
};
use axum::http::Method;
use axum::Router;
use reminder_core::clock::{Clock, SystemClock};
use reminder_core::ports::{DeliverySink, ReminderStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), AgentError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting reminder agent...");

    // --- 2. Connect to the Reminder Store ---
    let store: Arc<dyn ReminderStore> = match &config.database_url {
        Some(url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        None => {
            warn!("DATABASE_URL not set; reminders are kept in memory and lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // --- 3. Initialize Delivery and Wake Adapters ---
    let sink: Arc<dyn DeliverySink> = match &config.webhook_url {
        Some(url) => {
            info!("Delivering reminders to webhook {}", url);
            let client = reqwest::Client::builder()
                .timeout(config.delivery_timeout)
                .build()
                .map_err(|e| AgentError::Internal(format!("Failed to build HTTP client: {}", e)))?;
            Arc::new(WebhookSink::new(client, url.clone()))
        }
        None => {
            info!("WEBHOOK_URL not set; reminders are written to the log");
            Arc::new(LogSink)
        }
    };
    let (wake, wake_rx) = MpscWake::channel(config.wake_buffer);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let calculator = config.calculator();

    // --- 4. Build the Scheduler ---
    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        Arc::new(wake),
        Arc::new(DefaultPayloads),
        clock.clone(),
        calculator,
        config.reconcile_settle,
    ));
    let trigger_loop = Arc::new(TriggerLoop::new(
        store,
        sink,
        clock,
        calculator,
        config.scan_interval,
        config.delivery_timeout,
    ));

    let cancel = CancellationToken::new();
    let loop_handle = {
        let trigger_loop = trigger_loop.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { trigger_loop.run(wake_rx, cancel).await })
    };

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        reconciler,
        status: trigger_loop.status(),
        config: config.clone(),
    });

    // --- 6. Create the Web Router ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let app = Router::new()
        .merge(web::router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("Could not listen for shutdown signal");
            }
            info!("Shutdown requested");
            shutdown.cancel();
        })
        .await?;

    // --- 8. Stop the Trigger Loop ---
    cancel.cancel();
    if let Err(e) = loop_handle.await {
        warn!("Trigger loop ended abnormally: {}", e);
    }
    info!("Reminder agent stopped.");
    Ok(())
}
