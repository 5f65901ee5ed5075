//! HTTP server implementation using Axum.

use axum::{
    Router,
    routing::{get, post, put},
};
use clientchain_channels::{RecordingChannel, SendGridEmail, TwilioSms};
use clientchain_core::config::ClientChainConfig;
use clientchain_core::traits::{EmailSender, SmsSender};
use clientchain_engine::{AutomationDb, ExecutionRunner, TriggerDispatcher, spawn_sweeper};
use clientchain_ledger::LedgerDb;
use clientchain_policy::{Clock, InMemoryCounter, PolicyPipeline, SystemClock};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub config: ClientChainConfig,
    pub start_time: std::time::Instant,
    pub automation: Arc<AutomationDb>,
    pub ledger: Arc<LedgerDb>,
    pub runner: Arc<ExecutionRunner>,
    pub dispatcher: Arc<TriggerDispatcher>,
    pub clock: Arc<dyn Clock>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    Router::new()
        .route("/health", get(super::routes::health_check))
        .route("/api/workflows", get(super::routes::list_workflows))
        .route("/api/workflows", post(super::routes::create_workflow))
        .route("/api/workflows/templates", get(super::routes::list_templates))
        .route(
            "/api/workflows/templates/apply",
            post(super::routes::apply_template),
        )
        .route("/api/workflows/{id}", get(super::routes::get_workflow))
        .route(
            "/api/workflows/{id}/status",
            put(super::routes::set_workflow_status),
        )
        .route("/api/workflows/{id}/run", post(super::routes::run_workflow))
        .route(
            "/api/workflows/{id}/executions",
            get(super::routes::workflow_executions),
        )
        .route("/api/events", post(super::routes::ingest_event))
        .route("/api/sweep", post(super::routes::sweep_now))
        .route("/api/executions/{id}", get(super::routes::get_execution))
        .route("/api/subjects", post(super::routes::create_subject))
        .route("/api/subjects/{id}", get(super::routes::get_subject))
        .route("/api/subjects/{id}", axum::routing::patch(super::routes::patch_subject))
        .route("/api/subjects/{id}/credits", get(super::routes::subject_credits))
        .route("/api/subjects/{id}/redeem", post(super::routes::redeem_credits))
        .route("/api/tasks", get(super::routes::list_open_tasks))
        .layer(
            CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::PATCH,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any)
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Wire the full engine stack from config. Falls back to the recording
/// channel when a gateway has no credentials, so a dev install still runs
/// end to end.
pub fn build_state(config: &ClientChainConfig) -> anyhow::Result<AppState> {
    let data_dir = config.engine.data_dir();
    let automation = Arc::new(AutomationDb::open(&data_dir.join("automation.db"))?);
    let ledger = Arc::new(LedgerDb::open(&data_dir.join("ledger.db"))?);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let counter = Arc::new(InMemoryCounter::new(clock.clone()));
    let policy = Arc::new(PolicyPipeline::standard(&config.policy, counter, clock.clone()));

    let sms: Arc<dyn SmsSender> = if config.twilio.is_configured() {
        tracing::info!("📱 SMS channel: Twilio ({})", config.twilio.from_number);
        Arc::new(TwilioSms::new(config.twilio.clone()))
    } else {
        tracing::warn!("📱 SMS channel: recording only (Twilio not configured)");
        Arc::new(RecordingChannel::new())
    };
    let email: Arc<dyn EmailSender> = if config.sendgrid.is_configured() {
        tracing::info!("✉️ Email channel: SendGrid ({})", config.sendgrid.from_email);
        Arc::new(SendGridEmail::new(config.sendgrid.clone()))
    } else {
        tracing::warn!("✉️ Email channel: recording only (SendGrid not configured)");
        Arc::new(RecordingChannel::new())
    };

    let runner = Arc::new(ExecutionRunner::new(
        automation.clone(),
        ledger.clone(),
        policy,
        sms,
        email,
        clock.clone(),
    ));
    let dispatcher = Arc::new(TriggerDispatcher::new(
        automation.clone(),
        runner.clone(),
        clock.clone(),
    ));

    Ok(AppState {
        config: config.clone(),
        start_time: std::time::Instant::now(),
        automation,
        ledger,
        runner,
        dispatcher,
        clock,
    })
}

/// Start the HTTP server and the background sweeper.
pub async fn start(config: &ClientChainConfig) -> anyhow::Result<()> {
    let state = build_state(config)?;

    spawn_sweeper(
        state.runner.clone(),
        state.clock.clone(),
        config.engine.sweep_interval_secs,
    );
    tracing::info!(
        "🔄 Sweeper running every {}s",
        config.engine.sweep_interval_secs
    );

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Gateway listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
