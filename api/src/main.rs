//! MemberPool API Server
//!
//! Administers a capped pool of members sharing a wallet ledger: expiring a
//! member charges everyone else, reverting refunds them, and members can be
//! bulk-imported from CSV.
//! Uses hexagonal (ports & adapters) architecture for clean separation of concerns.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use sea_orm::Database;
use serde::Serialize;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::GovernorLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod adapters;
mod app;
mod auth;
mod config;
mod domain;
mod entity;
mod error;
mod handlers;
mod roster;

#[cfg(test)]
mod test_utils;


use adapters::{LogNotifier, PostgresMemberRepository, WebhookNotifier};
use app::{spawn_dispatcher, ImportReportStore, ImportService, LedgerEventSink, LedgerService};
use auth::AdminKey;
use config::Config;
use domain::ports::{MemberRepository, MembershipNotifier};

/// Application state shared across all handlers
pub struct AppState<MR: MemberRepository> {
    pub ledger_service: Arc<LedgerService<MR>>,
    pub import_service: Arc<ImportService<MR>>,
}

// Manual impl: derive would require `MR: Clone`
impl<MR: MemberRepository> Clone for AppState<MR> {
    fn clone(&self) -> Self {
        Self {
            ledger_service: self.ledger_service.clone(),
            import_service: self.import_service.clone(),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the router for any member store
pub fn build_router<MR: MemberRepository + 'static>(
    state: AppState<MR>,
    admin_key: AdminKey,
) -> anyhow::Result<Router> {
    // Rate limiting for uploads: 1 req/sec sustained, burst of 5
    // Uses PeerIpKeyExtractor to get client IP from socket connection
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(1)
            .burst_size(5)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Failed to build governor config"))?,
    );

    let import_routes = Router::new()
        .route("/members/import", post(handlers::import_members::<MR>))
        .layer(GovernorLayer {
            config: governor_config,
        });

    let admin_routes = Router::new()
        .route(
            "/members",
            get(handlers::list_members::<MR>).post(handlers::create_member::<MR>),
        )
        .route(
            "/members/:id",
            get(handlers::get_member::<MR>).patch(handlers::update_member::<MR>),
        )
        .route("/members/:id/expire", post(handlers::expire_member::<MR>))
        .route("/members/:id/revert", post(handlers::revert_member::<MR>))
        .route(
            "/members/actions/expire",
            post(handlers::expire_members::<MR>),
        )
        .route(
            "/members/actions/revert",
            post(handlers::revert_members::<MR>),
        )
        .route(
            "/members/import/reports/:id",
            get(handlers::download_report::<MR>),
        )
        .merge(import_routes)
        .layer(middleware::from_fn_with_state(
            admin_key,
            auth::require_admin,
        ));

    Ok(Router::new()
        // Health check (no auth)
        .route("/health", get(health))
        .merge(admin_routes)
        // Middleware
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,memberpool_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting MemberPool API...");

    // Load configuration
    let config = Config::from_env()?;

    // Connect to PostgreSQL
    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url).await?;
    tracing::info!("Database connected");

    // Create adapters
    let member_repo = Arc::new(PostgresMemberRepository::new(db));

    let notifier: Arc<dyn MembershipNotifier> = match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!(%url, "Ledger events will be posted to webhook");
            Arc::new(WebhookNotifier::new(url.clone()))
        }
        None => Arc::new(LogNotifier),
    };

    // Notifications run on their own task, outside ledger transactions
    let (events, event_rx) = LedgerEventSink::channel();
    spawn_dispatcher(notifier, event_rx);

    // Create application services
    let ledger_service = Arc::new(LedgerService::new(member_repo.clone(), events));
    let import_service = Arc::new(ImportService::new(
        member_repo,
        ImportReportStore::new(chrono::Duration::seconds(config.import_report_ttl_secs)),
    ));

    let state = AppState {
        ledger_service,
        import_service,
    };
    let app = build_router(state, AdminKey::new(&config.admin_api_key))?;

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
