use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Json, Router,
};
use dotenv::dotenv;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

use findmylostid_backend::api::{self, ApiState};
use findmylostid_backend::config::AppConfig;
use findmylostid_backend::database::catalog_repository::CatalogRepository;
use findmylostid_backend::database::claim_repository::ClaimRepository;
use findmylostid_backend::database::payment_repository::PaymentRepository;
use findmylostid_backend::database;
use findmylostid_backend::health::{HealthChecker, HealthState, HealthStatus};
use findmylostid_backend::logging::init_tracing;
use findmylostid_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use findmylostid_backend::mpesa::DarajaClient;
use findmylostid_backend::services::callback_processor::CallbackProcessor;
use findmylostid_backend::services::claim_gate::ClaimService;
use findmylostid_backend::services::payment_initiation::PaymentInitiationService;
use findmylostid_backend::services::reconciliation::ReconciliationService;
use findmylostid_backend::workers::payment_reconciler::{
    PaymentReconcilerWorker, ReconcilerConfig,
};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenv().ok();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        "🚀 Starting Find My Lost ID backend service"
    );

    let config = AppConfig::from_env().map_err(|e| {
        error!("❌ Failed to load configuration: {}", e);
        anyhow::anyhow!(e)
    })?;
    config.validate().map_err(|e| {
        error!("❌ Invalid configuration: {}", e);
        anyhow::anyhow!(e)
    })?;

    info!("📊 Initializing database connection pool...");
    let db_pool = database::init_pool_from_config(&config.database)
        .await
        .map_err(|e| {
            error!("Failed to initialize database pool: {}", e);
            anyhow::anyhow!(e.to_string())
        })?;
    info!("✅ Database connection pool initialized");

    info!("📱 Initializing M-Pesa gateway client...");
    let gateway = Arc::new(DarajaClient::from_env().map_err(|e| {
        error!("❌ Failed to initialize M-Pesa gateway client: {}", e);
        anyhow::anyhow!(e.to_string())
    })?);
    info!("✅ M-Pesa gateway client initialized");

    let payments = Arc::new(PaymentRepository::new(db_pool.clone()));
    let claim_repo = Arc::new(ClaimRepository::new(db_pool.clone()));
    let catalog = Arc::new(CatalogRepository::new(db_pool.clone()));

    let initiation = Arc::new(PaymentInitiationService::new(
        gateway.clone(),
        payments.clone(),
        catalog.clone(),
    ));
    let callbacks = Arc::new(CallbackProcessor::new(payments.clone()));
    let claims = Arc::new(ClaimService::new(payments.clone(), claim_repo.clone()));
    let health_checker = HealthChecker::new(db_pool.clone());

    // Reconciliation worker for payments whose callback never arrived.
    let (worker_shutdown_tx, worker_shutdown_rx) = watch::channel(false);
    let reconciler_enabled = std::env::var("RECONCILER_ENABLED")
        .unwrap_or_else(|_| "true".to_string())
        .to_lowercase()
        != "false";
    let mut reconciler_handle = None;
    if reconciler_enabled {
        let reconciler_config = ReconcilerConfig::from_env();
        info!(
            poll_interval_secs = reconciler_config.poll_interval.as_secs(),
            min_pending_age_secs = reconciler_config.min_pending_age.as_secs(),
            batch_size = reconciler_config.batch_size,
            "Starting payment reconciler worker"
        );
        let reconciliation = Arc::new(ReconciliationService::new(
            gateway.clone(),
            payments.clone(),
        ));
        let worker = PaymentReconcilerWorker::new(reconciliation, reconciler_config);
        reconciler_handle = Some(tokio::spawn(worker.run(worker_shutdown_rx)));
    } else {
        info!("Payment reconciler worker disabled (RECONCILER_ENABLED=false)");
    }

    let state = ApiState {
        initiation,
        callbacks,
        claims,
        payments,
        claim_repo,
        health: health_checker,
    };

    info!("🛣️  Setting up application routes...");
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .route("/api/payments/initiate", post(api::payments::initiate_payment))
        .route(
            "/api/payments/callback",
            post(api::payments::mpesa_callback).get(api::payments::callback_probe),
        )
        .route("/api/payments/status", get(api::payments::payment_status))
        .route("/api/claims", post(api::claims::submit_claim))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        );
    info!("✅ Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    println!("\n╔══════════════════════════════════════════════════════════╗");
    println!("║        FIND MY LOST ID BACKEND IS RUNNING                ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("║  GET  /                        - Root endpoint           ║");
    println!("║  GET  /health                  - Health check            ║");
    println!("║  POST /api/payments/initiate   - STK push initiation     ║");
    println!("║  POST /api/payments/callback   - M-Pesa result callback  ║");
    println!("║  GET  /api/payments/status     - Payment/claim status    ║");
    println!("║  POST /api/claims              - Claim submission        ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");

    info!(address = %addr, "🚀 Server listening on http://{}", addr);
    info!("✅ Server is ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(worker_shutdown_tx.clone()))
        .await?;

    let _ = worker_shutdown_tx.send(true);
    if let Some(handle) = reconciler_handle {
        if let Err(e) = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await {
            error!(error = %e, "Timed out waiting for reconciler worker shutdown");
        }
    }

    info!("👋 Server shutdown complete");

    Ok(())
}

// Handlers

async fn root() -> &'static str {
    "Welcome to Find My Lost ID Backend API"
}

async fn health(
    axum::extract::State(state): axum::extract::State<ApiState>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    let health_status = state.health.check_health().await;

    if matches!(health_status.status, HealthState::Unhealthy) {
        error!("❌ Health check failed - service unhealthy");
        Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable".to_string(),
        ))
    } else {
        Ok(Json(health_status))
    }
}

/// Readiness probe - checks if the service is ready to accept traffic
async fn readiness(
    state: axum::extract::State<ApiState>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    health(state).await
}

/// Liveness probe - checks if the service is alive (basic check)
async fn liveness() -> &'static str {
    "OK"
}
