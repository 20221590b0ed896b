//! Service entry point: configuration, storage, gateway registry, router.

use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use little_threads_backend::api::{self, AppState};
use little_threads_backend::config::AppConfig;
use little_threads_backend::health::{self, HealthState, HealthStatus};
use little_threads_backend::logging::init_tracing;
use little_threads_backend::orders::coupons::{CouponStore, InMemoryCouponStore, PgCouponStore};
use little_threads_backend::orders::store::{InMemoryOrderStore, OrderStore, PgOrderStore};
use little_threads_backend::payments::factory::GatewayRegistry;
use little_threads_backend::services::checkout::CheckoutService;
use little_threads_backend::services::notification::NotificationService;
use little_threads_backend::services::pricing::PricingConfig;
use little_threads_backend::{db, AppError};

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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        store = %config.store.store_name,
        "Starting Little Threads backend service"
    );

    // Database pool, or the in-memory stores when DATABASE_URL is absent.
    let db_pool = match config.database.url.as_deref() {
        Some(url) => {
            info!("Initializing database connection pool...");
            let pool = db::init_pool(url, &config.database).await.map_err(|e| {
                error!("Failed to initialize database pool: {}", e);
                e
            })?;
            info!(
                max_connections = config.database.max_connections,
                "Database connection pool initialized"
            );
            Some(pool)
        }
        None => {
            info!("DATABASE_URL not set, running on the in-memory order store");
            None
        }
    };

    let (orders, coupons): (Arc<dyn OrderStore>, Arc<dyn CouponStore>) = match db_pool.clone() {
        Some(pool) => (
            Arc::new(PgOrderStore::new(pool.clone())),
            Arc::new(PgCouponStore::new(pool)),
        ),
        None => (
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryCouponStore::new()),
        ),
    };

    let gateways = Arc::new(GatewayRegistry::from_env().map_err(AppError::from)?);
    info!(enabled = ?gateways.list_enabled(), "Payment gateway registry initialized");

    let notifications = Arc::new(NotificationService::new(
        config.store.store_name.clone(),
        config.store.whatsapp_number.clone(),
        config.store.admin_whatsapp_number.clone(),
        config.store.notify_relay_url.clone(),
    ));

    let checkout = Arc::new(CheckoutService::new(
        orders.clone(),
        coupons.clone(),
        gateways,
        notifications.clone(),
        PricingConfig {
            free_shipping_threshold: config.store.free_shipping_threshold,
            shipping_fee: config.store.shipping_fee,
        },
        config.store.store_name.clone(),
    ));

    let state = AppState {
        checkout,
        orders,
        coupons,
        notifications,
        store: Arc::new(config.store.clone()),
        db_pool,
    };

    let cors = {
        let origins: Vec<HeaderValue> = config
            .server
            .cors_allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    info!("Setting up application routes...");
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .route("/api/orders", post(api::orders::create_order))
        .route(
            "/api/orders/{order_ref}",
            get(api::orders::get_order).patch(api::orders::update_order),
        )
        .route(
            "/api/orders/{order_ref}/payment-proof",
            post(api::orders::upload_payment_proof),
        )
        .route("/api/coupons/validate", post(api::coupons::validate_coupon))
        .route("/api/payments/jazzcash", post(api::payments::init_jazzcash))
        .route(
            "/api/payments/jazzcash/callback",
            post(api::callbacks::jazzcash_callback),
        )
        .route("/api/payments/easypaisa", post(api::payments::init_easypaisa))
        .route(
            "/api/payments/easypaisa/callback",
            get(api::callbacks::easypaisa_callback),
        )
        .route("/api/payments/safepay", post(api::payments::init_safepay))
        .route(
            "/api/payments/safepay/callback",
            get(api::callbacks::safepay_redirect),
        )
        .route(
            "/api/payments/safepay/webhook",
            post(api::callbacks::safepay_webhook),
        )
        .nest_service("/uploads", ServeDir::new(&config.store.upload_dir))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors),
        );
    info!("Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn root() -> &'static str {
    "Little Threads order & payments API"
}

async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(health::check_health(state.db_pool.as_ref()).await)
}

/// Readiness degrades to 503 when a dependency is down so load balancers
/// stop routing traffic; liveness stays 200 as long as the process runs.
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let status = health::check_health(state.db_pool.as_ref()).await;
    let code = match status.status {
        HealthState::Healthy => StatusCode::OK,
        HealthState::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(status))
}

async fn liveness() -> &'static str {
    "OK"
}
