//! HTTP/WebSocket API for the betting platform.
//!
//! # Modules
//!
//! - [`auth`]: register, login (throttled), refresh, logout, profile
//! - [`wallet`]: balances, transaction history, deposits and withdrawals
//! - [`payments`]: signed payment provider webhook
//! - [`fights`]: public fighter and fight catalog
//! - [`bets`]: placing, listing and cancelling bets
//! - [`notifications`]: the user's notification inbox
//! - [`admin`]: catalog management, settlement and user administration
//! - [`websocket`]: live push of bet updates and fight results
//!
//! # Errors
//!
//! Every handler returns [`error::ApiError`], which maps library errors to
//! status codes and a JSON body of the form `{"error": "..."}`.
//!
//! # CORS
//!
//! CORS is permissive; put the server behind a proxy that restricts origins in
//! production.

pub mod admin;
pub mod auth;
pub mod bets;
pub mod client;
pub mod error;
pub mod fights;
pub mod middleware;
pub mod notifications;
pub mod payments;
pub mod request_id;
pub mod wallet;
pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post, put},
};
use ringside::{
    auth::AuthManager,
    betting::BetManager,
    catalog::CatalogManager,
    notify::NotificationDispatcher,
    security::LoginThrottle,
    transaction::TransactionManager,
    wallet::WalletManager,
};
use serde_json::json;
use sqlx::PgPool;
use std::{
    net::IpAddr,
    sync::{Arc, atomic::AtomicUsize},
};
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;

/// Default page size for list endpoints
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Application state shared across all handlers
///
/// Cloned per request; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<PgPool>,
    pub auth_manager: Arc<AuthManager>,
    pub wallet_manager: Arc<WalletManager>,
    pub transaction_manager: Arc<TransactionManager>,
    pub catalog_manager: Arc<CatalogManager>,
    pub bet_manager: Arc<BetManager>,
    pub notifications: Arc<NotificationDispatcher>,
    pub login_throttle: Arc<LoginThrottle>,
    /// Shared secret the payment provider signs webhooks with
    pub webhook_secret: Arc<String>,
    /// Open WebSocket connections
    pub ws_connections: Arc<AtomicUsize>,
    /// Proxies allowed to report the client address
    pub trusted_proxies: Arc<Vec<IpAddr>>,
}

impl AppState {
    /// Wire every manager to one pool
    pub fn new(pool: Arc<PgPool>, config: &ServerConfig) -> Self {
        let auth_manager = AuthManager::new(
            pool.clone(),
            config.security.password_pepper.clone(),
            config.security.jwt_secret.clone(),
        )
        .with_initial_balance(config.initial_balance);

        let transaction_manager = Arc::new(TransactionManager::new(
            pool.clone(),
            config.ledger.clone(),
        ));
        let notifications = Arc::new(NotificationDispatcher::new(pool.clone()));
        let bet_manager = BetManager::new(
            pool.clone(),
            config.ledger.clone(),
            transaction_manager.clone(),
            notifications.clone(),
        );

        Self {
            auth_manager: Arc::new(auth_manager),
            wallet_manager: Arc::new(WalletManager::new(pool.clone())),
            catalog_manager: Arc::new(CatalogManager::new(pool.clone())),
            bet_manager: Arc::new(bet_manager),
            transaction_manager,
            notifications,
            login_throttle: Arc::new(LoginThrottle::in_memory(config.throttle.clone())),
            webhook_secret: Arc::new(config.security.webhook_secret.clone()),
            ws_connections: Arc::new(AtomicUsize::new(0)),
            trusted_proxies: Arc::new(config.trusted_proxies.clone()),
            pool,
        }
    }
}

/// Create the complete API router
///
/// ```text
/// GET  /health                                   - Health check
/// GET  /ws?token=<jwt>                           - Live updates
///
/// POST /api/v1/auth/register                     - Register and log in
/// POST /api/v1/auth/login                        - Log in (throttled per IP)
/// POST /api/v1/auth/refresh                      - Rotate refresh token
/// GET  /api/v1/fighters[/{id}]                   - Fighter catalog
/// GET  /api/v1/fights[/{id}]                     - Fight catalog
/// POST /api/v1/payments/webhook                  - Provider callback (signed)
///
/// POST /api/v1/auth/logout                       - (auth)
/// GET  /api/v1/auth/me                           - (auth)
/// GET  /api/v1/wallet                            - (auth)
/// GET  /api/v1/wallet/transactions               - (auth)
/// POST /api/v1/wallet/deposit                    - (auth)
/// POST /api/v1/wallet/withdraw                   - (auth)
/// POST /api/v1/wallet/transactions/{id}/cancel   - (auth)
/// POST /api/v1/bets, GET /api/v1/bets            - (auth)
/// GET  /api/v1/bets/{id}                         - (auth)
/// POST /api/v1/bets/{id}/cancel                  - (auth)
/// GET  /api/v1/notifications                     - (auth)
/// POST /api/v1/notifications/{id}/read           - (auth)
/// POST /api/v1/notifications/read-all            - (auth)
///
/// /api/v1/admin/...                              - (admin) see [`admin`]
/// ```
pub fn create_router(state: AppState) -> Router {
    let v1_routes = create_v1_router(state.clone());

    let root_routes = Router::new()
        .route("/health", get(health_check))
        // WebSocket authenticates through its query parameter
        .route("/ws", get(websocket::websocket_handler));

    Router::new()
        .merge(root_routes)
        .nest("/api/v1", v1_routes)
        .layer(axum::middleware::from_fn(middleware::metrics_middleware))
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router(state: AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/fighters", get(fights::list_fighters))
        .route("/fighters/{id}", get(fights::get_fighter))
        .route("/fights", get(fights::list_fights))
        .route("/fights/{id}", get(fights::get_fight))
        .route("/payments/webhook", post(payments::webhook));

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/wallet", get(wallet::get_wallet))
        .route("/wallet/transactions", get(wallet::list_transactions))
        .route("/wallet/deposit", post(wallet::deposit))
        .route("/wallet/withdraw", post(wallet::withdraw))
        .route(
            "/wallet/transactions/{id}/cancel",
            post(wallet::cancel_transaction),
        )
        .route("/bets", post(bets::place_bet).get(bets::list_bets))
        .route("/bets/{id}", get(bets::get_bet))
        .route("/bets/{id}/cancel", post(bets::cancel_bet))
        .route("/notifications", get(notifications::list))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/fighters", post(admin::create_fighter))
        .route("/fighters/{id}", put(admin::update_fighter))
        .route("/fights", post(admin::create_fight))
        .route("/fights/{id}/odds", put(admin::update_odds))
        .route("/fights/{id}/start", post(admin::start_fight))
        .route("/fights/{id}/result", post(admin::record_result))
        .route("/fights/{id}/postpone", post(admin::postpone_fight))
        .route("/fights/{id}/reschedule", post(admin::reschedule_fight))
        .route("/fights/{id}/cancel", post(admin::cancel_fight))
        .route("/fights/{id}/bets", get(admin::list_fight_bets))
        .route("/fights/{id}/settlement", get(admin::settlement_status))
        .route(
            "/fights/{id}/settlement/retry",
            post(admin::retry_settlement),
        )
        .route("/bets/{id}/accept", post(admin::accept_bet))
        .route("/bets/{id}/settle", post(admin::settle_bet))
        .route("/users", get(admin::list_users))
        .route("/users/{id}/active", put(admin::set_user_active))
        .route("/users/{id}/adjustments", post(admin::adjust_balance))
        .route(
            "/transactions/{id}/confirm",
            post(admin::confirm_transaction),
        )
        .layer(axum::middleware::from_fn(middleware::admin_middleware))
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest("/admin", admin_routes)
}

/// Health check for monitoring and load balancers
///
/// Returns `200 OK` when the database answers, `503 Service Unavailable`
/// otherwise.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","database":true,"websocketConnections":0,"timestamp":"2026-10-17T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = sqlx::query("SELECT 1")
        .execute(state.pool.as_ref())
        .await
        .is_ok();

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        tracing::error!("Health check failed: database unreachable");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": if db_healthy { "healthy" } else { "unhealthy" },
            "database": db_healthy,
            "websocketConnections": state
                .ws_connections
                .load(std::sync::atomic::Ordering::Relaxed),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}
