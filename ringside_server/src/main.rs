//! Fight-betting platform server.
//!
//! Composition root: loads configuration, connects the database, wires the
//! managers together and serves the HTTP/WebSocket API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use pico_args::Arguments;
use ringside::db::Database;
use ringside_server::{
    api::{self, AppState},
    config::ServerConfig,
    logging, metrics,
};

const HELP: &str = "\
Run the ringside fight-betting server

USAGE:
  ringside_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  METRICS_BIND             Prometheus exporter address (disabled when unset)
  DATABASE_URL             PostgreSQL connection string
  JWT_SECRET               JWT signing secret (at least 32 characters)
  PASSWORD_PEPPER          Password hashing pepper (at least 16 characters)
  WEBHOOK_SECRET           Payment webhook signing secret (at least 16 characters)
  MIN_BET_AMOUNT           Smallest stake in minor units [default: 100]
  MAX_BET_AMOUNT           Largest stake in minor units [default: 1000000]
  COMMISSION_RATE          Share of gross winnings kept [default: 0.10]
  INITIAL_BALANCE          Balance credited to new wallets [default: 0]
  TRUSTED_PROXIES          Proxy IPs allowed to set X-Forwarded-For [default: none]
  RUST_LOG                 Log filter [default: info,sqlx=warn,hyper=warn]
  (See README.md for all configuration options)
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let args = Args {
        bind: pargs
            .opt_value_from_str("--bind")
            .context("--bind must be an IP:PORT address")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url)?;
    tracing::info!("Starting ringside server at {}", config.bind);

    if let Some(metrics_bind) = config.metrics_bind {
        metrics::init_metrics(metrics_bind).map_err(anyhow::Error::msg)?;
        tracing::info!("Prometheus metrics exposed at http://{}/metrics", metrics_bind);
    }

    let db = Database::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to run migrations")?;
    tracing::info!("Database connected and migrated");

    let state = AppState::new(Arc::new(db.pool().clone()), &config);
    state
        .transaction_manager
        .verify_commission_account()
        .await
        .context("HOUSE_USER_ID must name an existing user with a wallet")?;
    let sweeper = state.login_throttle.clone().spawn_sweeper();

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    tracing::info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    sweeper.abort();
    tracing::info!("Shutting down server...");

    served.context("Server error")
}

/// Resolves on Ctrl+C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler, run until the process is killed
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
