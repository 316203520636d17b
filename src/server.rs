//! HTTP server initialization and runtime setup.
//!
//! Handles database connections, cache setup, background jobs, and the Axum
//! server lifecycle including graceful shutdown.

use crate::api::middleware::idempotency::IDEMPOTENCY_TTL_SECONDS;
use crate::auth::JwtValidator;
use crate::config::Config;
use crate::infrastructure::cache::{CacheService, NullCache, PgCache};
use crate::infrastructure::crypto::EncryptionService;
use crate::infrastructure::github::{GitHubApi, GitHubClient};
use crate::jobs::GitHubAutomation;
use crate::jobs::import_cleanup::run_import_cleanup;
use crate::jobs::import_worker::{requeue_pending, run_import_worker};
use crate::routes::app_router;
use crate::state::{AppState, Infrastructure, Repositories};

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::{mpsc, watch};

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool
/// - Apply migrations
/// - Response cache (or NullCache when disabled) and idempotency store
/// - GitHub client, JWT validator and token encryption
/// - Background jobs: import worker, import cleanup, GitHub automation,
///   cache, ETag and rate limiter maintenance
/// - Axum HTTP server
///
/// Background jobs are told to stop once the server has drained.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - Signing keys or the encryption key cannot be loaded
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to apply migrations")?;

    let pool = Arc::new(pool);
    let repos = Repositories::postgres(pool.clone());

    let cache: Arc<dyn CacheService> = if config.cache_enabled {
        tracing::info!(ttl_seconds = config.cache_ttl_seconds, "Cache enabled");
        Arc::new(PgCache::new(pool.clone(), config.cache_ttl_seconds))
    } else {
        tracing::info!("Cache disabled (NullCache)");
        Arc::new(NullCache::new())
    };
    let idempotency = Arc::new(PgCache::new(pool.clone(), IDEMPOTENCY_TTL_SECONDS));

    let github: Arc<dyn GitHubApi> = Arc::new(
        GitHubClient::new(&config.github_base_url).context("Failed to build GitHub client")?,
    );
    let encryption = EncryptionService::from_base64_key(&config.encryption_key)
        .context("Invalid ENCRYPTION_KEY")?;
    let jwt = JwtValidator::from_config(&config.auth)
        .await
        .context("Failed to load token signing keys")?;

    let (import_tx, import_rx) = mpsc::channel(config.import_queue_capacity);

    let state = AppState::new(
        &repos,
        Infrastructure {
            cache: cache.clone(),
            idempotency: idempotency.clone(),
            github: github.clone(),
            encryption,
            jwt,
        },
        import_tx,
        &config.public_base_url,
        config.behind_proxy,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    requeue_pending(repos.import_jobs.as_ref(), &state.import_service).await;
    let mut jobs = vec![tokio::spawn(run_import_worker(
        import_rx,
        state.import_service.clone(),
        shutdown_rx.clone(),
    ))];

    jobs.push(tokio::spawn(run_import_cleanup(
        repos.import_jobs.clone(),
        config.import_cleanup_hour_utc,
        config.import_retention_days,
        shutdown_rx.clone(),
    )));

    let automation = Arc::new(GitHubAutomation::new(
        repos.habits.clone(),
        repos.entries.clone(),
        state.github_service.clone(),
        github,
        cache,
    ));
    jobs.push(tokio::spawn(automation.run(
        Duration::from_secs(config.github_scan_interval_minutes * 60),
        shutdown_rx.clone(),
    )));

    jobs.push(tokio::spawn(run_maintenance(
        state.clone(),
        idempotency,
        shutdown_rx,
    )));

    let app = app_router(state, &config.cors_allowed_origins);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped, waiting for background jobs");
    let _ = shutdown_tx.send(true);
    for job in jobs {
        if let Err(e) = job.await {
            tracing::warn!(error = %e, "Background job ended abnormally");
        }
    }

    Ok(())
}

/// Periodically drops idle rate limiter buckets and expired cache rows.
///
/// Expiry is measured against the idempotency TTL, the longest in use, so
/// replayable responses are never purged early.
async fn run_maintenance(
    state: AppState,
    idempotency: Arc<PgCache>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(MAINTENANCE_INTERVAL);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                state.rate_limits.retain_recent();
                let forgotten = state.etags.prune_expired();
                if forgotten > 0 {
                    tracing::debug!(forgotten, "Expired ETags dropped");
                }
                match idempotency.purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!(purged, "Expired cache rows purged"),
                    Err(e) => tracing::warn!(error = %e, "Cache purge failed"),
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
