//! NFL Schedule Sync Service
//!
//! Polls live scores for the current week and, on request, syncs full
//! schedules from the upstream scoreboard API into Postgres.
//!
//! - Score-only polling every POLL_INTERVAL_SECONDS
//! - Optional full-season sync at startup
//! - Every run bounded by RUN_DEADLINE_SECONDS

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use schedule_sync::cache::CacheStats;
use schedule_sync::client::ScheduleClient;
use schedule_sync::config::Config;
use schedule_sync::http::HttpTransport;
use schedule_sync::lifecycle::LifecycleManager;
use schedule_sync::resolver::{AliasTable, TeamResolver};
use schedule_sync::storage::{GameStore, PgStore};
use schedule_sync::{SyncError, SyncRequest, SyncResult, SyncService, SyncTotals};

type Service = SyncService<HttpTransport, PgStore>;

/// Service health state
#[derive(Clone)]
pub struct HealthState {
    pub last_sync_time: Arc<RwLock<Option<DateTime<Utc>>>>,
    pub last_totals: Arc<RwLock<SyncTotals>>,
    pub error_count: Arc<RwLock<usize>>,
    pub cache: Arc<RwLock<CacheStats>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            last_sync_time: Arc::new(RwLock::new(None)),
            last_totals: Arc::new(RwLock::new(SyncTotals::default())),
            error_count: Arc::new(RwLock::new(0)),
            cache: Arc::new(RwLock::new(CacheStats::default())),
        }
    }

    pub async fn record_success(&self, totals: SyncTotals, cache: CacheStats) {
        *self.last_sync_time.write().await = Some(Utc::now());
        *self.last_totals.write().await = totals;
        *self.error_count.write().await = 0;
        *self.cache.write().await = cache;
    }

    pub async fn record_error(&self) {
        *self.error_count.write().await += 1;
    }
}

/// Health check handler
async fn health_handler(
    axum::extract::State(health): axum::extract::State<HealthState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let last_sync = health.last_sync_time.read().await;
    let last_totals = health.last_totals.read().await;
    let errors = health.error_count.read().await;
    let cache = health.cache.read().await;

    let status = if *errors > 5 { "degraded" } else { "ok" };

    let http_status = if *errors > 10 {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (http_status, Json(json!({
        "service": "schedule-sync",
        "version": env!("CARGO_PKG_VERSION"),
        "status": status,
        "last_sync": last_sync.map(|t| t.to_rfc3339()),
        "last_totals": *last_totals,
        "consecutive_errors": *errors,
        "cache": *cache,
    })))
}

/// Run one sync bounded by the configured deadline and the shutdown token.
async fn run_bounded<F, Fut>(
    service: &Service,
    health: &HealthState,
    shutdown: &CancellationToken,
    deadline: Duration,
    label: &str,
    run: F,
) where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: std::future::Future<Output = SyncResult<SyncTotals>>,
{
    let cancel = shutdown.child_token();
    let timer = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            cancel.cancel();
        })
    };

    let start = std::time::Instant::now();
    match run(cancel).await {
        Ok(totals) => {
            health.record_success(totals, service.client().cache_stats()).await;
            info!(
                "{} completed in {:?}: {} created, {} updated, {} skipped, {} failed week(s)",
                label,
                start.elapsed(),
                totals.created,
                totals.updated,
                totals.skipped,
                totals.failed_weeks
            );
        }
        Err(SyncError::Cancelled) => {
            health.record_error().await;
            warn!("{} cancelled after {:?}", label, start.elapsed());
        }
        Err(e) => {
            health.record_error().await;
            error!("{} failed: {:?}", label, e);
        }
    }
    timer.abort();
}

async fn build_service(config: &Config) -> Result<Service> {
    let store = PgStore::connect_with_retry(&config.database_url, 5).await?;
    store.ensure_schema().await?;

    let aliases = match &config.team_aliases_path {
        Some(path) => AliasTable::load_from(path)?,
        None => AliasTable::bundled()?,
    };
    info!("Loaded {} team code alias(es)", aliases.len());

    let transport = HttpTransport::new(config.http.clone())?;
    let client = ScheduleClient::new(transport, config.retry);

    Ok(SyncService::new(client, store, TeamResolver::new(aliases), config.sync)
        .with_lifecycle(LifecycleManager::new(config.cleanup_interval)))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("schedule_sync=info".parse()?),
        )
        .init();

    info!("NFL Schedule Sync Service v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let service = build_service(&config).await?;
    let service = &service;
    let health = HealthState::new();
    let shutdown = CancellationToken::new();

    // Start health check server
    let app = Router::new()
        .route("/health", get(health_handler))
        .with_state(health.clone());

    let health_addr = format!("0.0.0.0:{}", config.health_port);
    info!("Health endpoint listening on {}", health_addr);

    let listener = tokio::net::TcpListener::bind(&health_addr).await?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Health server stopped: {:?}", e);
        }
    });

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down...");
                shutdown.cancel();
            }
        });
    }

    if config.full_sync_on_start {
        match service.store().get_current_season().await? {
            Some(season) => {
                let request = SyncRequest::season(season.id);
                run_bounded(service, &health, &shutdown, config.run_deadline, "Full season sync", |cancel| {
                    async move { service.update_nfl_games(&request, &cancel).await }
                })
                .await;
            }
            None => warn!("FULL_SYNC_ON_START set but no current season is configured"),
        }
    }

    // Check if running in one-shot mode (manual trigger)
    if config.run_once {
        info!("Running in one-shot mode (RUN_ONCE=true)");
        run_bounded(service, &health, &shutdown, config.run_deadline, "Score sync", |cancel| {
            async move { service.update_game_scores(&cancel).await }
        })
        .await;
        return Ok(());
    }

    info!(
        "Starting score polling loop (poll interval: {}s)",
        config.poll_interval_seconds
    );
    while !shutdown.is_cancelled() {
        run_bounded(service, &health, &shutdown, config.run_deadline, "Score sync", |cancel| {
            async move { service.update_game_scores(&cancel).await }
        })
        .await;

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_secs(config.poll_interval_seconds)) => {}
        }
    }

    Ok(())
}
