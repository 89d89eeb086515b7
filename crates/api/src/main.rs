use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adpulse_core::domain::{MetricRecord, MonthlyForecast, Snapshot};
use adpulse_core::forecast::ForecastEngine;
use adpulse_core::ingest::{normalize_rows, RawCampaignRow};
use adpulse_core::storage::{HistoricalEditError, HistoricalEditReason, SnapshotStore};
use adpulse_core::time::{reference::parse_date_key, SystemClock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = adpulse_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let backend = adpulse_core::storage::connect_backend(&settings)
        .await
        .inspect_err(|e| {
            sentry_anyhow::capture_anyhow(e);
        })?;
    let store = SnapshotStore::new(
        backend,
        settings.reference_timezone()?,
        Arc::new(SystemClock),
    );

    let state = AppState {
        store: Arc::new(store),
        engine: Arc::new(ForecastEngine::new(settings.forecast_config())),
        display_currency: settings.display_currency.clone(),
    };

    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/snapshots", get(list_snapshot_dates).post(save_snapshot))
        .route(
            "/snapshots/:date",
            get(get_snapshot_by_date).put(update_historical_snapshot),
        )
        .route("/forecast", get(forecast_from_history).post(forecast_from_rows))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    store: Arc<SnapshotStore>,
    engine: Arc<ForecastEngine>,
    display_currency: String,
}

fn internal_error(err: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = %format!("{err:#}"), "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

fn parse_date(s: &str) -> Result<NaiveDate, StatusCode> {
    parse_date_key(s).map_err(|_| StatusCode::BAD_REQUEST)
}

async fn list_snapshot_dates(
    State(state): State<AppState>,
) -> Result<Json<Vec<NaiveDate>>, StatusCode> {
    let dates = state.store.list_dates().await.map_err(internal_error)?;
    Ok(Json(dates))
}

async fn save_snapshot(
    State(state): State<AppState>,
    Json(records): Json<Vec<MetricRecord>>,
) -> Result<(StatusCode, Json<Snapshot>), StatusCode> {
    let snapshot = state.store.save(records).await.map_err(internal_error)?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn get_snapshot_by_date(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Snapshot>, StatusCode> {
    let date = parse_date(&date)?;
    let snapshot = state
        .store
        .get_by_date(date)
        .await
        .map_err(internal_error)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(snapshot))
}

async fn update_historical_snapshot(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Json(records): Json<Vec<MetricRecord>>,
) -> Result<StatusCode, StatusCode> {
    let date = parse_date(&date)?;
    match state.store.update_historical_snapshot(date, records).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(err) => match err.downcast_ref::<HistoricalEditError>().map(|e| e.reason) {
            Some(HistoricalEditReason::IsToday) => Err(StatusCode::CONFLICT),
            Some(HistoricalEditReason::Missing) => Err(StatusCode::NOT_FOUND),
            None => Err(internal_error(err)),
        },
    }
}

#[derive(Debug, Deserialize)]
struct ForecastQuery {
    as_of: Option<String>,
}

async fn forecast_from_history(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
) -> Result<Json<MonthlyForecast>, StatusCode> {
    let as_of = match query.as_of.as_deref() {
        Some(s) => parse_date(s)?,
        None => state.store.today(),
    };
    let history = state.store.history().await.map_err(internal_error)?;
    Ok(Json(state.engine.compute_forecast(&history, as_of)))
}

#[derive(Debug, Deserialize)]
struct ForecastRequest {
    records: Vec<RawCampaignRow>,
    as_of: Option<NaiveDate>,
}

async fn forecast_from_rows(
    State(state): State<AppState>,
    Json(req): Json<ForecastRequest>,
) -> Json<MonthlyForecast> {
    let report = normalize_rows(&req.records, &state.display_currency);
    let as_of = req.as_of.unwrap_or_else(|| state.store.today());
    let forecast = state
        .engine
        .compute_forecast(&report.records, as_of)
        .with_data_completeness(report.completeness());
    Json(forecast)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &adpulse_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
