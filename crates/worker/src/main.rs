use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adpulse_core::forecast::ForecastEngine;
use adpulse_core::ingest::{CampaignSource, FileCampaignSource, HttpJsonCampaignSource};
use adpulse_core::storage::{
    AutoSaver, JsonFileBackend, MemoryBackend, SnapshotBackend, SnapshotStore,
};
use adpulse_core::time::reference::resolve_as_of_date;
use adpulse_core::time::{
    Clock, RolloverConfig, RolloverDetector, RolloverLoop, SystemClock, TokioTicker,
};

#[derive(Debug, Parser)]
#[command(name = "adpulse_worker")]
struct Args {
    /// Read campaign rows from a JSON file instead of CAMPAIGN_SOURCE_URL.
    #[arg(long)]
    records_file: Option<PathBuf>,

    /// Store snapshots in this JSON file, ignoring DATABASE_URL.
    #[arg(long)]
    snapshot_file: Option<PathBuf>,

    /// Save today's snapshot once, log the forecast, and exit.
    #[arg(long)]
    once: bool,

    /// Forecast as-of date (YYYY-MM-DD) for --once. Defaults to today in the reference timezone.
    #[arg(long)]
    as_of_date: Option<String>,

    /// Do everything except writing snapshots.
    #[arg(long)]
    dry_run: bool,
}

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

    let args = Args::parse();

    if let Err(err) = run(args, &settings).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %format!("{err:#}"), "worker failed");
        return Err(err);
    }
    Ok(())
}

async fn run(args: Args, settings: &adpulse_core::config::Settings) -> anyhow::Result<()> {
    let tz = settings.reference_timezone()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let backend: Arc<dyn SnapshotBackend> = if args.dry_run {
        Arc::new(MemoryBackend::new())
    } else if let Some(path) = args.snapshot_file.clone() {
        Arc::new(JsonFileBackend::new(path))
    } else {
        adpulse_core::storage::connect_backend(settings).await?
    };

    let source: Arc<dyn CampaignSource> = match args.records_file.clone() {
        Some(path) => Arc::new(
            FileCampaignSource::new(path).with_currency(settings.display_currency.clone()),
        ),
        None => Arc::new(HttpJsonCampaignSource::from_settings(settings)?),
    };

    let store = Arc::new(SnapshotStore::new(backend, tz.clone(), clock.clone()));

    tracing::info!(
        timezone = tz.label(),
        backend = store.backend_name(),
        source = source.source_name(),
        dry_run = args.dry_run,
        "worker starting"
    );

    if args.once {
        let as_of_date = resolve_as_of_date(args.as_of_date.as_deref(), &tz, clock.now())?;
        return run_once(&store, source.as_ref(), settings, as_of_date).await;
    }

    let detector = RolloverDetector::new(tz, RolloverConfig::from_env());
    let mut rollover = RolloverLoop::new(detector, clock, Arc::new(TokioTicker));
    rollover.subscribe(Arc::new(AutoSaver::new(store, source)));

    let handle = rollover.spawn();
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    handle.cancel().await
}

async fn run_once(
    store: &SnapshotStore,
    source: &dyn CampaignSource,
    settings: &adpulse_core::config::Settings,
    as_of_date: chrono::NaiveDate,
) -> anyhow::Result<()> {
    let report = source.fetch_records().await?;
    let completeness = report.completeness();

    let snapshot = store.save(report.records).await?;
    tracing::info!(
        date = %snapshot.date,
        records_len = snapshot.records.len(),
        skipped_rows = report.skipped_rows,
        "snapshot saved"
    );

    let history = store.history().await?;
    let forecast = ForecastEngine::new(settings.forecast_config())
        .compute_forecast(&history, as_of_date)
        .with_data_completeness(completeness);

    tracing::info!(
        %as_of_date,
        realistic_revenue = forecast.scenarios.realistic.revenue,
        confidence = forecast.confidence,
        goal_status = ?forecast.goal_status,
        insights_len = forecast.insights.len(),
        "month-end forecast"
    );
    Ok(())
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
