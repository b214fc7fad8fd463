use anyhow::Context;
use clap::Parser;
use dropwatch_core::config::Settings;
use dropwatch_core::ingest::provider::AlphaVantageClient;
use dropwatch_core::notify::discord::DiscordWebhook;
use dropwatch_core::notify::{LogNotifier, Notifier};
use dropwatch_core::scan::{ScanContext, ScanJob};
use dropwatch_core::schedule::{self, Scheduler, SchedulerOptions};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod health;

#[derive(Debug, Parser)]
#[command(name = "dropwatch_worker")]
struct Args {
    /// Run one scan (daily, weekly or monthly) right now and exit, for externally scheduled hosts.
    #[arg(long)]
    run: Option<String>,

    /// Log alerts instead of posting them to the webhook.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let res = run(settings, args).await;
    if let Err(err) = &res {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "worker failed");
    }
    res
}

async fn run(settings: Settings, args: Args) -> anyhow::Result<()> {
    let job = args
        .run
        .as_deref()
        .map(str::parse::<ScanJob>)
        .transpose()?;

    let ctx = Arc::new(build_context(&settings, args.dry_run)?);
    let shutdown = CancellationToken::new();
    let scheduler = Scheduler::new(
        ctx,
        SchedulerOptions::from_settings(&settings),
        shutdown.clone(),
    );

    if let Some(job) = job {
        let outcome = scheduler
            .run_job(job)
            .await
            .with_context(|| format!("{} scan timed out", job.name()))?;
        tracing::info!(
            job = job.name(),
            with_data = outcome.symbols_with_data,
            alerts_sent = outcome.alerts_sent,
            "one-shot run complete"
        );
        return Ok(());
    }

    let schedules = schedule::schedules_from_settings(&settings)?;
    let listener = health::bind(settings.port).await?;

    tracing::info!(
        symbols = settings.watchlist.len(),
        persistent = settings.persistent,
        dry_run = args.dry_run,
        "worker started"
    );

    let job_handles = scheduler.spawn(schedules);
    let health_handle = tokio::spawn(health::serve(listener, shutdown.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("ctrl-c received; shutting down");
            shutdown.cancel();
        }
        _ = shutdown.cancelled() => {
            tracing::info!("scheduler requested shutdown");
        }
    }

    for handle in job_handles {
        let _ = handle.await;
    }
    match health_handle.await {
        Ok(Err(err)) => tracing::warn!(error = %err, "health endpoint stopped with error"),
        Err(err) => tracing::warn!(error = %err, "health endpoint task panicked"),
        Ok(Ok(())) => {}
    }

    Ok(())
}

fn build_context(settings: &Settings, dry_run: bool) -> anyhow::Result<ScanContext> {
    let provider = Arc::new(AlphaVantageClient::from_settings(settings)?);

    let notifier: Arc<dyn Notifier> = if dry_run {
        Arc::new(LogNotifier)
    } else {
        Arc::new(DiscordWebhook::from_settings(settings)?)
    };

    anyhow::ensure!(!settings.watchlist.is_empty(), "WATCHLIST must contain at least one symbol");

    Ok(ScanContext {
        provider,
        notifier,
        watchlist: settings.watchlist.clone(),
        weekly_mode: settings.weekly_mode,
        market_tz: schedule::parse_tz(&settings.market_tz)?,
        holidays: dropwatch_core::time::us_market::configured_holidays(),
    })
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
