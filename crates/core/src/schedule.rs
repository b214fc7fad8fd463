//! Cron-driven firing of scan jobs.
//!
//! Each job gets its own tokio task that sleeps until the next cron occurrence (evaluated in the
//! job's IANA timezone) and then spawns a run. Runs are bounded by a total timeout. Unless overlap
//! is allowed, a fire is skipped while the previous run of the same job is still going.

use crate::config::Settings;
use crate::scan::exit::HostingMode;
use crate::scan::{ScanContext, ScanJob, ScanOutcome};
use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_DAILY_CRON: &str = "0 30 16 * * Mon-Fri";
pub const DEFAULT_WEEKLY_CRON: &str = "0 0 18 * * Fri";
pub const DEFAULT_MONTHLY_CRON: &str = "0 0 9 1 * *";

pub fn parse_tz(name: &str) -> anyhow::Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("invalid IANA timezone {name:?}: {e}"))
}

#[derive(Debug, Clone)]
pub struct JobSchedule {
    pub job: ScanJob,
    pub expression: String,
    pub tz: Tz,
    schedule: Schedule,
}

impl JobSchedule {
    pub fn parse(job: ScanJob, expression: &str, tz: Tz) -> anyhow::Result<Self> {
        let schedule = Schedule::from_str(expression)
            .with_context(|| format!("invalid {} cron expression: {expression}", job.name()))?;
        Ok(Self {
            job,
            expression: expression.to_string(),
            tz,
            schedule,
        })
    }

    /// Next fire strictly after `now`, evaluated in the job's timezone.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&now.with_timezone(&self.tz))
            .next()
            .map(|t| t.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    pub job_timeout: Duration,
    pub allow_overlap: bool,
    pub hosting: HostingMode,
}

impl SchedulerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            job_timeout: Duration::from_secs(settings.job_timeout_secs),
            allow_overlap: settings.allow_overlap,
            hosting: HostingMode::from_persistent(settings.persistent),
        }
    }
}

/// Canonical schedules: daily after the close in the market timezone, weekly and monthly in the
/// local timezone.
pub fn schedules_from_settings(settings: &Settings) -> anyhow::Result<Vec<JobSchedule>> {
    let market_tz = parse_tz(&settings.market_tz)?;
    let local_tz = parse_tz(&settings.local_tz)?;

    Ok(vec![
        JobSchedule::parse(
            ScanJob::Daily,
            settings.daily_cron.as_deref().unwrap_or(DEFAULT_DAILY_CRON),
            market_tz,
        )?,
        JobSchedule::parse(
            ScanJob::Weekly,
            settings.weekly_cron.as_deref().unwrap_or(DEFAULT_WEEKLY_CRON),
            local_tz,
        )?,
        JobSchedule::parse(
            ScanJob::Monthly,
            settings.monthly_cron.as_deref().unwrap_or(DEFAULT_MONTHLY_CRON),
            local_tz,
        )?,
    ])
}

pub struct Scheduler {
    ctx: Arc<ScanContext>,
    options: SchedulerOptions,
    shutdown: CancellationToken,
}

enum RunSlot {
    Exclusive(OwnedMutexGuard<()>),
    Shared,
    Busy,
}

fn acquire_run_slot(guard: &Arc<Mutex<()>>, allow_overlap: bool) -> RunSlot {
    if allow_overlap {
        return RunSlot::Shared;
    }
    match guard.clone().try_lock_owned() {
        Ok(permit) => RunSlot::Exclusive(permit),
        Err(_) => RunSlot::Busy,
    }
}

impl Scheduler {
    /// `shutdown` is cancelled by the caller to stop, and by the scheduler itself when the
    /// hosting mode asks the process to exit.
    pub fn new(ctx: Arc<ScanContext>, options: SchedulerOptions, shutdown: CancellationToken) -> Self {
        Self {
            ctx,
            options,
            shutdown,
        }
    }

    /// Starts one task per schedule and returns their handles.
    pub fn spawn(self, schedules: Vec<JobSchedule>) -> Vec<JoinHandle<()>> {
        let this = Arc::new(self);
        schedules
            .into_iter()
            .map(|schedule| {
                let this = this.clone();
                tokio::spawn(async move { this.job_loop(schedule).await })
            })
            .collect()
    }

    async fn job_loop(self: Arc<Self>, schedule: JobSchedule) {
        let guard = Arc::new(Mutex::new(()));
        tracing::info!(
            job = schedule.job.name(),
            cron = %schedule.expression,
            tz = ?schedule.tz,
            "job scheduled"
        );

        loop {
            let now = Utc::now();
            let Some(next) = schedule.next_after(now) else {
                tracing::warn!(job = schedule.job.name(), "cron expression has no future fire; stopping job");
                return;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::debug!(job = schedule.job.name(), %next, "next fire");

            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = tokio::time::sleep(wait) => {}
            }

            let permit = match acquire_run_slot(&guard, self.options.allow_overlap) {
                RunSlot::Busy => {
                    tracing::warn!(job = schedule.job.name(), "previous run still in progress; skipping fire");
                    continue;
                }
                RunSlot::Exclusive(permit) => Some(permit),
                RunSlot::Shared => None,
            };

            let this = self.clone();
            let job = schedule.job;
            tokio::spawn(async move {
                let _permit = permit;
                this.run_job(job).await;
            });
        }
    }

    /// Runs `job` once under the total-job timeout and applies the hosting exit policy.
    /// `None` when the run timed out.
    pub async fn run_job(&self, job: ScanJob) -> Option<ScanOutcome> {
        let cancel = self.shutdown.child_token();
        let res = tokio::time::timeout(self.options.job_timeout, job.run(&self.ctx, &cancel)).await;

        let outcome = match res {
            Ok(outcome) => outcome,
            Err(_) => {
                // Error-level events are forwarded to Sentry by the tracing layer.
                tracing::error!(
                    job = job.name(),
                    timeout_secs = self.options.job_timeout.as_secs(),
                    "scan timed out"
                );
                return None;
            }
        };

        if self.options.hosting.should_terminate(&outcome) {
            tracing::warn!(
                job = job.name(),
                "no data for any symbol in one-shot hosting mode; shutting down"
            );
            self.shutdown.cancel();
        }

        Some(outcome)
    }
}
