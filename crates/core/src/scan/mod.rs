//! Watchlist scans: fetch each symbol in order, compute the job's change metric, and alert on
//! threshold crossings (or, for the weekly summary, roll everything into one message).

use crate::domain::alert::AlertEvent;
use crate::domain::change::ChangeError;
use crate::domain::quote::{PricePoints, Watchlist};
use crate::ingest::provider::{fetch_or_absent, QuoteProvider};
use crate::notify::Notifier;
use crate::time::us_market;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

pub mod exit;
pub mod policy;
pub mod weekly;

use policy::ThresholdLadder;
use weekly::WeeklyMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanJob {
    Daily,
    Weekly,
    Monthly,
}

impl ScanJob {
    pub const ALL: [ScanJob; 3] = [Self::Daily, Self::Weekly, Self::Monthly];

    pub fn name(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    fn period(self) -> &'static str {
        match self {
            Self::Daily => "today",
            Self::Weekly => "this week",
            Self::Monthly => "this month",
        }
    }

    fn ladder(self) -> ThresholdLadder {
        match self {
            Self::Daily => policy::DAILY_LADDER,
            Self::Weekly => policy::WEEKLY_LADDER,
            Self::Monthly => policy::MONTHLY_LADDER,
        }
    }

    fn metric(self, points: &PricePoints) -> Result<f64, ChangeError> {
        let changes = points.changes();
        match self {
            Self::Daily => changes.day,
            Self::Weekly => changes.week,
            Self::Monthly => changes.month,
        }
    }

    /// Runs one pass over the watchlist under a fresh `run_id` span.
    pub async fn run(self, ctx: &ScanContext, cancel: &CancellationToken) -> ScanOutcome {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("scan", job = self.name(), %run_id);
        self.run_at(ctx, cancel, Utc::now()).instrument(span).await
    }

    pub async fn run_at(
        self,
        ctx: &ScanContext,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> ScanOutcome {
        let mut outcome = ScanOutcome::new(self);

        if self == Self::Daily {
            let market_now = now.with_timezone(&ctx.market_tz);
            if !us_market::is_trading_day_at(&market_now, &ctx.holidays) {
                tracing::info!(market_date = %market_now.date_naive(), "market closed today; skipping daily scan");
                outcome.skipped = true;
                return outcome;
            }
        }

        let summarize = self == Self::Weekly && ctx.weekly_mode == WeeklyMode::Summary;
        let ladder = self.ladder();
        let mut summary_lines: Vec<String> = Vec::new();

        tracing::info!(symbols = ctx.watchlist.len(), "scan started");

        for symbol in ctx.watchlist.iter() {
            if cancel.is_cancelled() {
                tracing::info!(%symbol, "scan cancelled before symbol");
                outcome.cancelled = true;
                break;
            }
            outcome.symbols_scanned += 1;

            let Some(points) = fetch_or_absent(ctx.provider.as_ref(), symbol).await else {
                continue;
            };
            outcome.symbols_with_data += 1;

            let change = match self.metric(&points) {
                Ok(c) => c,
                Err(err) => {
                    outcome.metric_failures += 1;
                    tracing::warn!(%symbol, error = %err, "could not compute change; skipping metric");
                    continue;
                }
            };

            tracing::debug!(%symbol, change_pct = change, latest = points.latest, "computed change");

            if summarize {
                summary_lines.push(weekly::summary_line(symbol, change));
                continue;
            }

            if let Some(severity) = ladder.classify(change) {
                let alert = policy::drop_alert(symbol, severity, change, points.latest, self.period());
                ctx.deliver(&alert, &mut outcome).await;
            }
        }

        if summarize && !outcome.cancelled {
            if let Some(alert) = weekly::summary_alert(&summary_lines) {
                ctx.deliver(&alert, &mut outcome).await;
            }
        }

        tracing::info!(
            scanned = outcome.symbols_scanned,
            with_data = outcome.symbols_with_data,
            alerts_sent = outcome.alerts_sent,
            alerts_failed = outcome.alerts_failed,
            metric_failures = outcome.metric_failures,
            cancelled = outcome.cancelled,
            "scan finished"
        );

        if outcome.all_absent() {
            tracing::warn!("no symbol returned data");
        }

        outcome
    }
}

impl FromStr for ScanJob {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => anyhow::bail!("unknown scan job {other:?} (expected daily, weekly or monthly)"),
        }
    }
}

/// Everything a scan needs. Built once at startup and shared by every run.
pub struct ScanContext {
    pub provider: Arc<dyn QuoteProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub watchlist: Watchlist,
    pub weekly_mode: WeeklyMode,
    pub market_tz: Tz,
    /// Extra closures on top of the computed exchange calendar.
    pub holidays: HashSet<NaiveDate>,
}

impl ScanContext {
    async fn deliver(&self, alert: &AlertEvent, outcome: &mut ScanOutcome) {
        match self.notifier.notify(alert).await {
            Ok(()) => outcome.alerts_sent += 1,
            Err(err) => {
                outcome.alerts_failed += 1;
                tracing::warn!(
                    subject = %alert.subject,
                    channel = self.notifier.channel(),
                    error = %format!("{err:#}"),
                    "alert delivery failed; dropping alert"
                );
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanOutcome {
    pub job: ScanJob,
    pub symbols_scanned: usize,
    pub symbols_with_data: usize,
    pub alerts_sent: usize,
    pub alerts_failed: usize,
    pub metric_failures: usize,
    pub cancelled: bool,
    /// Run was skipped entirely (market holiday).
    pub skipped: bool,
}

impl ScanOutcome {
    pub fn new(job: ScanJob) -> Self {
        Self {
            job,
            symbols_scanned: 0,
            symbols_with_data: 0,
            alerts_sent: 0,
            alerts_failed: 0,
            metric_failures: 0,
            cancelled: false,
            skipped: false,
        }
    }

    /// A complete pass where not a single symbol returned data.
    pub fn all_absent(&self) -> bool {
        !self.cancelled && !self.skipped && self.symbols_scanned > 0 && self.symbols_with_data == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::Severity;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;

    enum FakeQuote {
        Points(PricePoints),
        Absent,
        Error,
    }

    struct FakeProvider {
        quotes: HashMap<String, FakeQuote>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        fn new(quotes: Vec<(&str, FakeQuote)>) -> Self {
            Self {
                quotes: quotes
                    .into_iter()
                    .map(|(s, q)| (s.to_string(), q))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl QuoteProvider for FakeProvider {
        fn provider_name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_price_points(&self, symbol: &str) -> anyhow::Result<Option<PricePoints>> {
            self.calls.lock().unwrap().push(symbol.to_string());
            match self.quotes.get(symbol) {
                Some(FakeQuote::Points(p)) => Ok(Some(*p)),
                Some(FakeQuote::Error) => anyhow::bail!("connection reset"),
                Some(FakeQuote::Absent) | None => Ok(None),
            }
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        fail_subjects: HashSet<String>,
        attempts: Mutex<Vec<AlertEvent>>,
    }

    #[async_trait::async_trait]
    impl Notifier for FakeNotifier {
        fn channel(&self) -> &'static str {
            "fake"
        }

        async fn notify(&self, alert: &AlertEvent) -> anyhow::Result<()> {
            self.attempts.lock().unwrap().push(alert.clone());
            if self.fail_subjects.contains(&alert.subject) {
                anyhow::bail!("webhook returned 500");
            }
            Ok(())
        }
    }

    fn points(latest: f64, prev_day: f64) -> PricePoints {
        PricePoints {
            latest,
            prev_day: Some(prev_day),
            week_ago: Some(prev_day),
            month_ago: Some(prev_day),
        }
    }

    fn ctx(
        provider: Arc<FakeProvider>,
        notifier: Arc<FakeNotifier>,
        symbols: &[&str],
    ) -> ScanContext {
        ScanContext {
            provider,
            notifier,
            watchlist: Watchlist::new(symbols.iter().copied()),
            weekly_mode: WeeklyMode::Summary,
            market_tz: chrono_tz::America::New_York,
            holidays: HashSet::new(),
        }
    }

    // Wednesday afternoon in New York.
    fn weekday_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 7, 21, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn daily_tiers_are_mutually_exclusive() {
        let provider = Arc::new(FakeProvider::new(vec![
            ("CRIT", FakeQuote::Points(points(90.0, 100.0))),
            ("FLAT", FakeQuote::Points(points(96.0, 100.0))),
            ("WARN", FakeQuote::Points(points(95.0, 100.0))),
        ]));
        let notifier = Arc::new(FakeNotifier::default());
        let ctx = ctx(provider, notifier.clone(), &["CRIT", "FLAT", "WARN"]);

        let outcome = ScanJob::Daily
            .run_at(&ctx, &CancellationToken::new(), weekday_now())
            .await;

        let sent = notifier.attempts.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, "CRIT");
        assert_eq!(sent[0].severity, Severity::Critical);
        assert!(sent[0].message.contains("-10.00%"));
        assert_eq!(sent[1].subject, "WARN");
        assert_eq!(sent[1].severity, Severity::Warning);
        assert_eq!(outcome.alerts_sent, 2);
        assert_eq!(outcome.symbols_with_data, 3);
    }

    #[tokio::test]
    async fn absent_and_failing_symbols_are_skipped_in_order() {
        let provider = Arc::new(FakeProvider::new(vec![
            ("A", FakeQuote::Absent),
            ("B", FakeQuote::Error),
            ("C", FakeQuote::Points(points(80.0, 100.0))),
        ]));
        let notifier = Arc::new(FakeNotifier::default());
        let ctx = ctx(provider.clone(), notifier.clone(), &["A", "B", "C"]);

        let outcome = ScanJob::Daily
            .run_at(&ctx, &CancellationToken::new(), weekday_now())
            .await;

        assert_eq!(*provider.calls.lock().unwrap(), ["A", "B", "C"]);
        let sent = notifier.attempts.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "C");
        assert_eq!(outcome.symbols_scanned, 3);
        assert_eq!(outcome.symbols_with_data, 1);
        assert!(!outcome.all_absent());
    }

    #[tokio::test]
    async fn delivery_failure_does_not_stop_later_alerts() {
        let provider = Arc::new(FakeProvider::new(vec![
            ("A", FakeQuote::Points(points(50.0, 100.0))),
            ("B", FakeQuote::Points(points(50.0, 100.0))),
        ]));
        let notifier = Arc::new(FakeNotifier {
            fail_subjects: HashSet::from(["A".to_string()]),
            ..Default::default()
        });
        let ctx = ctx(provider, notifier.clone(), &["A", "B"]);

        let outcome = ScanJob::Daily
            .run_at(&ctx, &CancellationToken::new(), weekday_now())
            .await;

        let subjects: Vec<String> = notifier
            .attempts
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.subject.clone())
            .collect();
        assert_eq!(subjects, ["A", "B"]);
        assert_eq!(outcome.alerts_failed, 1);
        assert_eq!(outcome.alerts_sent, 1);
    }

    #[tokio::test]
    async fn all_absent_batch_is_reported() {
        let provider = Arc::new(FakeProvider::new(vec![]));
        let notifier = Arc::new(FakeNotifier::default());
        let ctx = ctx(provider, notifier.clone(), &["A", "B", "C"]);

        let outcome = ScanJob::Monthly
            .run_at(&ctx, &CancellationToken::new(), weekday_now())
            .await;

        assert!(outcome.all_absent());
        assert!(notifier.attempts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn weekly_summary_lists_symbols_with_data_in_order() {
        let provider = Arc::new(FakeProvider::new(vec![
            (
                "TSLA",
                FakeQuote::Points(PricePoints {
                    latest: 110.0,
                    prev_day: Some(100.0),
                    week_ago: Some(100.0),
                    month_ago: None,
                }),
            ),
            ("META", FakeQuote::Absent),
            (
                "AAPL",
                FakeQuote::Points(PricePoints {
                    latest: 97.0,
                    prev_day: Some(100.0),
                    week_ago: Some(100.0),
                    month_ago: None,
                }),
            ),
        ]));
        let notifier = Arc::new(FakeNotifier::default());
        let ctx = ctx(provider, notifier.clone(), &["TSLA", "META", "AAPL"]);

        let outcome = ScanJob::Weekly
            .run_at(&ctx, &CancellationToken::new(), weekday_now())
            .await;

        let sent = notifier.attempts.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, weekly::SUMMARY_TITLE);
        assert_eq!(sent[0].severity, Severity::Informational);
        assert_eq!(sent[0].message, "TSLA: +10.00%\nAAPL: -3.00%");
        assert_eq!(outcome.alerts_sent, 1);
    }

    #[tokio::test]
    async fn weekly_threshold_mode_alerts_per_symbol() {
        let provider = Arc::new(FakeProvider::new(vec![
            ("A", FakeQuote::Points(points(89.0, 100.0))),
            ("B", FakeQuote::Points(points(95.0, 100.0))),
        ]));
        let notifier = Arc::new(FakeNotifier::default());
        let mut ctx = ctx(provider, notifier.clone(), &["A", "B"]);
        ctx.weekly_mode = WeeklyMode::Threshold;

        ScanJob::Weekly
            .run_at(&ctx, &CancellationToken::new(), weekday_now())
            .await;

        let sent = notifier.attempts.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "A");
        assert_eq!(sent[0].severity, Severity::Critical);
        assert!(sent[0].message.contains("this week"));
    }

    #[tokio::test]
    async fn metric_failure_is_counted_not_alerted() {
        let provider = Arc::new(FakeProvider::new(vec![(
            "SHORT",
            FakeQuote::Points(PricePoints {
                latest: 10.0,
                prev_day: Some(20.0),
                week_ago: None,
                month_ago: None,
            }),
        )]));
        let notifier = Arc::new(FakeNotifier::default());
        let ctx = ctx(provider, notifier.clone(), &["SHORT"]);

        let outcome = ScanJob::Monthly
            .run_at(&ctx, &CancellationToken::new(), weekday_now())
            .await;

        assert_eq!(outcome.metric_failures, 1);
        assert_eq!(outcome.symbols_with_data, 1);
        assert!(notifier.attempts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn daily_scan_skips_weekends() {
        let provider = Arc::new(FakeProvider::new(vec![(
            "A",
            FakeQuote::Points(points(50.0, 100.0)),
        )]));
        let notifier = Arc::new(FakeNotifier::default());
        let ctx = ctx(provider.clone(), notifier.clone(), &["A"]);

        // Saturday noon in New York.
        let saturday = Utc.with_ymd_and_hms(2026, 1, 10, 17, 0, 0).unwrap();
        let outcome = ScanJob::Daily
            .run_at(&ctx, &CancellationToken::new(), saturday)
            .await;

        assert!(outcome.skipped);
        assert!(!outcome.all_absent());
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn daily_scan_skips_observed_exchange_holiday() {
        let provider = Arc::new(FakeProvider::new(vec![(
            "A",
            FakeQuote::Points(points(50.0, 100.0)),
        )]));
        let notifier = Arc::new(FakeNotifier::default());
        let ctx = ctx(provider.clone(), notifier.clone(), &["A"]);

        // Friday 2026-07-03, the observed Independence Day, after the close in New York.
        let observed = Utc.with_ymd_and_hms(2026, 7, 3, 20, 30, 0).unwrap();
        let outcome = ScanJob::Daily
            .run_at(&ctx, &CancellationToken::new(), observed)
            .await;

        assert!(outcome.skipped);
        assert!(provider.calls.lock().unwrap().is_empty());
        assert!(notifier.attempts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_scan_stops_at_symbol_boundary() {
        let provider = Arc::new(FakeProvider::new(vec![]));
        let notifier = Arc::new(FakeNotifier::default());
        let ctx = ctx(provider.clone(), notifier, &["A", "B"]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = ScanJob::Monthly.run_at(&ctx, &cancel, weekday_now()).await;

        assert!(outcome.cancelled);
        assert_eq!(outcome.symbols_scanned, 0);
        assert!(!outcome.all_absent());
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn parses_job_names() {
        assert_eq!("Daily".parse::<ScanJob>().unwrap(), ScanJob::Daily);
        assert_eq!("monthly".parse::<ScanJob>().unwrap(), ScanJob::Monthly);
        assert!("hourly".parse::<ScanJob>().is_err());
    }
}
