pub mod domain;
pub mod ingest;
pub mod notify;
pub mod scan;
pub mod schedule;
pub mod time;

pub mod config {
    use anyhow::Context;

    use crate::domain::quote::Watchlist;
    use crate::scan::weekly::WeeklyMode;

    pub const DEFAULT_WATCHLIST: [&str; 9] = [
        "TSLA", "META", "AAPL", "NVDA", "VOO", "AMZN", "PLTR", "GOOG", "SHOP",
    ];

    const DEFAULT_MARKET_TZ: &str = "America/New_York";
    const DEFAULT_LOCAL_TZ: &str = "America/New_York";
    const DEFAULT_PORT: u16 = 3000;
    const DEFAULT_JOB_TIMEOUT_SECS: u64 = 300;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub alpha_vantage_api_key: Option<String>,
        pub discord_webhook_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub port: u16,
        /// Keep the process alive even when a run finds no data at all.
        pub persistent: bool,
        pub watchlist: Watchlist,
        pub weekly_mode: WeeklyMode,
        pub market_tz: String,
        pub local_tz: String,
        pub daily_cron: Option<String>,
        pub weekly_cron: Option<String>,
        pub monthly_cron: Option<String>,
        pub job_timeout_secs: u64,
        pub allow_overlap: bool,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let watchlist = match std::env::var("WATCHLIST") {
                Ok(s) if !s.trim().is_empty() => Watchlist::parse(&s),
                _ => Watchlist::new(DEFAULT_WATCHLIST),
            };

            let weekly_mode = match std::env::var("WEEKLY_MODE") {
                Ok(s) => s.parse::<WeeklyMode>()?,
                Err(_) => WeeklyMode::default(),
            };

            let port = match std::env::var("PORT") {
                Ok(s) => s
                    .parse::<u16>()
                    .with_context(|| format!("PORT must be a valid port number (got {s})"))?,
                Err(_) => DEFAULT_PORT,
            };

            Ok(Self {
                alpha_vantage_api_key: non_empty_var("ALPHA_KEY"),
                discord_webhook_url: non_empty_var("DISCORD_WEBHOOK"),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
                port,
                persistent: env_flag("PERSISTENT"),
                watchlist,
                weekly_mode,
                market_tz: non_empty_var("MARKET_TZ")
                    .unwrap_or_else(|| DEFAULT_MARKET_TZ.to_string()),
                local_tz: non_empty_var("LOCAL_TZ").unwrap_or_else(|| DEFAULT_LOCAL_TZ.to_string()),
                daily_cron: non_empty_var("DAILY_CRON"),
                weekly_cron: non_empty_var("WEEKLY_CRON"),
                monthly_cron: non_empty_var("MONTHLY_CRON"),
                job_timeout_secs: parse_job_timeout_secs(
                    std::env::var("JOB_TIMEOUT_SECS").ok().as_deref(),
                )?,
                allow_overlap: env_flag("ALLOW_OVERLAP"),
            })
        }

        pub fn require_alpha_vantage_api_key(&self) -> anyhow::Result<&str> {
            self.alpha_vantage_api_key
                .as_deref()
                .context("ALPHA_KEY is required")
        }

        pub fn require_discord_webhook_url(&self) -> anyhow::Result<&str> {
            self.discord_webhook_url
                .as_deref()
                .context("DISCORD_WEBHOOK is required")
        }
    }

    fn parse_job_timeout_secs(raw: Option<&str>) -> anyhow::Result<u64> {
        let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(DEFAULT_JOB_TIMEOUT_SECS);
        };
        let secs = s.parse::<u64>().with_context(|| {
            format!("JOB_TIMEOUT_SECS must be a whole number of seconds (got {s})")
        })?;
        anyhow::ensure!(secs > 0, "JOB_TIMEOUT_SECS must be greater than zero");
        Ok(secs)
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn env_flag(key: &str) -> bool {
        std::env::var(key)
            .map(|s| parse_flag(&s))
            .unwrap_or(false)
    }

    pub(crate) fn parse_flag(s: &str) -> bool {
        matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    }

}
