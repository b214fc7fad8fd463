use crate::config::Settings;
use crate::domain::quote::PricePoints;
use crate::ingest::types::DailySeriesResponse;
use anyhow::{Context, Result};
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const SERIES_FUNCTION: &str = "TIME_SERIES_DAILY";

#[async_trait::async_trait]
pub trait QuoteProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// `Ok(None)` means the provider answered but had no series for `symbol`.
    async fn fetch_price_points(&self, symbol: &str) -> Result<Option<PricePoints>>;
}

/// Fetches and degrades any failure to "no data", logging why.
pub async fn fetch_or_absent(provider: &dyn QuoteProvider, symbol: &str) -> Option<PricePoints> {
    match provider.fetch_price_points(symbol).await {
        Ok(Some(points)) => Some(points),
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(
                %symbol,
                provider = provider.provider_name(),
                error = %format!("{err:#}"),
                "quote fetch failed; skipping symbol"
            );
            None
        }
    }
}

#[derive(Debug)]
pub struct AlphaVantageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    req_delay: Duration,
    last_request: tokio::sync::Mutex<Option<Instant>>,
}

impl AlphaVantageClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_alpha_vantage_api_key()?.to_string();
        let base_url =
            std::env::var("ALPHA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("QUOTE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let req_delay_ms = std::env::var("QUOTE_REQ_DELAY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        Self::new(
            base_url,
            api_key,
            Duration::from_secs(timeout_secs),
            Duration::from_millis(req_delay_ms),
        )
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        req_delay: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build quote provider http client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            req_delay,
            last_request: tokio::sync::Mutex::new(None),
        })
    }

    fn url(&self) -> String {
        format!("{}/query", self.base_url.trim_end_matches('/'))
    }

    // Spaces requests out by `req_delay` so free-tier keys stay under the per-minute cap.
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.req_delay {
                tokio::time::sleep(self.req_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn fetch_series(&self, symbol: &str) -> Result<DailySeriesResponse> {
        self.pace().await;

        let res = self
            .http
            .get(self.url())
            .query(&[
                ("function", SERIES_FUNCTION),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("quote provider request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(reqwest::Error::without_url)
            .context("failed to read quote provider response")?;

        if !status.is_success() {
            anyhow::bail!("quote provider HTTP {status}: {text}");
        }

        serde_json::from_str::<DailySeriesResponse>(&text)
            .with_context(|| format!("quote provider response is not a daily series: {text}"))
    }
}

#[async_trait::async_trait]
impl QuoteProvider for AlphaVantageClient {
    fn provider_name(&self) -> &'static str {
        "alphavantage"
    }

    async fn fetch_price_points(&self, symbol: &str) -> Result<Option<PricePoints>> {
        anyhow::ensure!(!symbol.trim().is_empty(), "symbol must be non-empty");

        let resp = self.fetch_series(symbol).await?;

        let Some(closes) = resp.descending_closes() else {
            tracing::warn!(
                %symbol,
                provider_message = resp.provider_message().unwrap_or("<none>"),
                "no daily series in provider response"
            );
            return Ok(None);
        };

        let points = PricePoints::from_descending_closes(&closes);
        if points.is_none() {
            tracing::warn!(%symbol, bars = closes.len(), "daily series has no usable latest close");
        } else if closes.len() <= crate::domain::quote::MONTH_OFFSET {
            tracing::debug!(%symbol, bars = closes.len(), "short daily series; some look-backs unavailable");
        }
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> AlphaVantageClient {
        AlphaVantageClient::new(
            server.uri(),
            "test-key",
            Duration::from_secs(5),
            Duration::ZERO,
        )
        .unwrap()
    }

    fn series_json(closes_newest_first: &[&str]) -> serde_json::Value {
        let start = chrono::NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        let mut series = serde_json::Map::new();
        for (i, close) in closes_newest_first.iter().enumerate() {
            let date = start - chrono::Duration::days(i as i64);
            series.insert(
                date.format("%Y-%m-%d").to_string(),
                json!({"1. open": "1.0", "4. close": close}),
            );
        }
        json!({"Time Series (Daily)": series})
    }

    #[tokio::test]
    async fn extracts_price_points_from_series() {
        let server = MockServer::start().await;
        let closes: Vec<String> = (0..25).map(|i| format!("{}.00", 100 + i)).collect();
        let closes: Vec<&str> = closes.iter().map(String::as_str).collect();

        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("function", "TIME_SERIES_DAILY"))
            .and(query_param("symbol", "TSLA"))
            .and(query_param("apikey", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(series_json(&closes)))
            .mount(&server)
            .await;

        let points = client(&server)
            .fetch_price_points("TSLA")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(points.latest, 100.0);
        assert_eq!(points.prev_day, Some(101.0));
        assert_eq!(points.week_ago, Some(105.0));
        assert_eq!(points.month_ago, Some(120.0));
    }

    #[tokio::test]
    async fn missing_series_key_is_absent_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"Error Message": "Invalid API call."})),
            )
            .mount(&server)
            .await;

        let res = client(&server).fetch_price_points("NOPE").await.unwrap();
        assert!(res.is_none());
    }

    #[tokio::test]
    async fn http_error_degrades_to_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let c = client(&server);
        assert!(c.fetch_price_points("TSLA").await.is_err());
        assert!(fetch_or_absent(&c, "TSLA").await.is_none());
    }

    #[tokio::test]
    async fn malformed_body_degrades_to_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        assert!(fetch_or_absent(&client(&server), "TSLA").await.is_none());
    }

    #[tokio::test]
    async fn connect_error_does_not_include_api_key() {
        // Nothing listens on port 1.
        let c = AlphaVantageClient::new(
            "http://127.0.0.1:1",
            "SECRET-KEY-123",
            Duration::from_secs(2),
            Duration::ZERO,
        )
        .unwrap();

        let err = c.fetch_price_points("TSLA").await.unwrap_err();
        let rendered = format!("{err:#}");
        assert!(rendered.contains("quote provider request failed"), "{rendered}");
        assert!(!rendered.contains("SECRET-KEY-123"), "{rendered}");
        assert!(!rendered.contains("apikey"), "{rendered}");
    }
}
