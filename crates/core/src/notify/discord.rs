use crate::config::Settings;
use crate::domain::alert::AlertEvent;
use crate::notify::error::DeliveryError;
use crate::notify::Notifier;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

const DEFAULT_USERNAME: &str = "📉 Stock Alert Bot";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    http: reqwest::Client,
    webhook_url: String,
    username: String,
}

impl DiscordWebhook {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let webhook_url = settings.require_discord_webhook_url()?.to_string();
        let username = std::env::var("NOTIFY_USERNAME")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USERNAME.to_string());

        let timeout_secs = std::env::var("NOTIFY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(webhook_url, username, Duration::from_secs(timeout_secs))
    }

    pub fn new(
        webhook_url: impl Into<String>,
        username: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build webhook http client")?;

        Ok(Self {
            http,
            webhook_url: webhook_url.into(),
            username: username.into(),
        })
    }

    fn payload<'a>(&'a self, alert: &'a AlertEvent) -> WebhookPayload<'a> {
        WebhookPayload {
            username: &self.username,
            embeds: vec![Embed {
                title: &alert.title,
                description: &alert.message,
                color: alert.color(),
                timestamp: alert.timestamp,
            }],
        }
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordWebhook {
    fn channel(&self) -> &'static str {
        "discord"
    }

    async fn notify(&self, alert: &AlertEvent) -> anyhow::Result<()> {
        let res = self
            .http
            .post(&self.webhook_url)
            .json(&self.payload(alert))
            .send()
            .await
            .map_err(|err| DeliveryError {
                channel: self.channel(),
                stage: "http",
                detail: err.without_url().to_string(),
                response_body: None,
            })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.ok();
            return Err(DeliveryError {
                channel: self.channel(),
                stage: "status",
                detail: format!("status={status}"),
                response_body: body,
            }
            .into());
        }

        tracing::info!(
            subject = %alert.subject,
            severity = alert.severity.as_str(),
            "sent alert"
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    username: &'a str,
    embeds: Vec<Embed<'a>>,
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
    title: &'a str,
    description: &'a str,
    color: u32,
    timestamp: DateTime<Utc>,
}
