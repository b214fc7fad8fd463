use crate::domain::alert::AlertEvent;

pub mod discord;
pub mod error;

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> &'static str;

    async fn notify(&self, alert: &AlertEvent) -> anyhow::Result<()>;
}

/// Writes alerts to the log instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    fn channel(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, alert: &AlertEvent) -> anyhow::Result<()> {
        tracing::info!(
            subject = %alert.subject,
            severity = alert.severity.as_str(),
            title = %alert.title,
            message = %alert.message,
            "dry-run alert"
        );
        Ok(())
    }
}
