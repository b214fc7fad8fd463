use std::fmt;

/// Webhook rejected or could not receive a notification.
#[derive(Debug, Clone)]
pub struct DeliveryError {
    pub channel: &'static str,
    pub stage: &'static str,
    pub detail: String,
    pub response_body: Option<String>,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "notification delivery failed (channel={}, stage={}): {}",
            self.channel, self.stage, self.detail
        )
    }
}

impl std::error::Error for DeliveryError {}
