use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Informational,
    Warning,
    Critical,
}

impl Severity {
    /// Embed colour as a 24-bit RGB integer.
    pub fn color(self) -> u32 {
        match self {
            Self::Critical => 0xFF0000,
            Self::Warning => 0xFFA500,
            Self::Informational => 0x3498DB,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Informational => "informational",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Symbol the alert is about, or a label such as `"Weekly Summary"`.
    pub subject: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl AlertEvent {
    pub fn for_symbol(symbol: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            subject: symbol.to_string(),
            severity,
            title: format!("{symbol} Alert"),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn summary(title: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            subject: title.to_string(),
            severity,
            title: title.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn color(&self) -> u32 {
        self.severity.color()
    }
}
