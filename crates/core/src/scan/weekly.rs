use crate::domain::alert::{AlertEvent, Severity};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const SUMMARY_TITLE: &str = "Weekly Summary";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeeklyMode {
    /// One informational message listing every symbol's week change.
    #[default]
    Summary,
    /// Per-symbol alerts gated by the weekly threshold ladder.
    Threshold,
}

impl FromStr for WeeklyMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summary" => Ok(Self::Summary),
            "threshold" => Ok(Self::Threshold),
            other => anyhow::bail!("WEEKLY_MODE must be `summary` or `threshold` (got {other:?})"),
        }
    }
}

pub fn summary_line(symbol: &str, change_pct: f64) -> String {
    format!("{symbol}: {change_pct:+.2}%")
}

/// `None` when there is nothing to report.
pub fn summary_alert(lines: &[String]) -> Option<AlertEvent> {
    if lines.is_empty() {
        return None;
    }
    Some(AlertEvent::summary(
        SUMMARY_TITLE,
        Severity::Informational,
        lines.join("\n"),
    ))
}
