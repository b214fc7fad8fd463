use crate::domain::alert::{AlertEvent, Severity};

/// Drop thresholds in percent (negative numbers). Boundaries are inclusive and the critical tier
/// takes precedence, so a change never matches both tiers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdLadder {
    pub warning: Option<f64>,
    pub critical: Option<f64>,
}

pub const DAILY_LADDER: ThresholdLadder = ThresholdLadder {
    warning: Some(-5.0),
    critical: Some(-10.0),
};

pub const WEEKLY_LADDER: ThresholdLadder = ThresholdLadder {
    warning: None,
    critical: Some(-10.0),
};

pub const MONTHLY_LADDER: ThresholdLadder = ThresholdLadder {
    warning: Some(-10.0),
    critical: Some(-15.0),
};

impl ThresholdLadder {
    /// NaN compares false against every threshold and therefore never classifies.
    pub fn classify(&self, change_pct: f64) -> Option<Severity> {
        if self.critical.is_some_and(|t| change_pct <= t) {
            Some(Severity::Critical)
        } else if self.warning.is_some_and(|t| change_pct <= t) {
            Some(Severity::Warning)
        } else {
            None
        }
    }
}

pub fn drop_alert(
    symbol: &str,
    severity: Severity,
    change_pct: f64,
    latest: f64,
    period: &str,
) -> AlertEvent {
    let message = match severity {
        Severity::Critical => format!(
            "🚨 {symbol} dropped {change_pct:.2}% {period}. Last close {latest:.2}."
        ),
        Severity::Warning => format!(
            "⚠️ {symbol} dropped {change_pct:.2}% {period}. Last close {latest:.2}."
        ),
        Severity::Informational => format!(
            "{symbol} moved {change_pct:.2}% {period}. Last close {latest:.2}."
        ),
    };
    AlertEvent::for_symbol(symbol, severity, message)
}
