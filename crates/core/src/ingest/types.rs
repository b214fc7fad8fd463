use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `TIME_SERIES_DAILY` response. Every field is optional: on rate limiting or an unknown symbol
/// the provider answers 200 with only one of the message fields set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailySeriesResponse {
    #[serde(rename = "Time Series (Daily)", default)]
    pub series: Option<BTreeMap<String, DailyBar>>,

    #[serde(rename = "Error Message", default)]
    pub error_message: Option<String>,

    #[serde(rename = "Note", default)]
    pub note: Option<String>,

    #[serde(rename = "Information", default)]
    pub information: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyBar {
    #[serde(rename = "4. close", default)]
    pub close: String,
}

impl DailySeriesResponse {
    /// Whatever explanation the provider gave for omitting the series.
    pub fn provider_message(&self) -> Option<&str> {
        self.error_message
            .as_deref()
            .or(self.note.as_deref())
            .or(self.information.as_deref())
    }

    /// Closing prices ordered most recent first. Unparsable or non-positive closes are `None`.
    pub fn descending_closes(&self) -> Option<Vec<Option<f64>>> {
        let series = self.series.as_ref()?;
        // ISO dates sort lexicographically, so reverse key order is newest first.
        Some(
            series
                .values()
                .rev()
                .map(|bar| parse_close(&bar.close))
                .collect(),
        )
    }
}

fn parse_close(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}
