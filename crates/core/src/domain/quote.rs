use serde::{Deserialize, Serialize};

use crate::domain::change::{percent_change_from, ChangeError};

/// Ordered, de-duplicated set of ticker symbols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watchlist(Vec<String>);

impl Watchlist {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for s in symbols {
            let symbol = s.as_ref().trim().to_ascii_uppercase();
            if symbol.is_empty() || out.contains(&symbol) {
                continue;
            }
            out.push(symbol);
        }
        Self(out)
    }

    /// Parses a comma separated list, e.g. `"TSLA, aapl,,NVDA"`.
    pub fn parse(s: &str) -> Self {
        Self::new(s.split(','))
    }

    pub fn symbols(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Closing prices picked out of a daily series, most recent first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoints {
    pub latest: f64,
    pub prev_day: Option<f64>,
    /// ~5 trading days before `latest`.
    pub week_ago: Option<f64>,
    /// ~20 trading days before `latest`.
    pub month_ago: Option<f64>,
}

// Offsets into a descending series. Trading-day approximations, not calendar exact.
pub const PREV_DAY_OFFSET: usize = 1;
pub const WEEK_OFFSET: usize = 5;
pub const MONTH_OFFSET: usize = 20;

impl PricePoints {
    /// Builds price points from closes ordered most recent first. `None` entries are closes that
    /// could not be parsed. Returns `None` when there is no usable latest close.
    pub fn from_descending_closes(closes: &[Option<f64>]) -> Option<Self> {
        let at = |idx: usize| closes.get(idx).copied().flatten();
        Some(Self {
            latest: at(0)?,
            prev_day: at(PREV_DAY_OFFSET),
            week_ago: at(WEEK_OFFSET),
            month_ago: at(MONTH_OFFSET),
        })
    }

    pub fn changes(&self) -> ChangeSet {
        ChangeSet {
            day: percent_change_from(self.latest, self.prev_day),
            week: percent_change_from(self.latest, self.week_ago),
            month: percent_change_from(self.latest, self.month_ago),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeSet {
    pub day: Result<f64, ChangeError>,
    pub week: Result<f64, ChangeError>,
    pub month: Result<f64, ChangeError>,
}
