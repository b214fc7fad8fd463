use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Weekday};
use std::collections::HashSet;

/// True on weekdays that are neither an NYSE holiday nor an extra configured closure.
pub fn is_trading_day(date: NaiveDate, extra_closures: &HashSet<NaiveDate>) -> bool {
    !is_weekend(date) && !extra_closures.contains(&date) && !is_exchange_holiday(date)
}

/// Trading-day check for "now" expressed in the market's own timezone.
pub fn is_trading_day_at<Tz: TimeZone>(
    now: &DateTime<Tz>,
    extra_closures: &HashSet<NaiveDate>,
) -> bool {
    is_trading_day(now.date_naive(), extra_closures)
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn is_exchange_holiday(date: NaiveDate) -> bool {
    exchange_holidays(date.year()).contains(&date)
}

/// Weekday closures for `year`, with fixed-date holidays moved to the day the exchange observes.
///
/// A fixed holiday on Saturday is observed the Friday before, on Sunday the Monday after. New
/// Year's Day on a Saturday is not observed at all, so the exchange never closes on Dec 31 for it.
fn exchange_holidays(year: i32) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(10);

    if let Some(new_year) = ymd(year, 1, 1) {
        match new_year.weekday() {
            Weekday::Sat => {}
            Weekday::Sun => out.push(new_year + Duration::days(1)),
            _ => out.push(new_year),
        }
    }

    let fixed: &[(u32, u32)] = if year >= 2022 {
        &[(6, 19), (7, 4), (12, 25)]
    } else {
        &[(7, 4), (12, 25)]
    };
    out.extend(fixed.iter().filter_map(|&(m, d)| ymd(year, m, d)).map(observed));

    out.extend(
        [
            nth_weekday(year, 1, Weekday::Mon, 3),  // Martin Luther King Jr. Day
            nth_weekday(year, 2, Weekday::Mon, 3),  // Washington's Birthday
            last_weekday(year, 5, Weekday::Mon),    // Memorial Day
            nth_weekday(year, 9, Weekday::Mon, 1),  // Labor Day
            nth_weekday(year, 11, Weekday::Thu, 4), // Thanksgiving
            easter_sunday(year).map(|d| d - Duration::days(2)),
        ]
        .into_iter()
        .flatten(),
    );

    out
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    nth_weekday(year, month, weekday, 5).or_else(|| nth_weekday(year, month, weekday, 4))
}

// Anonymous Gregorian computus.
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    ymd(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}

/// Ad-hoc closures from `US_MARKET_HOLIDAYS="YYYY-MM-DD,YYYY-MM-DD"` (e.g. a national day of
/// mourning). Regular exchange holidays are computed and need not be listed.
pub fn configured_holidays() -> HashSet<NaiveDate> {
    let extra = std::env::var("US_MARKET_HOLIDAYS").ok();
    parse_closures(extra.as_deref())
}

fn parse_closures(raw: Option<&str>) -> HashSet<NaiveDate> {
    let mut out = HashSet::new();

    let Some(s) = raw else {
        return out;
    };
    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match NaiveDate::parse_from_str(part, "%Y-%m-%d") {
            Ok(d) => {
                out.insert(d);
            }
            Err(err) => {
                tracing::warn!(value = %part, error = %err, "ignoring malformed US_MARKET_HOLIDAYS entry");
            }
        }
    }

    out
}
