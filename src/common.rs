/// Calendar-period and financial-figure helpers shared across services
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Canonical key for a daily period: `YYYY-MM-DD`
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Canonical key for a weekly period: `YYYY-Www` (ISO week)
pub fn week_key(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}

/// Canonical key for a monthly period: `YYYY-MM`
pub fn month_key(date: NaiveDate) -> String {
    format!("{}-{:02}", date.year(), date.month())
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).unwrap().and_utc()
}

/// Half-open `[start, end)` bounds of the calendar day
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    (start_of_day(date), start_of_day(date + Duration::days(1)))
}

/// Half-open `[start, end)` bounds of the ISO week containing `date`
pub fn week_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    (start_of_day(monday), start_of_day(monday + Duration::days(7)))
}

/// Half-open `[start, end)` bounds of the calendar month containing `date`
pub fn month_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let first = date.with_day(1).unwrap();
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1).unwrap()
    };
    (start_of_day(first), start_of_day(next))
}

/// First day of the same calendar month one year earlier
pub fn same_month_year_earlier(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year() - 1, date.month(), 1).unwrap()
}

/// Operating margin as a percentage, 0 when there is no income
pub fn margin_pct(income: Decimal, expense: Decimal) -> Decimal {
    if income > Decimal::ZERO {
        ((income - expense) / income * dec!(100)).round_dp(2)
    } else {
        Decimal::ZERO
    }
}

/// Percentage delta vs. a prior-period baseline; None when the baseline
/// is missing or non-positive (no meaningful comparison exists)
pub fn trend_pct(current: Decimal, baseline: Decimal) -> Option<Decimal> {
    if baseline <= Decimal::ZERO {
        return None;
    }
    Some(((current - baseline) / baseline * dec!(100)).round_dp(2))
}
