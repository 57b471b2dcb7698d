//! Temporal predicates.
//!
//! Inputs are millisecond epochs truncated to seconds. Relative windows
//! (`today`, `this_week`, ...) derive their boundaries from the current UTC
//! wall clock and then shift by the account's timezone offset; every window
//! is inclusive on both ends at one-second resolution. Weeks start on
//! Monday 00:00. Month windows close at 00:00 of the month's last day.

use chrono::{DateTime, Datelike, NaiveTime, Utc};

use crate::business_hours::{during_business_hour, tz_offset_secs, weekday_name};
use crate::condition::DatetimeCondition;
use crate::model::Account;

const DAY: i64 = 86400;
const WEEK: i64 = 604800;

fn day_start(now: DateTime<Utc>) -> i64 {
    now.date_naive().and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// (first day 00:00, last day 00:00) of the current month.
fn month_window(now: DateTime<Utc>) -> (i64, i64) {
    let d = now.date_naive();
    let first = d.with_day(1).unwrap_or(d);
    let next_first = if first.month() == 12 {
        first
            .with_year(first.year() + 1)
            .and_then(|x| x.with_month(1))
            .unwrap_or(first)
    } else {
        first.with_month(first.month() + 1).unwrap_or(first)
    };
    let first_ts = first.and_time(NaiveTime::MIN).and_utc().timestamp();
    let last_ts = next_first.and_time(NaiveTime::MIN).and_utc().timestamp() - DAY;
    (first_ts, last_ts)
}

pub fn evaluate_datetime(
    acc: &Account,
    found: bool,
    unix_ms: i64,
    cond: &DatetimeCondition,
) -> bool {
    let t = unix_ms / 1000;
    let now = Utc::now();
    let now_sec = now.timestamp();
    let tz = tz_offset_secs(&acc.timezone);

    let in_window = |start: i64, end: i64| start + tz <= t && t <= end + tz;
    let in_last = |span: i64| now_sec - span <= t && t <= now_sec;

    match cond.op.as_str() {
        "any" => true,
        "unset" => !found,
        "has_value" => found,
        "in_business_hour" => {
            during_business_hour(&acc.business_hours, t, &acc.timezone).unwrap_or(false)
        }
        "non_business_hour" => {
            !during_business_hour(&acc.business_hours, t, &acc.timezone).unwrap_or(false)
        }
        "today" => {
            let ds = day_start(now);
            in_window(ds, ds + DAY - 1)
        }
        "yesterday" => {
            let ds = day_start(now);
            in_window(ds - DAY, ds - 1)
        }
        "this_week" => {
            let ws = day_start(now) - (now.weekday().num_days_from_monday() as i64) * DAY;
            in_window(ws, ws + WEEK - 1)
        }
        "last_week" => {
            let ws = day_start(now) - (now.weekday().num_days_from_monday() as i64) * DAY;
            in_window(ws - WEEK, ws - 1)
        }
        "this_month" => {
            let (a, b) = month_window(now);
            in_window(a, b)
        }
        "last_month" => {
            let d = now.date_naive();
            let first = d.with_day(1).unwrap_or(d);
            let prev_last = first.pred_opt().unwrap_or(first);
            let prev_first = prev_last.with_day(1).unwrap_or(prev_last);
            in_window(
                prev_first.and_time(NaiveTime::MIN).and_utc().timestamp(),
                prev_last.and_time(NaiveTime::MIN).and_utc().timestamp(),
            )
        }
        "last" => in_last(cond.last),
        "before_ago" => t < now_sec - cond.before_ago,
        "date_last_30mins" => in_last(1800),
        "date_last_2hours" => in_last(7200),
        "date_last_24h" => in_last(DAY),
        "date_last_7days" => in_last(WEEK),
        "date_last_30days" => in_last(30 * DAY),
        "days_of_week" => {
            let dt = match DateTime::from_timestamp(t, 0) {
                Some(d) => d,
                None => return false,
            };
            let name = weekday_name(dt.weekday());
            cond.days_of_week.iter().any(|d| d.eq_ignore_ascii_case(name))
        }
        // absolute bounds compare at millisecond precision
        "after" => cond.after <= unix_ms,
        "before" => unix_ms <= cond.before,
        "between" => {
            if cond.between.len() != 2 {
                return true;
            }
            cond.between[0] <= unix_ms && unix_ms <= cond.between[1]
        }
        "outside" => {
            if cond.outside.len() != 2 {
                return true;
            }
            unix_ms <= cond.outside[0] || cond.outside[1] <= unix_ms
        }
        _ => true,
    }
}
