//! Business-hours oracle.
//!
//! Accounts carry a weekly open-hours schedule plus a timezone offset string.
//! The evaluator only ever asks two questions: "was this instant inside
//! business hours?" and "what is the offset in hours/minutes?". Offsets are
//! plain UTC offsets (`"+07:00"`, `"-05:30"`, `"7"`), not IANA zone names.

use anyhow::{bail, Result};
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkingDay {
    /// English weekday name, matched case-insensitively.
    pub weekday: String,
    /// Inclusive open time, "HH:MM".
    pub from: String,
    /// Inclusive close time, "HH:MM".
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessHours {
    pub working_days: Vec<WorkingDay>,
}

pub fn weekday_name(w: Weekday) -> &'static str {
    match w {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Split a timezone offset string into signed hours and minutes.
/// Accepts `"+07:00"`, `"-05:30"`, `"7"`, `"+7"`, optionally prefixed with
/// `UTC`/`GMT`. The minute component carries the same sign as the hours.
pub fn split_tz_offset(tz: &str) -> Result<(i32, i32)> {
    let mut s = tz.trim();
    for prefix in ["UTC", "utc", "GMT", "gmt"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.trim();
            break;
        }
    }
    if s.is_empty() {
        return Ok((0, 0));
    }
    let mut sign = 1i32;
    if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    } else if let Some(rest) = s.strip_prefix('-') {
        sign = -1;
        s = rest;
    }
    let (hh, mm) = match s.split_once(':') {
        Some((h, m)) => (h, m),
        None => (s, "0"),
    };
    let hours: i32 = match hh.trim().parse() {
        Ok(v) => v,
        Err(_) => bail!("invalid timezone offset: {:?}", tz),
    };
    let minutes: i32 = match mm.trim().parse() {
        Ok(v) => v,
        Err(_) => bail!("invalid timezone offset: {:?}", tz),
    };
    if hours > 14 || minutes > 59 {
        bail!("timezone offset out of range: {:?}", tz);
    }
    Ok((sign * hours, sign * minutes))
}

/// Offset in seconds for an account timezone; unparsable offsets count as UTC.
pub fn tz_offset_secs(tz: &str) -> i64 {
    let (h, m) = split_tz_offset(tz).unwrap_or((0, 0));
    (h as i64) * 3600 + (m as i64) * 60
}

fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.trim().split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

/// Was `unix_sec` inside the account's business hours?
/// An empty schedule means the account never configured one and counts as
/// always open.
pub fn during_business_hour(hours: &BusinessHours, unix_sec: i64, timezone: &str) -> Result<bool> {
    if hours.working_days.is_empty() {
        return Ok(true);
    }
    let (h, m) = split_tz_offset(timezone)?;
    let local_sec = unix_sec + (h as i64) * 3600 + (m as i64) * 60;
    let local: DateTime<Utc> = match DateTime::from_timestamp(local_sec, 0) {
        Some(t) => t,
        None => bail!("timestamp out of range: {}", unix_sec),
    };
    let day = weekday_name(local.weekday());
    let minute_of_day = local.hour() * 60 + local.minute();
    for wd in &hours.working_days {
        if !wd.weekday.eq_ignore_ascii_case(day) {
            continue;
        }
        let (from, to) = match (parse_hhmm(&wd.from), parse_hhmm(&wd.to)) {
            (Some(f), Some(t)) => (f, t),
            _ => continue,
        };
        if from <= minute_of_day && minute_of_day <= to {
            return Ok(true);
        }
    }
    Ok(false)
}
