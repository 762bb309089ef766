// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time utilities: epoch-second clock, zone-aware human rendering, and
//! the trigger-time grammar used by the scheduler and its tool surface.
//!
//! Stored values are always UTC epoch seconds; the configured IANA zone
//! only affects rendering and the interpretation of naive datetimes.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::Error;

const MINUTE: i64 = 60;
const HOUR: i64 = 3600;
const DAY: i64 = 86_400;
const WEEK: i64 = 604_800;

/// Current UTC epoch seconds.
pub fn now_ts() -> i64 {
    Utc::now().timestamp()
}

/// Parse an IANA zone name (e.g. "Europe/Berlin").
pub fn parse_timezone(name: &str) -> Result<Tz, Error> {
    name.parse::<Tz>()
        .map_err(|_| Error::BadArgument(format!("unknown IANA timezone: {name}")))
}

/// Render an epoch second as `YYYY-MM-DD HH:MM:SS` in the given zone.
pub fn human_time(ts: i64, tz: Tz) -> String {
    match tz.timestamp_opt(ts, 0) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => format!("@{ts}"),
    }
}

/// Render the current moment with a zone abbreviation, for the prompt's
/// "current time" line.
pub fn current_time_str(tz: Tz) -> String {
    Utc::now()
        .with_timezone(&tz)
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string()
}

/// Parse a `once`-trigger time expression into an epoch second.
///
/// Accepted forms: bare epoch seconds, ISO-8601 datetimes (naive values
/// are localised to `tz`), a bare date, `in N
/// {seconds|minutes|hours|days|weeks}`, `tomorrow`, and `next week`.
pub fn parse_time_expression(expr: &str, now: i64, tz: Tz) -> Result<i64, Error> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(Error::BadArgument("empty time expression".into()));
    }

    if let Ok(ts) = expr.parse::<i64>() {
        // Reject obviously bogus stamps (negative or more than a year out).
        if ts >= 0 && ts <= now + 365 * DAY {
            return Ok(ts);
        }
        return Err(Error::BadArgument(format!(
            "timestamp out of range: {ts}"
        )));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(expr) {
        return Ok(dt.timestamp());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(expr, format) {
            return localize(naive, tz);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(expr, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0).expect("midnight is valid");
        return localize(naive, tz);
    }

    let lower = expr.to_lowercase();
    if lower == "tomorrow" {
        return Ok(now + DAY);
    }
    if lower == "next week" {
        return Ok(now + WEEK);
    }
    if let Some(rest) = lower.strip_prefix("in ") {
        return parse_relative(rest.trim(), now);
    }

    Err(Error::BadArgument(format!(
        "unparsable time expression: {expr}"
    )))
}

fn localize(naive: NaiveDateTime, tz: Tz) -> Result<i64, Error> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| {
            Error::BadArgument(format!("datetime does not exist in zone: {naive}"))
        })
}

fn parse_relative(rest: &str, now: i64) -> Result<i64, Error> {
    // Accept both "in 30 minutes" and the compact "in 30m".
    let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let amount: i64 = rest[..digits_end]
        .parse()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| Error::BadArgument(format!("unparsable relative time: in {rest}")))?;
    let unit = rest[digits_end..].trim();

    let secs = match unit {
        "s" | "sec" | "second" | "seconds" => amount,
        "m" | "min" | "minute" | "minutes" => amount * MINUTE,
        "h" | "hour" | "hours" => amount * HOUR,
        "d" | "day" | "days" => amount * DAY,
        "w" | "week" | "weeks" => amount * WEEK,
        _ => {
            return Err(Error::BadArgument(format!(
                "unknown time unit in: in {rest}"
            )))
        }
    };
    Ok(now + secs)
}

/// Parse an interval expression (`30s`, `5m`, `1h`, `1d`, `1w`, or bare
/// positive seconds) into seconds.
pub fn parse_interval(expr: &str) -> Result<i64, Error> {
    let expr = expr.trim().to_lowercase();
    if expr.is_empty() {
        return Err(Error::BadArgument("empty interval".into()));
    }

    let (digits, multiplier) = match expr.as_bytes()[expr.len() - 1] {
        b's' => (&expr[..expr.len() - 1], 1),
        b'm' => (&expr[..expr.len() - 1], MINUTE),
        b'h' => (&expr[..expr.len() - 1], HOUR),
        b'd' => (&expr[..expr.len() - 1], DAY),
        b'w' => (&expr[..expr.len() - 1], WEEK),
        _ => (expr.as_str(), 1),
    };

    digits
        .parse::<i64>()
        .ok()
        .filter(|n| *n > 0)
        .map(|n| n * multiplier)
        .ok_or_else(|| Error::BadArgument(format!("invalid interval: {expr}")))
}

/// Render an interval in the most compact unit that divides it evenly.
pub fn format_interval(secs: i64) -> String {
    if secs % WEEK == 0 {
        format!("{}w", secs / WEEK)
    } else if secs % DAY == 0 {
        format!("{}d", secs / DAY)
    } else if secs % HOUR == 0 {
        format!("{}h", secs / HOUR)
    } else if secs % MINUTE == 0 {
        format!("{}m", secs / MINUTE)
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_750_000_000;

    fn utc() -> Tz {
        chrono_tz::UTC
    }

    #[test]
    fn epoch_seconds_pass_through() {
        assert_eq!(parse_time_expression("1750000100", NOW, utc()).unwrap(), 1_750_000_100);
    }

    #[test]
    fn far_future_epoch_rejected() {
        let err = parse_time_expression("99999999999", NOW, utc()).unwrap_err();
        assert_eq!(err.kind(), "bad_argument");
    }

    #[test]
    fn iso_datetime_with_offset() {
        let ts = parse_time_expression("2026-03-01T12:00:00+00:00", NOW, utc()).unwrap();
        assert_eq!(human_time(ts, utc()), "2026-03-01 12:00:00");
    }

    #[test]
    fn naive_datetime_uses_configured_zone() {
        let berlin: Tz = "Europe/Berlin".parse().unwrap();
        let ts_berlin = parse_time_expression("2026-01-15 09:00:00", NOW, berlin).unwrap();
        let ts_utc = parse_time_expression("2026-01-15 09:00:00", NOW, utc()).unwrap();
        // Berlin is one hour ahead of UTC in January.
        assert_eq!(ts_utc - ts_berlin, 3600);
    }

    #[test]
    fn relative_expressions() {
        assert_eq!(parse_time_expression("in 30 seconds", NOW, utc()).unwrap(), NOW + 30);
        assert_eq!(parse_time_expression("in 5 minutes", NOW, utc()).unwrap(), NOW + 300);
        assert_eq!(parse_time_expression("in 2 hours", NOW, utc()).unwrap(), NOW + 7200);
        assert_eq!(parse_time_expression("in 3 days", NOW, utc()).unwrap(), NOW + 3 * 86_400);
        assert_eq!(parse_time_expression("tomorrow", NOW, utc()).unwrap(), NOW + 86_400);
        assert_eq!(parse_time_expression("next week", NOW, utc()).unwrap(), NOW + 604_800);
    }

    #[test]
    fn garbage_time_expression_is_bad_argument() {
        for expr in ["soonish", "in banana minutes", "in 5 fortnights", ""] {
            let err = parse_time_expression(expr, NOW, utc()).unwrap_err();
            assert_eq!(err.kind(), "bad_argument", "expr: {expr}");
        }
    }

    #[test]
    fn interval_grammar() {
        assert_eq!(parse_interval("30s").unwrap(), 30);
        assert_eq!(parse_interval("5m").unwrap(), 300);
        assert_eq!(parse_interval("1h").unwrap(), 3600);
        assert_eq!(parse_interval("1d").unwrap(), 86_400);
        assert_eq!(parse_interval("1w").unwrap(), 604_800);
        assert_eq!(parse_interval("45").unwrap(), 45);
    }

    #[test]
    fn interval_rejects_garbage() {
        for expr in ["", "0s", "-5m", "fast", "1y"] {
            assert_eq!(parse_interval(expr).unwrap_err().kind(), "bad_argument", "expr: {expr}");
        }
    }

    #[test]
    fn interval_formatting_picks_largest_unit() {
        assert_eq!(format_interval(604_800), "1w");
        assert_eq!(format_interval(86_400), "1d");
        assert_eq!(format_interval(7200), "2h");
        assert_eq!(format_interval(90), "90s");
    }

    #[test]
    fn human_time_renders_in_zone() {
        let shanghai: Tz = "Asia/Shanghai".parse().unwrap();
        // 2026-01-01 00:00:00 UTC == 08:00 in Shanghai.
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap().timestamp();
        assert_eq!(human_time(ts, shanghai), "2026-01-01 08:00:00");
    }
}
