// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger-specification parsing for the task tool and seed file.

use chrono_tz::Tz;

use mnemos_core::time::{parse_interval, parse_time_expression};
use mnemos_core::types::Trigger;
use mnemos_core::Error;

/// Parse a trigger from its type name and time expression.
///
/// `once` accepts epoch seconds, ISO-8601 datetimes, the restricted
/// relative grammar (`in N seconds|minutes|hours|days|weeks`,
/// `tomorrow`, `next week`); `interval` accepts the compact grammar
/// (`30s`, `5m`, `1h`, `1d`, `1w`) or bare positive seconds.
pub fn parse_trigger(
    trigger_type: &str,
    time_expr: &str,
    now: i64,
    tz: Tz,
) -> Result<Trigger, Error> {
    match trigger_type {
        "once" => {
            let timestamp = parse_time_expression(time_expr, now, tz)?;
            Ok(Trigger::Once { timestamp })
        }
        "interval" => {
            let interval_secs = parse_interval(time_expr)?;
            Ok(Trigger::Interval { interval_secs })
        }
        other => Err(Error::BadArgument(format!(
            "trigger_type must be 'once' or 'interval', got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_750_000_000;

    #[test]
    fn once_accepts_all_grammars() {
        for expr in ["1750000100", "in 30 minutes", "tomorrow", "next week"] {
            let trigger = parse_trigger("once", expr, NOW, chrono_tz::UTC).unwrap();
            assert!(matches!(trigger, Trigger::Once { .. }), "expr: {expr}");
        }
    }

    #[test]
    fn interval_accepts_compact_grammar() {
        assert_eq!(
            parse_trigger("interval", "30s", NOW, chrono_tz::UTC).unwrap(),
            Trigger::Interval { interval_secs: 30 }
        );
        assert_eq!(
            parse_trigger("interval", "1d", NOW, chrono_tz::UTC).unwrap(),
            Trigger::Interval {
                interval_secs: 86_400
            }
        );
        assert_eq!(
            parse_trigger("interval", "45", NOW, chrono_tz::UTC).unwrap(),
            Trigger::Interval { interval_secs: 45 }
        );
    }

    #[test]
    fn unparsable_inputs_are_bad_argument() {
        assert_eq!(
            parse_trigger("once", "whenever", NOW, chrono_tz::UTC)
                .unwrap_err()
                .kind(),
            "bad_argument"
        );
        assert_eq!(
            parse_trigger("interval", "yearly", NOW, chrono_tz::UTC)
                .unwrap_err()
                .kind(),
            "bad_argument"
        );
        assert_eq!(
            parse_trigger("cron", "* * * * *", NOW, chrono_tz::UTC)
                .unwrap_err()
                .kind(),
            "bad_argument"
        );
    }
}
