use std::borrow::Cow;

use chrono::{DateTime, NaiveDateTime, Utc};

use logwatch_types::LogEntry;

/// Highest fractional-second precision kept from a runtime timestamp
const MAX_FRACTION_DIGITS: usize = 6;

/// The line has no timestamp/message split and is not a log entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("line has no timestamp/message split")]
pub struct NotALogLine;

/// Splits timestamped runtime log lines into entries
pub struct LogParser;

impl LogParser {
    /// Split a raw line into its instant and message
    ///
    /// The line must look like `<timestamp> <message>`. A line without any
    /// whitespace is not a log entry. When the leading token is not a timestamp
    /// (continuation lines of a stack trace, for instance) the whole line becomes
    /// the message and `fallback` its instant, so it is still eligible for matching.
    pub fn normalize(raw: &str, fallback: DateTime<Utc>) -> Result<LogEntry<'_>, NotALogLine> {
        let (token, rest) = raw.split_once(char::is_whitespace).ok_or(NotALogLine)?;

        Ok(match Self::parse_timestamp(token) {
            Some(instant) => LogEntry::new(instant, rest.trim_start()),
            None => LogEntry::new(fallback, raw),
        })
    }

    /// Parse a Docker log timestamp (`2024-01-15T10:30:00.123456789Z`)
    ///
    /// Fractional seconds are truncated to microseconds. A token without a zone
    /// designator is read as UTC.
    pub fn parse_timestamp(token: &str) -> Option<DateTime<Utc>> {
        let truncated = Self::truncate_fraction(token);
        let normalized = match truncated
            .strip_suffix('Z')
            .or_else(|| truncated.strip_suffix('z'))
        {
            Some(stripped) => Cow::Owned(format!("{stripped}+00:00")),
            None => truncated,
        };

        if let Ok(ts) = DateTime::parse_from_rfc3339(&normalized) {
            return Some(ts.with_timezone(&Utc));
        }

        NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Cut the digits after the first `.` down to six, keeping any suffix
    fn truncate_fraction(token: &str) -> Cow<'_, str> {
        let Some(dot) = token.find('.') else {
            return Cow::Borrowed(token);
        };

        let fraction = &token[dot + 1..];
        let digits = fraction.bytes().take_while(u8::is_ascii_digit).count();
        if digits <= MAX_FRACTION_DIGITS {
            return Cow::Borrowed(token);
        }

        // Digits are ASCII so these byte offsets are char boundaries
        Cow::Owned(format!(
            "{}{}",
            &token[..dot + 1 + MAX_FRACTION_DIGITS],
            &fraction[digits..]
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn fallback() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_docker_timestamp() {
        let entry =
            LogParser::normalize("2024-01-15T10:30:00.123456789Z some log message", fallback())
                .unwrap();
        assert_eq!(entry.message, "some log message");
        assert_eq!(
            entry.instant,
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
                + chrono::Duration::microseconds(123_456)
        );
        assert_eq!(entry.instant.nanosecond(), 123_456_000);
    }

    #[test]
    fn test_short_fraction_is_kept() {
        let entry = LogParser::normalize("2024-01-15T10:30:00.5Z msg", fallback()).unwrap();
        assert_eq!(entry.instant.nanosecond(), 500_000_000);
    }

    #[test]
    fn test_timestamp_without_fraction() {
        let entry = LogParser::normalize("2024-01-15T10:30:00Z msg", fallback()).unwrap();
        assert_eq!(entry.instant, Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_timestamp_with_offset() {
        let entry = LogParser::normalize("2024-01-15T12:30:00.000001+02:00 msg", fallback()).unwrap();
        assert_eq!(
            entry.instant,
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
                + chrono::Duration::microseconds(1)
        );
    }

    #[test]
    fn test_timestamp_without_zone_is_utc() {
        let entry = LogParser::normalize("2024-01-15T10:30:00.25 msg", fallback()).unwrap();
        assert_eq!(
            entry.instant,
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
                + chrono::Duration::milliseconds(250)
        );
    }

    #[test]
    fn test_whitespace_run_is_collapsed() {
        let entry = LogParser::normalize("2024-01-15T10:30:00Z \t  ERROR boom", fallback()).unwrap();
        assert_eq!(entry.message, "ERROR boom");
    }

    #[test]
    fn test_single_token_is_not_a_log_line() {
        assert_eq!(
            LogParser::normalize("2024-01-15T10:30:00Z", fallback()),
            Err(NotALogLine)
        );
        assert_eq!(LogParser::normalize("garbage", fallback()), Err(NotALogLine));
        assert_eq!(LogParser::normalize("", fallback()), Err(NotALogLine));
    }

    #[test]
    fn test_malformed_timestamp_falls_back() {
        let line = "garbled line with ERROR";
        let entry = LogParser::normalize(line, fallback()).unwrap();
        assert_eq!(entry.instant, fallback());
        assert_eq!(entry.message, line);
    }

    #[test]
    fn test_stack_trace_continuation_falls_back() {
        let line = "    at com.example.Service.run(Service.java:42)";
        let entry = LogParser::normalize(line, fallback()).unwrap();
        assert_eq!(entry.instant, fallback());
        assert_eq!(entry.message, line);
    }

    #[test]
    fn test_multibyte_utf8_no_panic() {
        let line = "2024-01-15T10:30:00.1234567\u{2500}Z ╭────╮";
        let entry = LogParser::normalize(line, fallback()).unwrap();
        assert_eq!(entry.instant, fallback());
        assert_eq!(entry.message, line);

        let line2 = "2024-01-15T10:30:00Z ╭────────────────────────────╮";
        let entry2 = LogParser::normalize(line2, fallback()).unwrap();
        assert_eq!(entry2.message, "╭────────────────────────────╮");
    }
}
