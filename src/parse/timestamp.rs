use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Timelike};

/// Date format used for activity dates and `--start`/`--end` arguments
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format a timestamp as RFC 3339 with nanoseconds, trailing fractional
/// zeros trimmed and `Z` for a zero offset:
/// `2014-10-31T21:36:31.49146148+01:00`.
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    let mut out = ts.format("%Y-%m-%dT%H:%M:%S").to_string();

    let nanos = ts.nanosecond() % 1_000_000_000;
    if nanos != 0 {
        let frac = format!("{:09}", nanos);
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }

    if ts.offset().local_minus_utc() == 0 {
        out.push('Z');
    } else {
        out.push_str(&ts.format("%:z").to_string());
    }
    out
}

/// Parse an RFC 3339 timestamp, keeping its offset
pub fn parse_timestamp(s: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s)
}

/// The current instant in the local offset
pub fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

/// Parse a `--start`/`--end` style argument: either a full RFC 3339
/// timestamp or a bare `YYYY-MM-DD` date. Bare dates resolve to the first
/// (or, with `end_of_day`, the last) nanosecond of that day in local time.
pub fn parse_time_arg(s: &str, end_of_day: bool) -> Result<DateTime<FixedOffset>, String> {
    if let Ok(ts) = parse_timestamp(s) {
        return Ok(ts);
    }

    let date = NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|_| format!("invalid time {:?}: expected YYYY-MM-DD or RFC 3339", s))?;
    let time = if end_of_day {
        NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| format!("invalid time of day for {:?}", s))?;

    Local
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| format!("{:?} does not exist in the local time zone", s))
}
