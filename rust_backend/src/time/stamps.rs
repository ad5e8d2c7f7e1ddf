use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};

/// Date-time layouts seen across the port feeds, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y%m%d%H%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// Parse a feed timestamp into a naive port-local date-time.
///
/// RFC 3339 values keep their wall-clock time and drop the offset. Date-only
/// values resolve to midnight. Returns `None` for empty or unrecognised text.
///
/// # Example
/// ```
/// use portwatch::time::parse_feed_timestamp;
/// let ts = parse_feed_timestamp("2024/07/01 13:45").unwrap();
/// assert_eq!(ts.to_string(), "2024-07-01 13:45:00");
/// assert!(parse_feed_timestamp("soon").is_none());
/// ```
pub fn parse_feed_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Signed number of hours from `from` to `to`.
pub fn hours_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_seconds() as f64 / 3600.0
}

/// Offset a timestamp by fractional hours, at second resolution.
///
/// Saturates at [`NaiveDateTime::MIN`] or [`NaiveDateTime::MAX`] when the
/// result is not representable.
pub fn add_hours(base: NaiveDateTime, hours: f64) -> NaiveDateTime {
    let seconds = (hours * 3600.0).round() as i64;
    TimeDelta::try_seconds(seconds)
        .and_then(|delta| base.checked_add_signed(delta))
        .unwrap_or(if seconds < 0 {
            NaiveDateTime::MIN
        } else {
            NaiveDateTime::MAX
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn parses_common_feed_layouts() {
        let expected = at(2024, 7, 1, 13, 45);
        for raw in [
            "2024-07-01 13:45:00",
            "2024-07-01 13:45",
            "2024-07-01T13:45:00",
            "2024/07/01 13:45",
            "01/07/2024 13:45",
            "202407011345",
            "  2024-07-01 13:45  ",
        ] {
            assert_eq!(parse_feed_timestamp(raw), Some(expected), "layout {:?}", raw);
        }
    }

    #[test]
    fn rfc3339_keeps_wall_clock() {
        assert_eq!(
            parse_feed_timestamp("2024-07-01T13:45:00+08:00"),
            Some(at(2024, 7, 1, 13, 45))
        );
    }

    #[test]
    fn date_only_resolves_to_midnight() {
        assert_eq!(parse_feed_timestamp("2024-07-01"), Some(at(2024, 7, 1, 0, 0)));
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert_eq!(parse_feed_timestamp(""), None);
        assert_eq!(parse_feed_timestamp("   "), None);
        assert_eq!(parse_feed_timestamp("TBA"), None);
        assert_eq!(parse_feed_timestamp("2024-13-45 99:99"), None);
    }

    #[test]
    fn hour_arithmetic() {
        let base = at(2024, 7, 1, 0, 0);
        assert_eq!(hours_between(base, at(2024, 7, 1, 6, 30)), 6.5);
        assert_eq!(hours_between(at(2024, 7, 1, 6, 30), base), -6.5);
        assert_eq!(add_hours(base, 1.25), at(2024, 7, 1, 1, 15));
    }

    #[test]
    fn add_hours_saturates_instead_of_overflowing() {
        let far = parse_feed_timestamp("+262142-12-31 23:00").unwrap();
        assert_eq!(add_hours(far, 48.0), NaiveDateTime::MAX);
        assert_eq!(add_hours(at(2024, 7, 1, 0, 0), 2e10), NaiveDateTime::MAX);
        assert_eq!(add_hours(at(2024, 7, 1, 0, 0), -2e10), NaiveDateTime::MIN);
        assert_eq!(add_hours(at(2024, 7, 1, 0, 0), f64::INFINITY), NaiveDateTime::MAX);
    }
}
