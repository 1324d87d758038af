//! Parses `--at` (§6): a bare POSIX integer, or one of three date formats.
//!
//! Grounded on the original's `commands.py::Timestamp`, a `click.DateTime`
//! subclass that tries `int(value)` first and falls back to a set of
//! `strptime`-style formats. Dates are interpreted as UTC rather than the
//! original's local time: `time`'s local-offset detection is unsound to
//! enable unconditionally in a multi-threaded binary, so this is a
//! deliberate simplification (see DESIGN.md).

use crate::error::{Error, ErrorKind, Result};
use time::macros::format_description;
use time::{Date, PrimitiveDateTime};

/// Parses `input` into a POSIX timestamp (§6 `--at`).
///
/// Accepted forms, tried in order: a bare integer, `YYYY-MM-DDTHH:MM:SS`,
/// `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD` (midnight). Anything else fails with
/// [`ErrorKind::BadTimestamp`], which maps to exit code 2.
pub fn parse_timestamp(input: &str) -> Result<i64> {
    if let Ok(value) = input.parse::<i64>() {
        return Ok(value);
    }

    let iso_format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    if let Ok(dt) = PrimitiveDateTime::parse(input, &iso_format) {
        return Ok(dt.assume_utc().unix_timestamp());
    }

    let space_format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    if let Ok(dt) = PrimitiveDateTime::parse(input, &space_format) {
        return Ok(dt.assume_utc().unix_timestamp());
    }

    let date_format = format_description!("[year]-[month]-[day]");
    if let Ok(date) = Date::parse(input, &date_format) {
        return Ok(date.midnight().assume_utc().unix_timestamp());
    }

    Err(Error::from(ErrorKind::BadTimestamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_integer() {
        assert_eq!(parse_timestamp("1700000000").unwrap(), 1700000000);
    }

    #[test]
    fn parses_date_only_as_midnight() {
        let ts = parse_timestamp("2001-01-02").unwrap();
        let expected = PrimitiveDateTime::new(
            Date::from_calendar_date(2001, time::Month::January, 2).unwrap(),
            time::Time::MIDNIGHT,
        )
        .assume_utc()
        .unix_timestamp();
        assert_eq!(ts, expected);
    }

    #[test]
    fn parses_iso_datetime() {
        let ts = parse_timestamp("2001-01-02T03:04:05").unwrap();
        let expected = PrimitiveDateTime::new(
            Date::from_calendar_date(2001, time::Month::January, 2).unwrap(),
            time::Time::from_hms(3, 4, 5).unwrap(),
        )
        .assume_utc()
        .unix_timestamp();
        assert_eq!(ts, expected);
    }

    #[test]
    fn parses_space_separated_datetime() {
        assert_eq!(parse_timestamp("2001-01-02 03:04:05").unwrap(), parse_timestamp("2001-01-02T03:04:05").unwrap());
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_timestamp("not-a-date").unwrap_err();
        assert!(matches!(&*err, ErrorKind::BadTimestamp));
    }
}
