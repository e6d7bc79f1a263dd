//! Date and time operations.
//!
//! All instants are [`DateTime<FixedOffset>`]. The current time comes from a
//! [`Clock`] function pointer so tests can pin it to a fixed instant; nothing
//! here reads the system clock directly.

use chrono::{DateTime, FixedOffset, Local, SecondsFormat};

use super::layout::Layout;
use super::OpError;

/// Source of the current instant.
pub type Clock = fn() -> DateTime<FixedOffset>;

/// Default clock: current local time with its UTC offset.
pub fn system_clock() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

fn rfc3339(instant: &DateTime<FixedOffset>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current date, `YYYY-MM-DD`.
pub fn today(clock: Clock) -> String {
    clock().format("%Y-%m-%d").to_string()
}

/// Current instant, RFC 3339 with offset.
pub fn now(clock: Clock) -> String {
    rfc3339(&clock())
}

/// Render an RFC 3339 instant per the reference layout. Input that is not
/// RFC 3339 passes through unchanged.
pub fn format_date(layout: &str, input: &str) -> String {
    match DateTime::parse_from_rfc3339(input) {
        Ok(instant) => Layout::compile(layout).format(&instant),
        Err(_) => input.to_string(),
    }
}

/// As [`format_date`], but unparseable input is an error.
pub fn format_date_strict(layout: &str, input: &str) -> Result<String, OpError> {
    let instant = DateTime::parse_from_rfc3339(input).map_err(|_| OpError::NotRfc3339 {
        value: input.to_string(),
    })?;
    Ok(Layout::compile(layout).format(&instant))
}

/// Read a date written per the reference layout and emit it as RFC 3339.
/// Input the layout does not match passes through unchanged.
pub fn read_date(layout: &str, input: &str) -> String {
    match Layout::compile(layout).parse(input) {
        Some(instant) => rfc3339(&instant),
        None => input.to_string(),
    }
}

/// As [`read_date`], but input the layout does not match is an error.
pub fn read_date_strict(layout: &str, input: &str) -> Result<String, OpError> {
    Layout::compile(layout)
        .parse(input)
        .map(|instant| rfc3339(&instant))
        .ok_or_else(|| OpError::UnrecognizedDate {
            value: input.to_string(),
            layout: layout.to_string(),
        })
}

/// Reference layouts tried by [`smart_date`], most common first. Dashed
/// dates read day-first.
const SMART_LAYOUTS: &[&str] = &[
    "1/2/2006",
    "02-01-2006",
    "2006-01-02",
    "Jan 2, 2006",
    "January 2, 2006",
    "2006-01-02 15:04:05",
    "2006/01/02 15:04:05-07:00",
    "January 2, 2006 15:04:05-07:00",
    "Jan 2, 2006 15:04 MST",
];

fn parse_smart(input: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(input) {
        return Some(instant);
    }
    SMART_LAYOUTS
        .iter()
        .find_map(|layout| Layout::compile(layout).parse(input))
}

/// Try a fixed ladder of common date formats; first match wins. Emits
/// RFC 3339, or passes the input through when nothing matches.
pub fn smart_date(input: &str) -> String {
    match parse_smart(input) {
        Some(instant) => rfc3339(&instant),
        None => input.to_string(),
    }
}

/// Return `if_past` when the input instant is strictly before the clock,
/// `if_not` otherwise. Input that no date format matches passes through.
pub fn is_past(if_past: &str, if_not: &str, input: &str, clock: Clock) -> String {
    match parse_smart(input) {
        Some(instant) => {
            if instant < clock() {
                if_past.to_string()
            } else {
                if_not.to_string()
            }
        }
        None => input.to_string(),
    }
}

/// Return `if_future` when the input instant is strictly after the clock,
/// `if_not` otherwise. Input that no date format matches passes through.
pub fn is_future(if_future: &str, if_not: &str, input: &str, clock: Clock) -> String {
    match parse_smart(input) {
        Some(instant) => {
            if instant > clock() {
                if_future.to_string()
            } else {
                if_not.to_string()
            }
        }
        None => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_clock() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2021-08-30T18:22:13-06:00").unwrap()
    }

    #[test]
    fn today_and_now_use_the_clock() {
        assert_eq!(today(fixed_clock), "2021-08-30");
        assert_eq!(now(fixed_clock), "2021-08-30T18:22:13-06:00");
    }

    #[test]
    fn format_date_renders_or_passes_through() {
        assert_eq!(
            format_date("2006-01-02", "2021-08-30T18:22:13-06:00"),
            "2021-08-30"
        );
        assert_eq!(
            format_date("Mon Jan 2, 2006 3:04:05 pm", "2021-08-30T18:22:13-06:00"),
            "Mon Aug 30, 2021 6:22:13 pm"
        );
        assert_eq!(format_date("2005-04-03", "a"), "a");
        assert_eq!(format_date("2006-01-02", ""), "");
    }

    #[test]
    fn format_date_strict_rejects_non_rfc3339() {
        assert_eq!(
            format_date_strict("2006-01-02", "2021-08-30")
                .unwrap_err()
                .to_string(),
            "expected RFC3339 format for input date: '2021-08-30'"
        );
    }

    #[test]
    fn read_date_emits_rfc3339_or_passes_through() {
        assert_eq!(read_date("2006-01-02", "2021-07-04"), "2021-07-04T00:00:00Z");
        assert_eq!(read_date("Jan 02, 2006", "Oct 31, 2022"), "2022-10-31T00:00:00Z");
        assert_eq!(read_date("01-02-06", "05-09-80"), "1980-05-09T00:00:00Z");
        assert_eq!(
            read_date("Jan 2, 2006 15:04 MST", "Feb 3, 2004 16:55 MST"),
            "2004-02-03T16:55:00Z"
        );
        assert_eq!(read_date("2006-01-02", "banana"), "banana");
        assert_eq!(read_date("2006-01-02", ""), "");
    }

    #[test]
    fn read_date_strict_names_the_layout() {
        assert_eq!(
            read_date_strict("2006-01-02", "5/6/2019")
                .unwrap_err()
                .to_string(),
            "unrecognized date '5/6/2019' for format: '2006-01-02'"
        );
    }

    #[test]
    fn smart_date_tries_the_ladder_in_order() {
        assert_eq!(smart_date("5/6/1980"), "1980-05-06T00:00:00Z");
        assert_eq!(smart_date("03-02-2004"), "2004-02-03T00:00:00Z");
        assert_eq!(smart_date("Dec 25, 1980"), "1980-12-25T00:00:00Z");
        assert_eq!(smart_date("1942-06-12"), "1942-06-12T00:00:00Z");
        assert_eq!(smart_date("gibberish"), "gibberish");
    }

    #[test]
    fn is_past_and_is_future_compare_strictly() {
        let clock: Clock = fixed_clock;
        assert_eq!(is_past("past", "future", "1/1/1980", clock), "past");
        assert_eq!(
            is_past("past", "future", "August 30, 2021 08:00:00-06:00", clock),
            "past"
        );
        assert_eq!(
            is_past("past", "future", "2021/08/31 12:00:00-06:00", clock),
            "future"
        );
        assert_eq!(is_past("past", "future", "Jan 4, 2022", clock), "future");

        assert_eq!(is_future("future", "past", "1/1/1980", clock), "past");
        assert_eq!(is_future("future", "past", "Jan 4, 2022", clock), "future");

        // An instant equal to the clock is neither past nor future.
        assert_eq!(
            is_past("past", "future", "2021-08-30T18:22:13-06:00", clock),
            "future"
        );
        assert_eq!(
            is_future("future", "past", "2021-08-30T18:22:13-06:00", clock),
            "past"
        );
    }

    #[test]
    fn non_dates_pass_through_comparisons() {
        let clock: Clock = fixed_clock;
        assert_eq!(is_past("past", "future", "", clock), "");
        assert_eq!(is_past("past", "future", "not a date", clock), "not a date");
    }
}
