//! Reference-date layouts.
//!
//! Date operations describe formats with a reference layout: a template
//! showing how the reference instant `Mon Jan 2 15:04:05 2006 -07:00` would
//! be written, e.g. `2006-01-02` or `Jan 2, 2006 15:04`. A layout is compiled
//! once into a chrono format string plus a note of which components it
//! carries, which decides how lenient parsing can be (missing time is
//! midnight, missing offset is UTC).

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

/// A compiled reference layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    fmt: String,
    has_time: bool,
    has_offset: bool,
    /// Layout wrote the offset RFC 3339 style (`Z07:00`), which renders a
    /// zero offset as `Z`.
    zulu: bool,
}

#[derive(Clone, Copy)]
enum Component {
    Date,
    Time,
    Offset,
    ZuluOffset,
    /// Zone abbreviation such as `MST`: skipped on parse, rendered as the
    /// numeric offset.
    Zone,
}

/// Layout tokens and their chrono spellings. Longer tokens come first so
/// `2006` wins over `2` and `15` over `1`.
const TOKENS: &[(&str, &str, Component)] = &[
    ("January", "%B", Component::Date),
    ("Monday", "%A", Component::Date),
    ("-07:00", "%:z", Component::Offset),
    ("Z07:00", "%:z", Component::ZuluOffset),
    ("-0700", "%z", Component::Offset),
    ("Z0700", "%z", Component::ZuluOffset),
    ("2006", "%Y", Component::Date),
    ("Jan", "%b", Component::Date),
    ("Mon", "%a", Component::Date),
    ("MST", "%Z", Component::Zone),
    ("15", "%H", Component::Time),
    ("01", "%m", Component::Date),
    ("02", "%d", Component::Date),
    ("03", "%I", Component::Time),
    ("04", "%M", Component::Time),
    ("05", "%S", Component::Time),
    ("06", "%y", Component::Date),
    ("PM", "%p", Component::Time),
    ("pm", "%P", Component::Time),
    ("_2", "%e", Component::Date),
    ("1", "%-m", Component::Date),
    ("2", "%-d", Component::Date),
    ("3", "%-I", Component::Time),
    ("4", "%-M", Component::Time),
    ("5", "%-S", Component::Time),
];

impl Layout {
    pub fn compile(layout: &str) -> Layout {
        let mut fmt = String::with_capacity(layout.len());
        let mut has_time = false;
        let mut has_offset = false;
        let mut zulu = false;

        let mut rest = layout;
        'scan: while !rest.is_empty() {
            for (token, spec, component) in TOKENS {
                if rest.starts_with(token) {
                    fmt.push_str(spec);
                    match component {
                        Component::Date | Component::Zone => {}
                        Component::Time => has_time = true,
                        Component::Offset => has_offset = true,
                        Component::ZuluOffset => {
                            has_offset = true;
                            zulu = true;
                        }
                    }
                    rest = &rest[token.len()..];
                    continue 'scan;
                }
            }

            if let Some(spec) = fractional_seconds(&mut rest) {
                fmt.push_str(spec);
                continue 'scan;
            }

            let ch = rest.chars().next().expect("scanned past the end");
            if ch == '%' {
                fmt.push_str("%%");
            } else {
                fmt.push(ch);
            }
            rest = &rest[ch.len_utf8()..];
        }

        Layout {
            fmt,
            has_time,
            has_offset,
            zulu,
        }
    }

    /// Render an instant per this layout.
    pub fn format(&self, instant: &DateTime<FixedOffset>) -> String {
        let rendered = instant.format(&self.fmt).to_string();
        if self.zulu && instant.offset().local_minus_utc() == 0 {
            rendered.replace("+00:00", "Z").replace("+0000", "Z")
        } else {
            rendered
        }
    }

    /// Read an instant per this layout. Components the layout does not carry
    /// default: midnight for the time, UTC for the offset.
    pub fn parse(&self, input: &str) -> Option<DateTime<FixedOffset>> {
        if self.has_offset {
            DateTime::parse_from_str(input, &self.fmt).ok()
        } else if self.has_time {
            NaiveDateTime::parse_from_str(input, &self.fmt)
                .ok()
                .map(|dt| dt.and_utc().fixed_offset())
        } else {
            NaiveDate::parse_from_str(input, &self.fmt)
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN).and_utc().fixed_offset())
        }
    }
}

/// Consume a `.000…` or `.999…` run (fixed or trimmed fractional seconds).
fn fractional_seconds<'a>(rest: &mut &'a str) -> Option<&'static str> {
    let scanned: &'a str = rest;
    let tail = scanned.strip_prefix('.')?;
    let zeros = tail.bytes().take_while(|b| *b == b'0').count();
    let nines = tail.bytes().take_while(|b| *b == b'9').count();
    let run = zeros.max(nines);
    if run < 3 {
        return None;
    }
    *rest = &scanned[1 + run..];
    Some(match zeros {
        3 => "%.3f",
        6 => "%.6f",
        9 => "%.9f",
        _ => "%.f",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(rfc3339: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap()
    }

    #[test]
    fn compiles_common_layouts() {
        assert_eq!(Layout::compile("2006-01-02").fmt, "%Y-%m-%d");
        assert_eq!(Layout::compile("1/2/2006").fmt, "%-m/%-d/%Y");
        assert_eq!(Layout::compile("01-02-06").fmt, "%m-%d-%y");
        assert_eq!(
            Layout::compile("Mon Jan 2, 2006 3:04:05 pm").fmt,
            "%a %b %-d, %Y %-I:%M:%S %P"
        );
        assert_eq!(
            Layout::compile("2006-01-02T15:04:05Z07:00").fmt,
            "%Y-%m-%dT%H:%M:%S%:z"
        );
    }

    #[test]
    fn unknown_text_stays_literal() {
        let layout = Layout::compile("America/Denver");
        assert_eq!(layout.fmt, "America/Denver");
        assert_eq!(layout.format(&instant("2021-08-30T18:22:13-06:00")), "America/Denver");
    }

    #[test]
    fn formats_with_twelve_hour_clock() {
        let layout = Layout::compile("Mon Jan 2, 2006 3:04:05 pm");
        assert_eq!(
            layout.format(&instant("2021-08-30T18:22:13-06:00")),
            "Mon Aug 30, 2021 6:22:13 pm"
        );
    }

    #[test]
    fn date_only_layout_parses_to_utc_midnight() {
        let layout = Layout::compile("2006-01-02");
        let parsed = layout.parse("2021-07-04").unwrap();
        assert_eq!(parsed, instant("2021-07-04T00:00:00Z"));
    }

    #[test]
    fn two_digit_years_map_to_the_near_centuries() {
        let layout = Layout::compile("01-02-06");
        assert_eq!(
            layout.parse("05-09-80").unwrap(),
            instant("1980-05-09T00:00:00Z")
        );
        assert_eq!(
            layout.parse("05-09-05").unwrap(),
            instant("2005-05-09T00:00:00Z")
        );
    }

    #[test]
    fn zone_abbreviations_are_skipped_when_parsing() {
        let layout = Layout::compile("Jan 2, 2006 15:04 MST");
        assert_eq!(
            layout.parse("Feb 3, 2004 16:55 MST").unwrap(),
            instant("2004-02-03T16:55:00Z")
        );
    }

    #[test]
    fn offset_layouts_keep_the_offset() {
        let layout = Layout::compile("2006/01/02 15:04:05-07:00");
        assert_eq!(
            layout.parse("2021/08/31 12:00:00-06:00").unwrap(),
            instant("2021-08-31T12:00:00-06:00")
        );
    }

    #[test]
    fn rejects_text_that_does_not_fit() {
        let layout = Layout::compile("2006-01-02");
        assert!(layout.parse("banana").is_none());
        assert!(layout.parse("2021-04-14 extra").is_none());
        assert!(Layout::compile("1/2/2006").parse("03-02-2004").is_none());
    }

    #[test]
    fn zulu_offset_renders_z_for_utc() {
        let layout = Layout::compile("2006-01-02T15:04:05Z07:00");
        assert_eq!(
            layout.format(&instant("2021-07-04T00:00:00Z")),
            "2021-07-04T00:00:00Z"
        );
        assert_eq!(
            layout.format(&instant("2021-08-30T18:22:13-06:00")),
            "2021-08-30T18:22:13-06:00"
        );
    }
}
