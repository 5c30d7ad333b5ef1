use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref COMPACT_REGEX: Regex = Regex::new(r"^(\d{4})(\d{2})(\d{2})$").unwrap();
}

/// Canonical output layout for every recognised date.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d";

/// One accepted input layout.
#[derive(Clone, Copy, Debug)]
enum Layout {
    /// Date and wall-clock time, no offset.
    DateTime(&'static str),
    /// Date and time carrying a numeric UTC offset.
    Zoned(&'static str),
    /// Calendar date only.
    Date(&'static str),
    /// `yyyyMMdd` with no separators.
    Compact,
}

// Order matters: the first layout that produces a valid date wins.
// `%Y` accepts one to four digits, which is how two-digit years get through.
const LAYOUTS: &[Layout] = &[
    Layout::DateTime("%Y-%m-%dT%H:%M:%S%.fZ"),
    Layout::DateTime("%Y-%m-%dT%H:%M:%S%.f"),
    Layout::DateTime("%Y-%m-%dT%H:%M"),
    Layout::Zoned("%Y-%m-%dT%H:%M:%S%.f%:z"),
    Layout::DateTime("%Y-%m-%d %H:%M:%S%.f"),
    Layout::DateTime("%Y-%m-%d %H:%M"),
    Layout::Date("%Y-%m-%d"),
    Layout::Date("%Y/%m/%d"),
    Layout::DateTime("%m/%d/%Y %H:%M:%S"),
    Layout::DateTime("%m/%d/%Y %H:%M"),
    Layout::Date("%m/%d/%Y"),
    Layout::Date("%d/%m/%Y"),
    Layout::Date("%d-%m-%Y"),
    Layout::Date("%d.%m.%Y"),
    Layout::Date("%B %d, %Y"),
    Layout::Date("%b %d, %Y"),
    Layout::Date("%d %B %Y"),
    Layout::Date("%d %b %Y"),
    Layout::Date("%b %d %Y"),
    Layout::Date("%d-%b-%Y"),
    Layout::Compact,
];

impl Layout {
    fn parse(&self, input: &str) -> Option<NaiveDate> {
        match self {
            Layout::DateTime(fmt) => NaiveDateTime::parse_from_str(input, fmt)
                .ok()
                .map(|dt| dt.date()),
            Layout::Zoned(fmt) => DateTime::parse_from_str(input, fmt)
                .ok()
                .map(|dt| dt.naive_local().date()),
            Layout::Date(fmt) => NaiveDate::parse_from_str(input, fmt).ok(),
            Layout::Compact => {
                let caps = COMPACT_REGEX.captures(input)?;
                let year = caps[1].parse().ok()?;
                let month = caps[2].parse().ok()?;
                let day = caps[3].parse().ok()?;
                NaiveDate::from_ymd_opt(year, month, day)
            }
        }
    }
}

/// Parses a date string against the known layouts.
///
/// A trailing `" UTC"` marker is ignored and two-digit years are moved into
/// the 2000s. Returns `None` when no layout matches.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let candidate = trimmed.strip_suffix(" UTC").unwrap_or(trimmed);

    let date = LAYOUTS.iter().find_map(|layout| layout.parse(candidate))?;
    if date.year() < 100 {
        return Some(date.with_year(date.year() + 2000).unwrap_or(date));
    }
    Some(date)
}

/// Converts a heterogeneous date string into `yyyy-MM-dd`.
///
/// Empty input yields an empty string. Input that matches none of the known
/// layouts is returned exactly as given, so callers must cope with
/// non-canonical keys.
///
/// # Examples
/// ```
/// use gridchart::dates::standardize_date;
///
/// assert_eq!(standardize_date(Some("01/15/2024")), "2024-01-15");
/// assert_eq!(standardize_date(Some("garbage")), "garbage");
/// assert_eq!(standardize_date(None), "");
/// ```
pub fn standardize_date(input: Option<&str>) -> String {
    match input {
        None => String::new(),
        Some(raw) => standardize(raw),
    }
}

/// Same as [`standardize_date`] for a present value.
pub fn standardize(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    match parse_date(raw) {
        Some(date) => date.format(CANONICAL_FORMAT).to_string(),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_variants_normalize() {
        assert_eq!(standardize("2024-01-15"), "2024-01-15");
        assert_eq!(standardize("2024-01-15T10:20:30Z"), "2024-01-15");
        assert_eq!(standardize("2024-01-15T10:20:30.123Z"), "2024-01-15");
        assert_eq!(standardize("2024-01-15T10:20:30"), "2024-01-15");
        assert_eq!(standardize("2024-01-15T23:30:00+02:00"), "2024-01-15");
        assert_eq!(standardize("2024-01-15 10:20:30.500"), "2024-01-15");
        assert_eq!(standardize("2024-01-15 10:20"), "2024-01-15");
        assert_eq!(standardize("2024/01/15"), "2024-01-15");
    }

    #[test]
    fn utc_marker_is_stripped() {
        assert_eq!(standardize("2024-01-15 00:00:00.000 UTC"), "2024-01-15");
        assert_eq!(standardize("2024-03-01 12:00 UTC"), "2024-03-01");
    }

    #[test]
    fn us_wins_over_eu_when_both_fit() {
        assert_eq!(standardize("01/15/2024"), "2024-01-15");
        assert_eq!(standardize("02/03/2024"), "2024-02-03");
        assert_eq!(standardize("15/01/2024"), "2024-01-15");
        assert_eq!(standardize("01/15/2024 08:00"), "2024-01-15");
    }

    #[test]
    fn eu_and_named_month_forms() {
        assert_eq!(standardize("15-01-2024"), "2024-01-15");
        assert_eq!(standardize("15.01.2024"), "2024-01-15");
        assert_eq!(standardize("January 15, 2024"), "2024-01-15");
        assert_eq!(standardize("Jan 15, 2024"), "2024-01-15");
        assert_eq!(standardize("15 January 2024"), "2024-01-15");
        assert_eq!(standardize("5 Feb 2024"), "2024-02-05");
        assert_eq!(standardize("Mar 7 2024"), "2024-03-07");
        assert_eq!(standardize("07-Mar-2024"), "2024-03-07");
    }

    #[test]
    fn compact_form() {
        assert_eq!(standardize("20240115"), "2024-01-15");
        assert_eq!(standardize("20241399"), "20241399");
    }

    #[test]
    fn two_digit_year_lands_in_2000s() {
        assert_eq!(standardize("01/15/23"), "2023-01-15");
        assert_eq!(standardize("15-01-23"), "2015-01-23");
    }

    #[test]
    fn fallback_returns_input_untouched() {
        // Accepted leniency: unknown layouts leak through unchanged.
        assert_eq!(standardize("garbage"), "garbage");
        assert_eq!(standardize("Q1 2024"), "Q1 2024");
        assert_eq!(standardize(" 2024-13-45 "), " 2024-13-45 ");
    }

    #[test]
    fn empty_input() {
        assert_eq!(standardize_date(None), "");
        assert_eq!(standardize_date(Some("")), "");
        assert_eq!(standardize_date(Some("   ")), "");
    }

    #[test]
    fn parse_date_on_canonical_and_garbage() {
        assert_eq!(
            parse_date("2024-02-29"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(parse_date("not a date"), None);
    }
}
