//! Date serial numbers and date/time text parsing
//!
//! A date is a number of days since 1899-12-30 (serial 0); the fractional
//! part is the time of day.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use gridcalc_core::{DateOrder, Locale};
use lazy_regex::regex_captures;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Serials beyond this are not dates (roughly year 9999)
const MAX_SERIAL: f64 = 2_958_465.0;

/// Serial 0
pub fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN)
}

/// Convert a date to its serial number
pub fn date_to_serial(date: NaiveDate) -> f64 {
    (date - epoch()).num_days() as f64
}

/// Convert a date and time to its serial number
pub fn datetime_to_serial(dt: NaiveDateTime) -> f64 {
    let days = date_to_serial(dt.date());
    days + dt.time().num_seconds_from_midnight() as f64 / SECONDS_PER_DAY
}

/// Date part of a serial number
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial.abs() > MAX_SERIAL {
        return None;
    }
    epoch().checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Date and time of a serial number, rounded to the second
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let date = serial_to_date(serial)?;
    let seconds = ((serial - serial.floor()) * SECONDS_PER_DAY).round() as i64;
    date.and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::seconds(seconds))
}

/// Time of day of a serial number as (hours, minutes, seconds)
pub fn serial_to_hms(serial: f64) -> Option<(u32, u32, u32)> {
    let time = serial_to_datetime(serial)?.time();
    Some((time.hour(), time.minute(), time.second()))
}

/// Date serial for a year, month and day, accepting out-of-range months
/// and days the way spreadsheets do (`DATE(2024, 14, 1)` is 2025-02-01)
pub fn serial_from_ymd(year: i32, month: i32, day: i32) -> Option<f64> {
    let months = year as i64 * 12 + (month as i64 - 1);
    let y = months.div_euclid(12) as i32;
    let m = months.rem_euclid(12) as u32 + 1;
    let first = NaiveDate::from_ymd_opt(y, m, 1)?;
    let date = first.checked_add_signed(Duration::days(day as i64 - 1))?;
    Some(date_to_serial(date))
}

/// Add `months` months to a date, clamping the day to the target month
pub fn add_months(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    let total = date.year() as i64 * 12 + date.month0() as i64 + months as i64;
    let year = total.div_euclid(12) as i32;
    let month = total.rem_euclid(12) as u32 + 1;
    let last = last_day_of_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, date.day().min(last))
}

/// Number of days in a month
pub fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let first_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    Some(first_next.pred_opt()?.day())
}

/// Result of parsing date/time text
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDateTime {
    /// Serial number
    pub serial: f64,
    /// Format matching the text that was parsed
    pub format: String,
}

/// Parse a date, a time or a date followed by a time
///
/// Numeric dates follow the locale's component order unless the first
/// component has four digits (`2024-03-01`); separators are `/`, `-` or
/// `.`. Times are `h:mm`, `h:mm:ss` with an optional AM/PM suffix.
pub fn parse_date_time(text: &str, locale: &Locale) -> Option<ParsedDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some((date, date_format)) = parse_date(text, locale) {
        return Some(ParsedDateTime {
            serial: date_to_serial(date),
            format: date_format,
        });
    }
    if let Some((seconds, time_format)) = parse_time(text) {
        return Some(ParsedDateTime {
            serial: seconds / SECONDS_PER_DAY,
            format: time_format,
        });
    }

    let (date_part, time_part) = text.split_once(char::is_whitespace)?;
    let (date, date_format) = parse_date(date_part, locale)?;
    let (seconds, time_format) = parse_time(time_part.trim())?;
    Some(ParsedDateTime {
        serial: date_to_serial(date) + seconds / SECONDS_PER_DAY,
        format: format!("{} {}", date_format, time_format),
    })
}

fn parse_date(text: &str, locale: &Locale) -> Option<(NaiveDate, String)> {
    let (_, a, sep1, b, sep2, c) =
        regex_captures!(r"^(\d{1,4})([/\-.])(\d{1,2})([/\-.])(\d{1,4})$", text)?;
    if sep1 != sep2 {
        return None;
    }
    let (year, month, day) = if a.len() == 4 {
        (a, b, c)
    } else {
        match locale.date_order() {
            DateOrder::MonthDayYear => (c, a, b),
            DateOrder::DayMonthYear => (c, b, a),
            DateOrder::YearMonthDay => (a, b, c),
        }
    };

    let mut year: i32 = year.parse().ok()?;
    if year < 100 {
        year += if year < 30 { 2000 } else { 1900 };
    }
    let date = NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)?;

    let format = if a.len() == 4 {
        format!("yyyy{sep}mm{sep}dd", sep = sep1)
    } else {
        locale.date_format.clone()
    };
    Some((date, format))
}

fn parse_time(text: &str) -> Option<(f64, String)> {
    let (_, h, m, s, meridiem) =
        regex_captures!(r"^(\d{1,2}):(\d{1,2})(?::(\d{1,2}))?\s*([AaPp][Mm])?$", text)?;
    let mut hours: u32 = h.parse().ok()?;
    let minutes: u32 = m.parse().ok()?;
    let seconds: u32 = if s.is_empty() { 0 } else { s.parse().ok()? };

    if !meridiem.is_empty() {
        if hours == 0 || hours > 12 {
            return None;
        }
        let pm = meridiem.eq_ignore_ascii_case("pm");
        hours = match (hours, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
    }
    let time = NaiveTime::from_hms_opt(hours, minutes, seconds)?;

    let mut format = String::from(if s.is_empty() { "hh:mm" } else { "hh:mm:ss" });
    if !meridiem.is_empty() {
        format.push_str(" a");
    }
    Some((time.num_seconds_from_midnight() as f64, format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_serial_conversions() {
        assert_eq!(date_to_serial(ymd(1899, 12, 30)), 0.0);
        assert_eq!(date_to_serial(ymd(1900, 1, 1)), 2.0);
        assert_eq!(date_to_serial(ymd(2024, 1, 15)), 45306.0);
        assert_eq!(serial_to_date(45306.75), Some(ymd(2024, 1, 15)));
        assert_eq!(serial_to_hms(45306.75), Some((18, 0, 0)));
    }

    #[test]
    fn test_serial_from_ymd_overflow() {
        assert_eq!(serial_from_ymd(2024, 14, 1), Some(date_to_serial(ymd(2025, 2, 1))));
        assert_eq!(serial_from_ymd(2024, 3, 0), Some(date_to_serial(ymd(2024, 2, 29))));
        assert_eq!(serial_from_ymd(2024, 0, 1), Some(date_to_serial(ymd(2023, 12, 1))));
    }

    #[test]
    fn test_add_months_clamps() {
        assert_eq!(add_months(ymd(2024, 1, 31), 1), Some(ymd(2024, 2, 29)));
        assert_eq!(add_months(ymd(2024, 3, 15), -3), Some(ymd(2023, 12, 15)));
    }

    #[test]
    fn test_parse_dates() {
        let en = Locale::en_us();
        let parsed = parse_date_time("3/1/2024", &en).unwrap();
        assert_eq!(parsed.serial, date_to_serial(ymd(2024, 3, 1)));
        assert_eq!(parsed.format, "m/d/yyyy");

        let fr = Locale::fr_fr();
        let parsed = parse_date_time("3/1/2024", &fr).unwrap();
        assert_eq!(parsed.serial, date_to_serial(ymd(2024, 1, 3)));

        let parsed = parse_date_time("2024-03-01", &en).unwrap();
        assert_eq!(parsed.serial, date_to_serial(ymd(2024, 3, 1)));
        assert_eq!(parsed.format, "yyyy-mm-dd");

        assert!(parse_date_time("2/30/2024", &en).is_none());
        assert!(parse_date_time("3/1-2024", &en).is_none());
        assert!(parse_date_time("hello", &en).is_none());
    }

    #[test]
    fn test_parse_times() {
        let en = Locale::en_us();
        let parsed = parse_date_time("18:00", &en).unwrap();
        assert_eq!(parsed.serial, 0.75);
        assert_eq!(parsed.format, "hh:mm");

        let parsed = parse_date_time("12:00:00 AM", &en).unwrap();
        assert_eq!(parsed.serial, 0.0);
        assert_eq!(parsed.format, "hh:mm:ss a");

        let parsed = parse_date_time("1/15/2024 6:00 pm", &en).unwrap();
        assert_eq!(parsed.serial, 45306.75);
        assert!(parse_date_time("25:00", &en).is_none());
    }
}
