//! RFC 3339 parsing and formatting for date scalars.
//!
//! Date scalars are carried as microseconds since the Unix epoch (UTC). Views
//! render them as RFC 3339 strings when a [`DateTimeConverter`] is installed,
//! and incoming strings are coerced back through [`parse_datetime`].
//!
//! [`DateTimeConverter`]: crate::convert::DateTimeConverter

use thiserror::Error;

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MINUTE;
const MICROS_PER_DAY: i64 = 24 * MICROS_PER_HOUR;

/// Error for strings that are not valid RFC 3339 dates or datetimes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid RFC 3339 {what}: {input:?}")]
pub struct DateTimeParseError {
    pub what: &'static str,
    pub input: String,
}

impl DateTimeParseError {
    fn new(what: &'static str, input: &str) -> Self {
        Self {
            what,
            input: input.to_string(),
        }
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian date (Hinnant's algorithm).
fn days_from_civil(year: i32, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year as i64 - 1 } else { year as i64 };
    let m = month as i64;
    let era = (if y >= 0 { y } else { y - 399 }) / 400;
    let yoe = y - era * 400;
    let mp = if m > 2 { m - 3 } else { m + 9 };
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = (yoe + era * 400 + i64::from(month <= 2)) as i32;
    (year, month, day)
}

fn parse_digits<T: std::str::FromStr>(s: &str, what: &'static str, input: &str) -> Result<T, DateTimeParseError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DateTimeParseError::new(what, input));
    }
    s.parse().map_err(|_| DateTimeParseError::new(what, input))
}

/// Parses `Z`, `+HH:MM` or `-HH:MM` into an offset in minutes.
fn parse_offset(offset: &str, input: &str) -> Result<i64, DateTimeParseError> {
    if offset == "Z" || offset == "z" {
        return Ok(0);
    }
    let bytes = offset.as_bytes();
    if bytes.len() != 6 || bytes[3] != b':' {
        return Err(DateTimeParseError::new("offset", input));
    }
    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return Err(DateTimeParseError::new("offset", input)),
    };
    let hours: i64 = parse_digits(&offset[1..3], "offset", input)?;
    let minutes: i64 = parse_digits(&offset[4..6], "offset", input)?;
    if hours > 23 || minutes > 59 {
        return Err(DateTimeParseError::new("offset", input));
    }
    Ok(sign * (hours * 60 + minutes))
}

fn parse_date_part(date: &str, input: &str) -> Result<i64, DateTimeParseError> {
    let bytes = date.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return Err(DateTimeParseError::new("date", input));
    }
    let year: i32 = parse_digits(&date[..4], "year", input)?;
    let month: u32 = parse_digits(&date[5..7], "month", input)?;
    let day: u32 = parse_digits(&date[8..10], "day", input)?;
    if !(1..=12).contains(&month) {
        return Err(DateTimeParseError::new("month", input));
    }
    if day == 0 || day > days_in_month(year, month) {
        return Err(DateTimeParseError::new("day", input));
    }
    Ok(days_from_civil(year, month, day))
}

/// Parses an RFC 3339 datetime (or a bare `YYYY-MM-DD` date, taken as
/// midnight UTC) into microseconds since the Unix epoch.
pub fn parse_datetime(input: &str) -> Result<i64, DateTimeParseError> {
    // RFC 3339 is ASCII, so every byte offset sliced below is a char boundary.
    if input.len() < 10 || !input.is_ascii() {
        return Err(DateTimeParseError::new("datetime", input));
    }
    let days = parse_date_part(&input[..10], input)?;
    if input.len() == 10 {
        return Ok(days * MICROS_PER_DAY);
    }

    let sep = input.as_bytes()[10];
    if sep != b'T' && sep != b't' && sep != b' ' {
        return Err(DateTimeParseError::new("datetime", input));
    }
    let time = &input[11..];
    let tb = time.as_bytes();
    if tb.len() < 8 || tb[2] != b':' || tb[5] != b':' {
        return Err(DateTimeParseError::new("time", input));
    }
    let hours: i64 = parse_digits(&time[..2], "hours", input)?;
    let minutes: i64 = parse_digits(&time[3..5], "minutes", input)?;
    let seconds: i64 = parse_digits(&time[6..8], "seconds", input)?;
    if hours > 23 || minutes > 59 || seconds > 60 {
        return Err(DateTimeParseError::new("time", input));
    }

    let mut rest = &time[8..];
    let mut fraction = 0i64;
    if let Some(stripped) = rest.strip_prefix('.') {
        let end = stripped
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(stripped.len());
        if end == 0 {
            return Err(DateTimeParseError::new("fraction", input));
        }
        let digits = &stripped[..end];
        // Truncate to microsecond precision.
        let mut micros = String::with_capacity(6);
        micros.extend(digits.chars().take(6));
        while micros.len() < 6 {
            micros.push('0');
        }
        fraction = parse_digits(&micros, "fraction", input)?;
        rest = &stripped[end..];
    }

    let offset = if rest.is_empty() { 0 } else { parse_offset(rest, input)? };

    let local = days * MICROS_PER_DAY
        + hours * MICROS_PER_HOUR
        + minutes * MICROS_PER_MINUTE
        + seconds.min(59) * MICROS_PER_SECOND
        + fraction;
    Ok(local - offset * MICROS_PER_MINUTE)
}

/// Formats microseconds since the Unix epoch as an RFC 3339 UTC datetime.
///
/// Fractional seconds are omitted when zero and trimmed of trailing zeros
/// otherwise.
pub fn format_datetime(epoch_micros: i64) -> String {
    let days = epoch_micros.div_euclid(MICROS_PER_DAY);
    let time = epoch_micros.rem_euclid(MICROS_PER_DAY);
    let (year, month, day) = civil_from_days(days);

    let hours = time / MICROS_PER_HOUR;
    let minutes = (time % MICROS_PER_HOUR) / MICROS_PER_MINUTE;
    let seconds = (time % MICROS_PER_MINUTE) / MICROS_PER_SECOND;
    let micros = time % MICROS_PER_SECOND;

    let mut out = format!("{year:04}-{month:02}-{day:02}T{hours:02}:{minutes:02}:{seconds:02}");
    if micros != 0 {
        let frac = format!("{micros:06}");
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out.push('Z');
    out
}
