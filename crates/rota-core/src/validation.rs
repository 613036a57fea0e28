//! Input checks applied before anything reaches the rotation engine.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::ValidationError;

/// Accepted date layouts, tried in order. Two-digit years come first so that
/// `9/15/18` is read as 2018 rather than year 18.
const DATE_FORMATS: [&str; 2] = ["%m/%d/%y", "%m/%d/%Y"];

/// Also accepted between date fields, read as `/`.
const DATE_SEPARATORS: [char; 3] = ['-', ' ', '.'];

/// Check a release name of the form `YY.M.N` (e.g. `18.9.1`, `18.10.2`).
///
/// Returns the trimmed name.
pub fn validate_release_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    let invalid = || ValidationError::InvalidReleaseName(name.to_string());

    let parts: Vec<&str> = name.split('.').collect();
    let [year, month, number] = parts[..] else {
        return Err(invalid());
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if year.len() != 2 || !all_digits(year) {
        return Err(invalid());
    }
    if !(1..=2).contains(&month.len()) || !all_digits(month) {
        return Err(invalid());
    }
    if number.len() != 1 || !all_digits(number) {
        return Err(invalid());
    }
    Ok(name.to_string())
}

/// Parse an `HH:MM` time of day.
pub fn parse_start_time(input: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M")
        .map_err(|_| ValidationError::InvalidTime(input.to_string()))
}

/// Parse a calendar date (`M/D/YY` or `M/D/YYYY`, fields separated by `/`,
/// `-`, `.` or a space) into the instant the release goes live:
/// `start_time` local time on that day.
///
/// Rejects dates whose start instant is not after `now`.
pub fn parse_release_date(
    input: &str,
    start_time: NaiveTime,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = input.trim();
    let normalized = trimmed.replace(DATE_SEPARATORS, "/");
    let date = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&normalized, fmt).ok())
        .ok_or_else(|| ValidationError::InvalidDate(input.to_string()))?;

    // `earliest` resolves the repeated hour when clocks go back; a start time
    // skipped by clocks going forward has no instant at all.
    let local = Local
        .from_local_datetime(&date.and_time(start_time))
        .earliest()
        .ok_or_else(|| ValidationError::InvalidDate(input.to_string()))?;
    let instant = local.with_timezone(&Utc);

    if instant <= now {
        return Err(ValidationError::DateInPast(trimmed.to_string()));
    }
    Ok(instant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn nine_pm() -> NaiveTime {
        NaiveTime::from_hms_opt(21, 0, 0).unwrap()
    }

    fn jan_2018() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn release_names() {
        for ok in ["18.9.1", "18.10.2", " 19.1.0 "] {
            assert!(validate_release_name(ok).is_ok(), "{ok}");
        }
        for bad in ["", "18.9", "18.9.10", "2018.9.1", "18.100.1", "a8.9.1", "18..1", "18.9.1.1"] {
            assert_eq!(
                validate_release_name(bad),
                Err(ValidationError::InvalidReleaseName(bad.trim().to_string())),
                "{bad}"
            );
        }
    }

    #[test]
    fn start_time_parsing() {
        assert_eq!(parse_start_time("21:00").unwrap(), nine_pm());
        assert!(parse_start_time("9pm").is_err());
        assert!(parse_start_time("25:00").is_err());
    }

    #[test]
    fn both_year_layouts_land_on_the_same_evening() {
        let short = parse_release_date("9/15/18", nine_pm(), jan_2018()).unwrap();
        let long = parse_release_date("09/15/2018", nine_pm(), jan_2018()).unwrap();
        assert_eq!(short, long);

        let local = short.with_timezone(&Local);
        assert_eq!((local.year(), local.month(), local.day()), (2018, 9, 15));
        assert_eq!((local.hour(), local.minute()), (21, 0));
    }

    #[test]
    fn dash_dot_and_space_separators_are_accepted() {
        let slash = parse_release_date("9/15/18", nine_pm(), jan_2018()).unwrap();
        for input in ["9-15-18", "09.15.2018", "9 15 18", "9-15/2018"] {
            assert_eq!(parse_release_date(input, nine_pm(), jan_2018()), Ok(slash), "{input}");
        }
    }

    #[test]
    fn past_and_malformed_dates_are_rejected() {
        assert_eq!(
            parse_release_date("12/30/17", nine_pm(), jan_2018()),
            Err(ValidationError::DateInPast("12/30/17".into()))
        );
        for bad in ["tomorrow", "2018-09-15", "13/1/18", "2/30/18", "9_15_18"] {
            assert_eq!(
                parse_release_date(bad, nine_pm(), jan_2018()),
                Err(ValidationError::InvalidDate(bad.into())),
                "{bad}"
            );
        }
    }
}
