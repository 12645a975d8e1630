//! Wall-clock formatting without a date library.

use std::time::SystemTime;

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Current UTC time as RFC 3339, e.g. `2024-01-01T12:30:00Z`.
pub(crate) fn now_rfc3339() -> String {
    format_rfc3339(unix_secs())
}

/// Current UTC time of day, e.g. `12:30:00`.
pub(crate) fn time_of_day() -> String {
    format_time_of_day(unix_secs())
}

fn format_time_of_day(secs: u64) -> String {
    let time_of_day = secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

fn format_rfc3339(secs: u64) -> String {
    let (year, month, day) = days_to_ymd(secs / 86400);
    format!("{year:04}-{month:02}-{day:02}T{}Z", format_time_of_day(secs))
}

/// Convert days since the Unix epoch to a proleptic Gregorian date.
fn days_to_ymd(days: u64) -> (u64, u64, u64) {
    // Shift the epoch to 0000-03-01 so leap days fall at the end of a year
    let z = days + 719_468;
    let era = z / 146_097;
    let day_of_era = z % 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let mp = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = year_of_era + era * 400 + u64::from(month <= 2);
    (year, month, day)
}
