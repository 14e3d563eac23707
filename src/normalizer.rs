//! Day normalization
//!
//! Every date the engine compares is a calendar day in the caller's location.
//! This module turns stored instants into those days, collapses duplicate records
//! for the same day, and holds the small date and rounding helpers shared by the
//! other stages.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use std::collections::BTreeMap;

use crate::error::EngineError;
use crate::types::DayRecord;

/// One calendar day after duplicate records have been collapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggedDay {
    pub date: NaiveDate,
    /// Identifier of the record that won the day
    pub record_id: u64,
    /// Period flag of the winning record
    pub is_period: bool,
    /// Any record for the day carries data
    pub has_data: bool,
}

/// Normalizer for converting stored records into ordered calendar days
pub struct DayNormalizer;

impl DayNormalizer {
    /// Collapse records into one entry per calendar day, ascending by date.
    ///
    /// Duplicates for the same day are folded with [`pick_latest`].
    pub fn normalize<Tz: TimeZone>(records: &[DayRecord], tz: &Tz) -> Vec<LoggedDay> {
        let mut by_day: BTreeMap<NaiveDate, (&DayRecord, bool)> = BTreeMap::new();

        for record in records {
            let day = date_at(&record.date, tz);
            by_day
                .entry(day)
                .and_modify(|(winner, has_data)| {
                    *winner = pick_latest(*winner, record);
                    *has_data |= record.has_data();
                })
                .or_insert((record, record.has_data()));
        }

        by_day
            .into_iter()
            .map(|(date, (record, has_data))| LoggedDay {
                date,
                record_id: record.id,
                is_period: record.is_period,
                has_data,
            })
            .collect()
    }
}

/// Pick the record that represents a day: the later instant wins, ties go to the
/// higher identifier.
pub fn pick_latest<'a>(existing: &'a DayRecord, candidate: &'a DayRecord) -> &'a DayRecord {
    if candidate.date > existing.date
        || (candidate.date == existing.date && candidate.id > existing.id)
    {
        candidate
    } else {
        existing
    }
}

/// Calendar day of an instant in the given location
pub fn date_at<Tz: TimeZone>(instant: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// Whole days from `from` to `to` (negative when `to` is earlier)
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Shift a calendar day by a number of days
pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date + Duration::days(days)
}

/// Round half up by adding 0.5 and truncating. Inputs are non-negative day counts.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5) as i64
}

/// Inclusive range check; false when either bound is absent
pub fn day_in_range(day: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    match (start, end) {
        (Some(start), Some(end)) => day >= start && day <= end,
        _ => false,
    }
}

/// Parse a `YYYY-MM-DD` calendar day
pub fn parse_day(raw: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| EngineError::DateParseError(format!("{raw}: {e}")))
}

/// Parse a location given as `UTC`, `Z`, or a fixed offset such as `+03:00`, `-0530`, `+02`.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset, EngineError> {
    let trimmed = raw.trim();
    let invalid = || EngineError::InvalidTimezone(raw.to_string());

    if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" || trimmed.is_empty() {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match trimmed.as_bytes()[0] {
        b'+' => (1, &trimmed[1..]),
        b'-' => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().map_err(|_| invalid())?, 0),
        4 => (
            digits[..2].parse::<i32>().map_err(|_| invalid())?,
            digits[2..].parse::<i32>().map_err(|_| invalid())?,
        ),
        _ => return Err(invalid()),
    };

    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
