//! Viewer and onboarding policy
//!
//! Range checks for declared cycle settings and the rules that keep partner
//! accounts from originating predictions or seeing private fields.

use crate::ovulation::ovulation_day_offset;
use crate::types::{DayRecord, UserBaseline, UserRole};

/// Accepted cycle lengths for onboarding values
pub const CYCLE_LENGTH_RANGE: std::ops::RangeInclusive<i64> = 15..=90;

/// Accepted period lengths for onboarding values
pub const PERIOD_LENGTH_RANGE: std::ops::RangeInclusive<i64> = 1..=14;

pub fn is_valid_cycle_length(value: i64) -> bool {
    CYCLE_LENGTH_RANGE.contains(&value)
}

pub fn is_valid_period_length(value: i64) -> bool {
    PERIOD_LENGTH_RANGE.contains(&value)
}

/// Replace out-of-range values with the given defaults
pub fn resolve_cycle_and_period_defaults(
    cycle_length: i64,
    period_length: i64,
    default_cycle_length: i64,
    default_period_length: i64,
) -> (i64, i64) {
    let cycle_length = if is_valid_cycle_length(cycle_length) {
        cycle_length
    } else {
        default_cycle_length
    };
    let period_length = if is_valid_period_length(period_length) {
        period_length
    } else {
        default_period_length
    };
    (cycle_length, period_length)
}

/// Whether a declared combination leaves room for an ovulation day
pub fn is_cycle_combination_compatible(cycle_length: i64, period_length: i64) -> bool {
    is_valid_cycle_length(cycle_length)
        && is_valid_period_length(period_length)
        && ovulation_day_offset(cycle_length, period_length).is_some()
}

pub fn is_owner(baseline: Option<&UserBaseline>) -> bool {
    matches!(baseline, Some(b) if b.role == UserRole::Owner)
}

/// The baseline when it belongs to the data owner; partners count as absent
pub fn owner_baseline(baseline: Option<&UserBaseline>) -> Option<&UserBaseline> {
    baseline.filter(|b| b.role == UserRole::Owner)
}

pub fn is_partner(baseline: Option<&UserBaseline>) -> bool {
    matches!(baseline, Some(b) if b.role == UserRole::Partner)
}

/// Declared cycle length of an owner, 0 when absent or out of range
pub fn owner_baseline_cycle_length(baseline: Option<&UserBaseline>) -> i64 {
    match owner_baseline(baseline) {
        Some(b) if is_valid_cycle_length(b.cycle_length) => b.cycle_length,
        _ => 0,
    }
}

/// Strip notes and symptoms from a record shown to a partner
pub fn sanitize_for_partner(mut record: DayRecord) -> DayRecord {
    record.notes.clear();
    record.symptom_ids.clear();
    record
}

/// Records as the given viewer may see them
pub fn sanitize_for_viewer(viewer: Option<&UserBaseline>, records: Vec<DayRecord>) -> Vec<DayRecord> {
    if !is_partner(viewer) {
        return records;
    }
    records.into_iter().map(sanitize_for_partner).collect()
}
