//! Cycle reconstruction
//!
//! Segments the ordered logged days into cycles. Only period-flagged days are
//! walked; a run of at least [`NEW_CYCLE_GAP_DAYS`] empty days between two period
//! days starts a new cycle, so short logging gaps inside one period never split it.

use chrono::NaiveDate;
use std::collections::BTreeSet;

use crate::normalizer::{add_days, days_between, LoggedDay};
use crate::types::Cycle;

/// Empty days between two period days that start a new cycle
pub const NEW_CYCLE_GAP_DAYS: i64 = 5;

/// Days scanned past a cycle start when measuring its period length
pub const PERIOD_LOOKAHEAD_DAYS: i64 = 10;

/// Result of reconstructing cycles from logged days
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconstruction {
    /// Cycle start dates, ascending
    pub starts: Vec<NaiveDate>,
    /// One entry per start
    pub cycles: Vec<Cycle>,
    /// Days between consecutive starts (one fewer than `starts`)
    pub cycle_lengths: Vec<i64>,
}

impl Reconstruction {
    /// Most recent detected cycle start
    pub fn last_start(&self) -> Option<NaiveDate> {
        self.starts.last().copied()
    }

    /// Number of completed inter-start gaps
    pub fn completed_gaps(&self) -> usize {
        self.cycle_lengths.len()
    }
}

/// Reconstructor for turning logged days into cycles
pub struct CycleReconstructor;

impl CycleReconstructor {
    /// Reconstruct cycles from days in any order
    pub fn reconstruct(days: &[LoggedDay]) -> Reconstruction {
        let mut sorted = days.to_vec();
        sorted.sort_by_key(|day| day.date);

        let starts = detect_cycle_starts(&sorted);
        let cycles = build_cycles(&starts, &sorted);
        let cycle_lengths = cycle_lengths(&starts);

        Reconstruction {
            starts,
            cycles,
            cycle_lengths,
        }
    }
}

/// Detect cycle starts from days sorted ascending by date
pub fn detect_cycle_starts(sorted: &[LoggedDay]) -> Vec<NaiveDate> {
    let mut starts = Vec::new();
    let mut previous_period_day: Option<NaiveDate> = None;

    for day in sorted.iter().filter(|day| day.is_period) {
        match previous_period_day {
            None => starts.push(day.date),
            Some(previous) => {
                let gap_days = days_between(previous, day.date) - 1;
                if gap_days >= NEW_CYCLE_GAP_DAYS {
                    starts.push(day.date);
                }
            }
        }
        previous_period_day = Some(day.date);
    }

    starts
}

/// Build cycles for each start, measuring the period length at the start
pub fn build_cycles(starts: &[NaiveDate], days: &[LoggedDay]) -> Vec<Cycle> {
    let period_days: BTreeSet<NaiveDate> = days
        .iter()
        .filter(|day| day.is_period)
        .map(|day| day.date)
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(index, &start)| {
            let end_date = starts.get(index + 1).map(|next| add_days(*next, -1));
            let period_length_days = (0..=PERIOD_LOOKAHEAD_DAYS)
                .take_while(|offset| period_days.contains(&add_days(start, *offset)))
                .count() as i64;

            Cycle {
                start_date: start,
                end_date,
                period_length_days,
            }
        })
        .collect()
}

/// Days between consecutive starts
pub fn cycle_lengths(starts: &[NaiveDate]) -> Vec<i64> {
    starts
        .windows(2)
        .map(|pair| days_between(pair[0], pair[1]))
        .collect()
}
