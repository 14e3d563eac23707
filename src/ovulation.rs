//! Ovulation and fertility window prediction
//!
//! Maps a (cycle length, period length) pair to an ovulation day and a fertile
//! window. Combinations where the period leaves no room for a luteal phase are
//! reported as not calculable instead of producing a false date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::normalizer::add_days;

/// Default luteal phase length in days
pub const DEFAULT_LUTEAL_PHASE_DAYS: i64 = 14;

/// Below this many days after the period, ovulation cannot be placed
pub const MIN_REMAINING_DAYS: i64 = 8;

/// From this many days after the period, the luteal-phase rule applies
pub const STANDARD_RULE_REMAINING_DAYS: i64 = 15;

/// Fertile days before ovulation
pub const FERTILE_DAYS_BEFORE: i64 = 5;

/// Fertile days after ovulation
pub const FERTILE_DAYS_AFTER: i64 = 1;

/// Ovulation placement relative to the period start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OvulationOffset {
    /// Days after the period start
    pub days: i64,
    /// Derived from the luteal-phase rule rather than the short-cycle fallback
    pub exact: bool,
}

/// Inclusive fertile window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FertilityWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FertilityWindow {
    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.start && day <= self.end
    }

    /// Every day in the window, ascending
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..=(self.end - self.start).num_days()).map(move |offset| add_days(start, offset))
    }
}

/// Ovulation prediction for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleWindow {
    pub ovulation_date: NaiveDate,
    /// Absent when clamping left no fertile days
    pub fertility: Option<FertilityWindow>,
    pub exact: bool,
}

/// Ovulation offset for a cycle, `None` when the combination is infeasible.
///
/// Uses the default luteal phase length.
pub fn ovulation_day_offset(cycle_length: i64, period_length: i64) -> Option<OvulationOffset> {
    OvulationPredictor::default().offset(cycle_length, period_length)
}

/// Predict ovulation and fertility for the cycle starting at `period_start`.
///
/// Uses the default luteal phase length.
pub fn predict_cycle_window(
    period_start: NaiveDate,
    cycle_length: i64,
    period_length: i64,
) -> Option<CycleWindow> {
    OvulationPredictor::default().predict(period_start, cycle_length, period_length)
}

/// Predictor parameterized by the luteal phase length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OvulationPredictor {
    luteal_phase_days: i64,
}

impl Default for OvulationPredictor {
    fn default() -> Self {
        Self::new(DEFAULT_LUTEAL_PHASE_DAYS)
    }
}

impl OvulationPredictor {
    /// Create a predictor; non-positive lengths fall back to the default
    pub fn new(luteal_phase_days: i64) -> Self {
        let luteal_phase_days = if luteal_phase_days <= 0 {
            DEFAULT_LUTEAL_PHASE_DAYS
        } else {
            luteal_phase_days
        };
        Self { luteal_phase_days }
    }

    pub fn luteal_phase_days(&self) -> i64 {
        self.luteal_phase_days
    }

    /// Ovulation offset in days after the period start
    pub fn offset(&self, cycle_length: i64, period_length: i64) -> Option<OvulationOffset> {
        debug_assert!(cycle_length >= 0, "negative cycle length");
        debug_assert!(period_length >= 0, "negative period length");

        let remaining = cycle_length - period_length;
        if remaining < MIN_REMAINING_DAYS {
            return None;
        }

        if remaining < STANDARD_RULE_REMAINING_DAYS {
            return Some(OvulationOffset {
                days: period_length + 1,
                exact: false,
            });
        }

        let days = (cycle_length - self.luteal_phase_days)
            .max(period_length + 1)
            .min(cycle_length - 1);
        Some(OvulationOffset { days, exact: true })
    }

    /// Predict ovulation and fertility for the cycle starting at `period_start`
    pub fn predict(
        &self,
        period_start: NaiveDate,
        cycle_length: i64,
        period_length: i64,
    ) -> Option<CycleWindow> {
        let Some(offset) = self.offset(cycle_length, period_length) else {
            trace!(cycle_length, period_length, "ovulation not calculable");
            return None;
        };

        let period_end = add_days(period_start, period_length - 1);
        let next_period_start = add_days(period_start, cycle_length);

        let mut ovulation_date = add_days(period_start, offset.days);
        if ovulation_date >= next_period_start {
            ovulation_date = add_days(next_period_start, -1);
        }
        if ovulation_date <= period_end {
            trace!(cycle_length, period_length, "ovulation collapsed into period");
            return None;
        }

        let mut fertility_start = add_days(ovulation_date, -FERTILE_DAYS_BEFORE);
        if fertility_start <= period_end {
            fertility_start = add_days(period_end, 1);
        }
        let mut fertility_end = add_days(ovulation_date, FERTILE_DAYS_AFTER);
        if fertility_end >= next_period_start {
            fertility_end = add_days(next_period_start, -1);
        }

        let fertility = (fertility_start <= fertility_end).then_some(FertilityWindow {
            start: fertility_start,
            end: fertility_end,
        });

        Some(CycleWindow {
            ovulation_date,
            fertility,
            exact: offset.exact,
        })
    }
}
