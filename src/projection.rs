//! Forward projection
//!
//! When the last known cycle start lies several cycle lengths in the past,
//! re-anchors the current cycle on the most recent projected start so the
//! dashboard never reports a next period or ovulation that already passed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::dashboard::predicted_period_length;
use crate::normalizer::{add_days, days_between};
use crate::ovulation::OvulationPredictor;
use crate::types::{CycleStats, UserBaseline};

/// Project `last_start` forward by whole cycles so it is the latest start on or
/// before `today`.
///
/// Returns the projected start and the 1-based day within it. `None` when the
/// cycle length is not positive. A `today` before `last_start` yields
/// `(last_start, 0)`.
pub fn project_cycle_start(
    last_start: NaiveDate,
    cycle_length: i64,
    today: NaiveDate,
) -> Option<(NaiveDate, i64)> {
    if cycle_length <= 0 {
        return None;
    }
    if today < last_start {
        return Some((last_start, 0));
    }

    let elapsed = days_between(last_start, today);
    let cycles_elapsed = elapsed / cycle_length;
    let projected_start = add_days(last_start, cycles_elapsed * cycle_length);
    Some((projected_start, elapsed % cycle_length + 1))
}

/// Advance `cycle_start` by whole cycles until its ovulation is no longer before `today`
pub fn shift_to_future_ovulation(
    cycle_start: NaiveDate,
    ovulation_date: NaiveDate,
    cycle_length: i64,
    today: NaiveDate,
) -> NaiveDate {
    if cycle_length <= 0 || ovulation_date >= today {
        return cycle_start;
    }
    let lag = days_between(ovulation_date, today);
    let shift_cycles = lag / cycle_length + 1;
    add_days(cycle_start, shift_cycles * cycle_length)
}

/// Next period and ovulation as shown on the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingPrediction {
    pub next_period_start: Option<NaiveDate>,
    pub ovulation_date: Option<NaiveDate>,
    pub ovulation_exact: bool,
    pub ovulation_impossible: bool,
}

impl UpcomingPrediction {
    fn from_stats(stats: &CycleStats) -> Self {
        Self {
            next_period_start: stats.next_period_start,
            ovulation_date: stats.ovulation_date,
            ovulation_exact: stats.ovulation_exact,
            ovulation_impossible: stats.ovulation_impossible,
        }
    }
}

/// Re-anchor the stats' predictions on the cycle containing `today`.
///
/// Falls back to the stats' own values when there is no last start or no
/// positive cycle length.
pub fn upcoming_predictions(
    stats: &CycleStats,
    baseline: Option<&UserBaseline>,
    today: NaiveDate,
    cycle_length: i64,
    config: &EngineConfig,
) -> UpcomingPrediction {
    let Some(last_start) = stats.last_period_start else {
        return UpcomingPrediction::from_stats(stats);
    };
    let Some((mut cycle_start, _)) = project_cycle_start(last_start, cycle_length, today) else {
        return UpcomingPrediction::from_stats(stats);
    };

    let predictor = OvulationPredictor::new(config.luteal_phase_days);
    let period_length = predicted_period_length(baseline, stats, config);

    let mut window = predictor.predict(cycle_start, cycle_length, period_length);
    if let Some(current) = window {
        if current.ovulation_date < today {
            cycle_start =
                shift_to_future_ovulation(cycle_start, current.ovulation_date, cycle_length, today);
            debug!(%cycle_start, "ovulation already passed, shifted to next cycle");
            window = predictor.predict(cycle_start, cycle_length, period_length);
        }
    }

    let next_period_start = Some(add_days(cycle_start, cycle_length));
    match window {
        Some(window) => UpcomingPrediction {
            next_period_start,
            ovulation_date: Some(window.ovulation_date),
            ovulation_exact: window.exact,
            ovulation_impossible: false,
        },
        None => UpcomingPrediction {
            next_period_start,
            ovulation_date: None,
            ovulation_exact: false,
            ovulation_impossible: true,
        },
    }
}
