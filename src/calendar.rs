//! Calendar projection
//!
//! Paints a Sunday-first month grid with logged, predicted, fertile and
//! ovulation days, laying predicted cycles forward from the next expected
//! period until the grid is covered.

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::EngineConfig;
use crate::normalizer::{add_days, date_at, round_half_up, DayNormalizer, LoggedDay};
use crate::ovulation::OvulationPredictor;
use crate::types::{CalendarDayState, CycleStats, DayRecord};

/// Days loaded around a month so neighbouring grid cells and cycles are covered
pub const CALENDAR_LOG_MARGIN_DAYS: i64 = 70;

/// First and last day of the month containing `day`
pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = day.with_day(1).unwrap_or(day);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(first);
    (first, last)
}

/// Sunday on or before the month start through the Saturday on or after the month end
pub fn grid_bounds(month_start: NaiveDate) -> (NaiveDate, NaiveDate) {
    let (first, last) = month_bounds(month_start);
    let grid_start = add_days(first, -(first.weekday().num_days_from_sunday() as i64));
    let grid_end = add_days(last, 6 - last.weekday().num_days_from_sunday() as i64);
    (grid_start, grid_end)
}

/// Record window callers should load to render the month containing `month_start`
pub fn calendar_log_range(month_start: NaiveDate) -> (NaiveDate, NaiveDate) {
    let (first, last) = month_bounds(month_start);
    (
        add_days(first, -CALENDAR_LOG_MARGIN_DAYS),
        add_days(last, CALENDAR_LOG_MARGIN_DAYS),
    )
}

/// Cycle length used for every projected cycle: median, then rounded average, then default
pub fn recurring_cycle_length(stats: &CycleStats, config: &EngineConfig) -> i64 {
    if stats.median_cycle_length > 0 {
        return stats.median_cycle_length;
    }
    match round_half_up(stats.average_cycle_length) {
        length if length > 0 => length,
        _ => config.default_cycle_length,
    }
}

/// Period length used for every projected cycle: rounded average, then default
pub fn recurring_period_length(stats: &CycleStats, config: &EngineConfig) -> i64 {
    match round_half_up(stats.average_period_length) {
        length if length > 0 => length,
        _ => config.default_period_length,
    }
}

/// Day markers collected before the grid is rendered
#[derive(Debug, Default)]
struct DayMarks {
    predicted: BTreeSet<NaiveDate>,
    fertility: BTreeSet<NaiveDate>,
    ovulation: BTreeSet<NaiveDate>,
}

impl DayMarks {
    fn mark_fertility(&mut self, start: NaiveDate, end: NaiveDate) {
        let mut day = start;
        while day <= end {
            self.fertility.insert(day);
            day = add_days(day, 1);
        }
    }
}

/// Projector for month calendar grids
pub struct CalendarProjector;

impl CalendarProjector {
    /// Build the day states for the month containing `month_start`.
    ///
    /// `records` may contain duplicates per day; the latest record decides the
    /// period flag while any record can contribute data.
    pub fn build<Tz: TimeZone>(
        month_start: NaiveDate,
        records: &[DayRecord],
        stats: &CycleStats,
        now: DateTime<Utc>,
        tz: &Tz,
        config: &EngineConfig,
    ) -> Vec<CalendarDayState> {
        let (first, _) = month_bounds(month_start);
        let (grid_start, grid_end) = grid_bounds(first);

        let logged: BTreeMap<NaiveDate, LoggedDay> = DayNormalizer::normalize(records, tz)
            .into_iter()
            .map(|day| (day.date, day))
            .collect();
        let marks = Self::project_marks(stats, grid_end, config);
        let today = date_at(&now, tz);

        let mut states = Vec::with_capacity(42);
        let mut day = grid_start;
        while day <= grid_end {
            let entry = logged.get(&day);
            let is_ovulation = marks.ovulation.contains(&day);

            states.push(CalendarDayState {
                date: day,
                day: day.day(),
                in_month: day.month() == first.month() && day.year() == first.year(),
                is_today: day == today,
                is_period: entry.map_or(false, |e| e.is_period),
                is_predicted: marks.predicted.contains(&day),
                is_fertility: !is_ovulation && marks.fertility.contains(&day),
                is_ovulation,
                has_data: entry.map_or(false, |e| e.has_data),
            });
            day = add_days(day, 1);
        }

        states
    }

    fn project_marks(stats: &CycleStats, grid_end: NaiveDate, config: &EngineConfig) -> DayMarks {
        let mut marks = DayMarks::default();

        if let (Some(start), Some(end)) = (stats.fertility_window_start, stats.fertility_window_end) {
            marks.mark_fertility(start, end);
        }
        if let Some(ovulation) = stats.ovulation_date {
            marks.ovulation.insert(ovulation);
        }

        let Some(next_period_start) = stats.next_period_start else {
            return marks;
        };

        let cycle_length = recurring_cycle_length(stats, config);
        let period_length = recurring_period_length(stats, config);
        let predictor = OvulationPredictor::new(config.luteal_phase_days);

        let mut cycle_start = next_period_start;
        while cycle_start <= grid_end {
            for offset in 0..period_length {
                marks.predicted.insert(add_days(cycle_start, offset));
            }

            if let Some(window) = predictor.predict(cycle_start, cycle_length, period_length) {
                marks.ovulation.insert(window.ovulation_date);
                if let Some(fertility) = window.fertility {
                    marks.mark_fertility(fertility.start, fertility.end);
                }
            }

            cycle_start = add_days(cycle_start, cycle_length);
        }

        marks
    }
}

/// Build the calendar grid for the month containing `month_start`
pub fn build_calendar_day_states<Tz: TimeZone>(
    month_start: NaiveDate,
    records: &[DayRecord],
    stats: &CycleStats,
    now: DateTime<Utc>,
    tz: &Tz,
    config: &EngineConfig,
) -> Vec<CalendarDayState> {
    CalendarProjector::build(month_start, records, stats, now, tz, config)
}
