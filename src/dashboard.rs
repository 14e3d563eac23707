//! Dashboard context and cycle-length trend
//!
//! Reference lengths, stale-data and long-cycle warnings, the completed-cycle
//! trend used for charting, and the summary flags shown next to it.

use chrono::{NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::cycles::{CycleReconstructor, Reconstruction};
use crate::normalizer::{date_at, days_between, round_half_up, LoggedDay};
use crate::policy::{is_valid_cycle_length, is_valid_period_length, owner_baseline};
use crate::projection::{upcoming_predictions, UpcomingPrediction};
use crate::types::{CyclePhase, CycleStats, UserBaseline};

/// Days past the reference length before a cycle is flagged as long
pub const LONG_CYCLE_TOLERANCE_DAYS: i64 = 7;

/// Minimum trend points for a trend to count as reliable
pub const RELIABLE_TREND_POINTS: usize = 3;

/// Cycle length the dashboard measures the current cycle against
///
/// Only an owner's declared length counts; a partner baseline is ignored.
pub fn reference_cycle_length(
    baseline: Option<&UserBaseline>,
    stats: &CycleStats,
    config: &EngineConfig,
) -> i64 {
    if let Some(baseline) =
        owner_baseline(baseline).filter(|b| is_valid_cycle_length(b.cycle_length))
    {
        return baseline.cycle_length;
    }
    if stats.median_cycle_length > 0 {
        return stats.median_cycle_length;
    }
    match round_half_up(stats.average_cycle_length) {
        length if length > 0 => length,
        _ => config.default_cycle_length,
    }
}

/// Period length used for dashboard predictions
pub fn predicted_period_length(
    baseline: Option<&UserBaseline>,
    stats: &CycleStats,
    config: &EngineConfig,
) -> i64 {
    if let Some(baseline) =
        owner_baseline(baseline).filter(|b| is_valid_period_length(b.period_length))
    {
        return baseline.period_length;
    }
    match round_half_up(stats.average_period_length) {
        length if length > 0 => length,
        _ => config.default_period_length,
    }
}

pub fn cycle_day_looks_long(current_day: i64, reference_length: i64) -> bool {
    if current_day <= 0 || reference_length <= 0 {
        return false;
    }
    current_day > reference_length + LONG_CYCLE_TOLERANCE_DAYS
}

/// Whether the unprojected cycle day has run past the reference length
pub fn cycle_data_looks_stale(
    anchor: Option<NaiveDate>,
    today: NaiveDate,
    reference_length: i64,
) -> bool {
    let Some(anchor) = anchor else {
        return false;
    };
    if reference_length <= 0 || today < anchor {
        return false;
    }
    days_between(anchor, today) + 1 > reference_length
}

/// Start date staleness is measured from: the declared date, else the stats' last start
pub fn stale_anchor<Tz: TimeZone>(
    baseline: Option<&UserBaseline>,
    stats: &CycleStats,
    tz: &Tz,
) -> Option<NaiveDate> {
    match owner_baseline(baseline).and_then(|b| b.last_period_start.as_ref()) {
        Some(instant) => Some(date_at(instant, tz)),
        None => stats.last_period_start,
    }
}

/// Lengths of cycles completed before `today`, oldest first
pub fn completed_cycle_trend_lengths(days: &[LoggedDay], today: NaiveDate) -> Vec<i64> {
    let reconstruction = CycleReconstructor::reconstruct(days);
    completed_lengths(&reconstruction, today)
}

/// Same as [`completed_cycle_trend_lengths`] over an existing reconstruction
pub fn completed_lengths(reconstruction: &Reconstruction, today: NaiveDate) -> Vec<i64> {
    reconstruction
        .starts
        .windows(2)
        .take_while(|pair| pair[1] < today)
        .map(|pair| days_between(pair[0], pair[1]))
        .collect()
}

/// Keep the trailing `max_points` lengths; 0 keeps everything
pub fn trim_trend(mut lengths: Vec<i64>, max_points: usize) -> Vec<i64> {
    if max_points == 0 || lengths.len() <= max_points {
        return lengths;
    }
    lengths.split_off(lengths.len() - max_points)
}

/// Summary flags shown alongside statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsFlags {
    pub has_observed_cycle_data: bool,
    pub has_trend_data: bool,
    pub has_reliable_trend: bool,
    pub cycle_data_stale: bool,
}

impl StatsFlags {
    pub fn build<Tz: TimeZone>(
        baseline: Option<&UserBaseline>,
        reconstruction: &Reconstruction,
        stats: &CycleStats,
        today: NaiveDate,
        tz: &Tz,
        trend_point_count: usize,
        config: &EngineConfig,
    ) -> Self {
        let reference = reference_cycle_length(baseline, stats, config);
        let anchor = stale_anchor(baseline, stats, tz);

        Self {
            has_observed_cycle_data: reconstruction.completed_gaps() > 0,
            has_trend_data: trend_point_count > 0,
            has_reliable_trend: trend_point_count >= RELIABLE_TREND_POINTS,
            cycle_data_stale: cycle_data_looks_stale(anchor, today, reference),
        }
    }
}

/// Cycle-length trend with the owner's declared length for comparison
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleTrend {
    /// Completed cycle lengths, oldest first
    pub lengths: Vec<i64>,
    /// Declared cycle length, 0 when unavailable
    pub baseline_cycle_length: i64,
    pub flags: StatsFlags,
}

/// Everything the dashboard shows about the current cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardContext {
    pub current_cycle_day: i64,
    pub current_phase: CyclePhase,
    pub reference_cycle_length: i64,
    pub predicted_period_length: i64,
    pub cycle_day_looks_long: bool,
    pub cycle_data_stale: bool,
    pub upcoming: UpcomingPrediction,
}

impl DashboardContext {
    /// Build the dashboard view of reconciled stats
    pub fn build<Tz: TimeZone>(
        baseline: Option<&UserBaseline>,
        stats: &CycleStats,
        today: NaiveDate,
        tz: &Tz,
        config: &EngineConfig,
    ) -> Self {
        let reference = reference_cycle_length(baseline, stats, config);
        let anchor = stale_anchor(baseline, stats, tz);

        Self {
            current_cycle_day: stats.current_cycle_day,
            current_phase: stats.current_phase,
            reference_cycle_length: reference,
            predicted_period_length: predicted_period_length(baseline, stats, config),
            cycle_day_looks_long: cycle_day_looks_long(stats.current_cycle_day, reference),
            cycle_data_stale: cycle_data_looks_stale(anchor, today, reference),
            upcoming: upcoming_predictions(stats, baseline, today, reference, config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::parse_day;
    use crate::types::UserRole;
    use chrono::{DateTime, FixedOffset, Utc};
    use pretty_assertions::assert_eq;

    fn day(raw: &str) -> NaiveDate {
        parse_day(raw).unwrap()
    }

    fn owner(cycle_length: i64, period_length: i64) -> UserBaseline {
        UserBaseline {
            role: UserRole::Owner,
            cycle_length,
            period_length,
            auto_period_fill: false,
            last_period_start: None,
        }
    }

    fn period_days(dates: &[&str]) -> Vec<LoggedDay> {
        dates
            .iter()
            .enumerate()
            .map(|(index, raw)| LoggedDay {
                date: day(raw),
                record_id: index as u64,
                is_period: true,
                has_data: true,
            })
            .collect()
    }

    #[test]
    fn test_reference_cycle_length_fallbacks() {
        let config = EngineConfig::default();
        let mut stats = CycleStats {
            median_cycle_length: 27,
            average_cycle_length: 27.6,
            ..Default::default()
        };

        assert_eq!(reference_cycle_length(Some(&owner(30, 5)), &stats, &config), 30);
        assert_eq!(reference_cycle_length(Some(&owner(200, 5)), &stats, &config), 27);
        stats.median_cycle_length = 0;
        assert_eq!(reference_cycle_length(None, &stats, &config), 28);
        stats.average_cycle_length = 31.2;
        assert_eq!(reference_cycle_length(None, &stats, &config), 31);
        assert_eq!(reference_cycle_length(None, &CycleStats::default(), &config), 28);
    }

    #[test]
    fn test_predicted_period_length_fallbacks() {
        let config = EngineConfig::default();
        let stats = CycleStats {
            average_period_length: 3.5,
            ..Default::default()
        };

        assert_eq!(predicted_period_length(Some(&owner(28, 6)), &stats, &config), 6);
        assert_eq!(predicted_period_length(Some(&owner(28, 0)), &stats, &config), 4);
        assert_eq!(predicted_period_length(None, &CycleStats::default(), &config), 5);
    }

    #[test]
    fn test_partner_baseline_is_ignored_by_dashboard_helpers() {
        let config = EngineConfig::default();
        let stats = CycleStats {
            median_cycle_length: 28,
            average_period_length: 3.0,
            last_period_start: Some(day("2026-01-10")),
            ..Default::default()
        };
        let partner = UserBaseline {
            role: UserRole::Partner,
            last_period_start: Some(
                DateTime::parse_from_rfc3339("2026-02-01T00:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
            ),
            ..owner(40, 12)
        };

        assert_eq!(reference_cycle_length(Some(&partner), &stats, &config), 28);
        assert_eq!(predicted_period_length(Some(&partner), &stats, &config), 3);
        assert_eq!(stale_anchor(Some(&partner), &stats, &Utc), Some(day("2026-01-10")));
    }

    #[test]
    fn test_long_and_stale_warnings() {
        assert!(cycle_day_looks_long(36, 28));
        assert!(!cycle_day_looks_long(35, 28));
        assert!(!cycle_day_looks_long(0, 28));
        assert!(!cycle_day_looks_long(40, 0));

        let anchor = Some(day("2026-01-01"));
        assert!(cycle_data_looks_stale(anchor, day("2026-01-29"), 28));
        assert!(!cycle_data_looks_stale(anchor, day("2026-01-28"), 28));
        assert!(!cycle_data_looks_stale(anchor, day("2025-12-20"), 28));
        assert!(!cycle_data_looks_stale(None, day("2026-03-01"), 28));
    }

    #[test]
    fn test_stale_anchor_prefers_declared_date() {
        let stats = CycleStats {
            last_period_start: Some(day("2026-01-10")),
            ..Default::default()
        };
        let mut baseline = owner(28, 5);

        assert_eq!(stale_anchor(Some(&baseline), &stats, &Utc), Some(day("2026-01-10")));

        baseline.last_period_start = Some(
            DateTime::parse_from_rfc3339("2026-01-31T22:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        );
        let plus_three = FixedOffset::east_opt(3 * 3600).unwrap();
        assert_eq!(stale_anchor(Some(&baseline), &stats, &plus_three), Some(day("2026-02-01")));
        assert_eq!(stale_anchor(Some(&baseline), &stats, &Utc), Some(day("2026-01-31")));
    }

    #[test]
    fn test_trend_stops_at_current_cycle() {
        let days = period_days(&["2026-01-01", "2026-01-02", "2026-01-29", "2026-02-26"]);

        assert_eq!(completed_cycle_trend_lengths(&days, day("2026-02-26")), vec![28]);
        assert_eq!(completed_cycle_trend_lengths(&days, day("2026-02-27")), vec![28, 28]);
        assert!(completed_cycle_trend_lengths(&period_days(&["2026-01-01"]), day("2026-03-01")).is_empty());
    }

    #[test]
    fn test_trim_trend_keeps_trailing_points() {
        assert_eq!(trim_trend(vec![30, 29, 28, 27, 26], 3), vec![28, 27, 26]);
        assert_eq!(trim_trend(vec![30, 29], 3), vec![30, 29]);
        assert_eq!(trim_trend(vec![30, 29, 28], 0), vec![30, 29, 28]);
    }

    #[test]
    fn test_stats_flags() {
        let config = EngineConfig::default();
        let days = period_days(&["2026-01-01", "2026-01-29", "2026-02-26"]);
        let reconstruction = CycleReconstructor::reconstruct(&days);
        let stats = CycleStats {
            median_cycle_length: 28,
            last_period_start: Some(day("2026-02-26")),
            ..Default::default()
        };

        let flags = StatsFlags::build(None, &reconstruction, &stats, day("2026-03-01"), &Utc, 2, &config);
        assert_eq!(
            flags,
            StatsFlags {
                has_observed_cycle_data: true,
                has_trend_data: true,
                has_reliable_trend: false,
                cycle_data_stale: false,
            }
        );

        let flags = StatsFlags::build(None, &reconstruction, &stats, day("2026-04-01"), &Utc, 3, &config);
        assert!(flags.has_reliable_trend);
        assert!(flags.cycle_data_stale);
    }

    #[test]
    fn test_dashboard_context() {
        let config = EngineConfig::default();
        let stats = CycleStats {
            current_cycle_day: 37,
            median_cycle_length: 28,
            average_period_length: 5.0,
            last_period_start: Some(day("2026-01-01")),
            next_period_start: Some(day("2026-01-29")),
            ..Default::default()
        };

        let context = DashboardContext::build(None, &stats, day("2026-02-06"), &Utc, &config);

        assert_eq!(context.reference_cycle_length, 28);
        assert_eq!(context.predicted_period_length, 5);
        assert!(context.cycle_day_looks_long);
        assert!(context.cycle_data_stale);
        assert_eq!(context.upcoming.next_period_start, Some(day("2026-02-26")));
        assert_eq!(context.upcoming.ovulation_date, Some(day("2026-02-12")));
    }
}
