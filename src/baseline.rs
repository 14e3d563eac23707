//! Baseline reconciliation
//!
//! Decides per user whether observed statistics can be trusted or whether the
//! owner's declared onboarding values take over, then derives the present cycle
//! day and phase. Partner accounts never originate predictions.

use chrono::{NaiveDate, TimeZone};
use tracing::debug;

use crate::config::EngineConfig;
use crate::cycles::Reconstruction;
use crate::normalizer::{add_days, date_at, day_in_range, days_between, round_half_up, LoggedDay};
use crate::ovulation::OvulationPredictor;
use crate::policy::{is_owner, resolve_cycle_and_period_defaults};
use crate::projection::project_cycle_start;
use crate::types::{CyclePhase, CycleStats, UserBaseline};

/// Completed inter-start gaps needed before observed statistics are trusted
pub const RELIABLE_MIN_GAPS: usize = 2;

/// Reconciler for merging observed statistics with a declared baseline
pub struct BaselineReconciler<'a> {
    config: &'a EngineConfig,
}

impl<'a> BaselineReconciler<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Apply the user's baseline to `stats`.
    ///
    /// `days` and `reconstruction` describe the same logged history the stats were
    /// built from. Without an owner baseline the stats are returned unchanged.
    pub fn apply<Tz: TimeZone>(
        &self,
        baseline: Option<&UserBaseline>,
        days: &[LoggedDay],
        reconstruction: &Reconstruction,
        mut stats: CycleStats,
        today: NaiveDate,
        tz: &Tz,
    ) -> CycleStats {
        let Some(baseline) = baseline else {
            return stats;
        };
        if !is_owner(Some(baseline)) {
            return stats;
        }

        let latest_logged_start = reconstruction.last_start();
        let (cycle_length, period_length) = resolve_cycle_and_period_defaults(
            baseline.cycle_length,
            baseline.period_length,
            self.config.default_cycle_length,
            self.config.default_period_length,
        );

        let reliable = reconstruction.completed_gaps() >= RELIABLE_MIN_GAPS;
        if !reliable {
            debug!(
                gaps = reconstruction.completed_gaps(),
                cycle_length, period_length, "observed history sparse, using baseline"
            );
            stats.average_cycle_length = cycle_length as f64;
            stats.median_cycle_length = cycle_length;
            stats.average_period_length = period_length as f64;
            stats.last_period_start = latest_logged_start.or_else(|| {
                baseline
                    .last_period_start
                    .as_ref()
                    .map(|instant| date_at(instant, tz))
            });
        } else if let Some(latest) = latest_logged_start {
            stats.last_period_start = Some(latest);
        }

        if let Some(last_start) = stats.last_period_start {
            if !reliable || stats.next_period_start.is_none() {
                self.predict_from_baseline(&mut stats, last_start, cycle_length, period_length);
            }
        }

        // the cycle day always follows the owner's resolved length, even over reliable data
        stats.current_cycle_day = current_cycle_day(stats.last_period_start, cycle_length, today);
        stats.current_phase = detect_current_phase(&stats, days, today, self.config);

        stats
    }

    fn predict_from_baseline(
        &self,
        stats: &mut CycleStats,
        last_start: NaiveDate,
        cycle_length: i64,
        period_length: i64,
    ) {
        stats.next_period_start = Some(add_days(last_start, cycle_length));

        let predicted_period_length = match round_half_up(stats.average_period_length) {
            length if length > 0 => length,
            _ => period_length,
        };

        match OvulationPredictor::new(self.config.luteal_phase_days).predict(
            last_start,
            cycle_length,
            predicted_period_length,
        ) {
            Some(window) => {
                stats.ovulation_date = Some(window.ovulation_date);
                stats.ovulation_exact = window.exact;
                stats.ovulation_impossible = false;
                stats.fertility_window_start = window.fertility.map(|w| w.start);
                stats.fertility_window_end = window.fertility.map(|w| w.end);
            }
            None => {
                debug!(cycle_length, predicted_period_length, "baseline ovulation impossible");
                stats.ovulation_date = None;
                stats.ovulation_exact = false;
                stats.ovulation_impossible = true;
                stats.fertility_window_start = None;
                stats.fertility_window_end = None;
            }
        }
    }
}

/// Current 1-based cycle day, 0 when no cycle has started yet
fn current_cycle_day(last_start: Option<NaiveDate>, cycle_length: i64, today: NaiveDate) -> i64 {
    let Some(last_start) = last_start else {
        return 0;
    };
    if let Some((_, cycle_day)) = project_cycle_start(last_start, cycle_length, today) {
        return cycle_day;
    }
    if today >= last_start {
        days_between(last_start, today) + 1
    } else {
        0
    }
}

/// Classify today's phase; the first matching rule wins
///
/// `days` may be in any order.
pub fn detect_current_phase(
    stats: &CycleStats,
    days: &[LoggedDay],
    today: NaiveDate,
    config: &EngineConfig,
) -> CyclePhase {
    let logged_period_today = days.iter().any(|day| day.date == today && day.is_period);
    if logged_period_today {
        return CyclePhase::Menstrual;
    }

    let period_length = match round_half_up(stats.average_period_length) {
        length if length > 0 => length,
        _ => config.default_period_length,
    };
    if let Some(last_start) = stats.last_period_start {
        let period_end = add_days(last_start, period_length - 1);
        if day_in_range(today, Some(last_start), Some(period_end)) {
            return CyclePhase::Menstrual;
        }
    }

    if stats.ovulation_impossible {
        return CyclePhase::Unknown;
    }

    match stats.ovulation_date {
        Some(ovulation) if today == ovulation => CyclePhase::Ovulation,
        Some(_) if day_in_range(today, stats.fertility_window_start, stats.fertility_window_end) => {
            CyclePhase::Fertile
        }
        Some(ovulation) if today < ovulation => CyclePhase::Follicular,
        Some(_) => CyclePhase::Luteal,
        None => CyclePhase::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycles::CycleReconstructor;
    use crate::normalizer::{parse_day, DayNormalizer};
    use crate::statistics::StatisticsAggregator;
    use crate::types::{DayRecord, UserRole};
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn day(raw: &str) -> NaiveDate {
        parse_day(raw).unwrap()
    }

    fn at(raw: &str) -> DateTime<Utc> {
        Utc.from_utc_datetime(&day(raw).and_hms_opt(0, 0, 0).unwrap())
    }

    fn period_records(dates: &[&str]) -> Vec<DayRecord> {
        dates
            .iter()
            .enumerate()
            .map(|(index, raw)| DayRecord::new(index as u64 + 1, at(raw), true))
            .collect()
    }

    fn owner(cycle_length: i64, period_length: i64, last_period_start: &str) -> UserBaseline {
        UserBaseline {
            role: UserRole::Owner,
            cycle_length,
            period_length,
            auto_period_fill: true,
            last_period_start: Some(at(last_period_start)),
        }
    }

    fn reconcile(baseline: &UserBaseline, records: &[DayRecord], today: &str) -> CycleStats {
        let config = EngineConfig::default();
        let days = DayNormalizer::normalize(records, &Utc);
        let reconstruction = CycleReconstructor::reconstruct(&days);
        let stats = StatisticsAggregator::observed_stats_from(&reconstruction, &days, day(today), &config);
        BaselineReconciler::new(&config).apply(
            Some(baseline),
            &days,
            &reconstruction,
            stats,
            day(today),
            &Utc,
        )
    }

    #[test]
    fn test_sparse_data_uses_onboarding_values() {
        let baseline = owner(29, 6, "2026-02-07");
        let stats = reconcile(&baseline, &period_records(&["2026-02-07", "2026-02-16"]), "2026-02-17");

        assert_eq!(stats.average_cycle_length, 29.0);
        assert_eq!(stats.median_cycle_length, 29);
        assert_eq!(stats.average_period_length, 6.0);
        assert_eq!(stats.last_period_start, Some(day("2026-02-16")));
        assert_eq!(stats.next_period_start, Some(day("2026-03-17")));
        assert_eq!(stats.current_cycle_day, 2);
        assert_eq!(stats.current_phase, CyclePhase::Menstrual);
    }

    #[test]
    fn test_reliable_data_is_not_overridden() {
        let baseline = owner(29, 6, "2025-03-27");
        let records = period_records(&[
            "2025-01-01",
            "2025-01-02",
            "2025-01-03",
            "2025-01-29",
            "2025-01-30",
            "2025-01-31",
            "2025-02-26",
            "2025-02-27",
            "2025-02-28",
        ]);

        let stats = reconcile(&baseline, &records, "2025-03-05");

        assert_eq!(stats.average_cycle_length, 28.0);
        assert_eq!(stats.median_cycle_length, 28);
        assert_eq!(stats.last_period_start, Some(day("2025-02-26")));
        assert_eq!(stats.next_period_start, Some(day("2025-03-26")));
    }

    #[test]
    fn test_cycle_day_follows_owner_length_over_observed_median() {
        let baseline = owner(35, 5, "2025-02-26");
        let records = period_records(&[
            "2025-01-01",
            "2025-01-02",
            "2025-01-03",
            "2025-01-29",
            "2025-01-30",
            "2025-01-31",
            "2025-02-26",
            "2025-02-27",
            "2025-02-28",
        ]);

        // 40 days after the last start
        let stats = reconcile(&baseline, &records, "2025-04-07");

        assert_eq!(stats.median_cycle_length, 28);
        assert_eq!(stats.current_cycle_day, 6);
    }

    #[test]
    fn test_incompatible_baseline_marks_ovulation_impossible() {
        let baseline = owner(15, 10, "2026-02-10");
        let stats = reconcile(&baseline, &period_records(&["2026-02-10"]), "2026-02-12");

        assert_eq!(stats.ovulation_date, None);
        assert_eq!(stats.fertility_window_start, None);
        assert_eq!(stats.fertility_window_end, None);
        assert!(!stats.ovulation_exact);
        assert!(stats.ovulation_impossible);
        // still inside the declared ten-day period
        assert_eq!(stats.current_phase, CyclePhase::Menstrual);
    }

    #[test]
    fn test_baseline_date_used_without_logs() {
        let baseline = owner(28, 5, "2026-01-20");
        let stats = reconcile(&baseline, &[], "2026-02-01");

        assert_eq!(stats.last_period_start, Some(day("2026-01-20")));
        assert_eq!(stats.next_period_start, Some(day("2026-02-17")));
        assert_eq!(stats.ovulation_date, Some(day("2026-02-03")));
        assert_eq!(stats.current_cycle_day, 13);
        assert_eq!(stats.current_phase, CyclePhase::Fertile);
    }

    #[test]
    fn test_out_of_range_baseline_falls_back_to_defaults() {
        let baseline = owner(200, 0, "2026-01-01");
        let stats = reconcile(&baseline, &[], "2026-01-02");

        assert_eq!(stats.median_cycle_length, 28);
        assert_eq!(stats.average_period_length, 5.0);
        assert_eq!(stats.next_period_start, Some(day("2026-01-29")));
    }

    #[test]
    fn test_stale_history_projects_cycle_day() {
        let baseline = owner(28, 5, "2025-11-01");
        let stats = reconcile(&baseline, &[], "2026-01-05");

        // 65 days elapsed: two whole cycles plus nine days
        assert_eq!(stats.current_cycle_day, 10);
    }

    #[test]
    fn test_partner_is_pass_through() {
        let config = EngineConfig::default();
        let records = period_records(&["2026-02-07", "2026-02-16"]);
        let days = DayNormalizer::normalize(&records, &Utc);
        let reconstruction = CycleReconstructor::reconstruct(&days);
        let observed =
            StatisticsAggregator::observed_stats_from(&reconstruction, &days, day("2026-02-17"), &config);

        let mut partner = owner(29, 6, "2026-02-07");
        partner.role = UserRole::Partner;

        let reconciler = BaselineReconciler::new(&config);
        let from_partner = reconciler.apply(
            Some(&partner),
            &days,
            &reconstruction,
            observed.clone(),
            day("2026-02-17"),
            &Utc,
        );
        let from_nobody =
            reconciler.apply(None, &days, &reconstruction, observed.clone(), day("2026-02-17"), &Utc);

        assert_eq!(from_partner, observed);
        assert_eq!(from_nobody, observed);
    }

    #[test]
    fn test_phase_priority() {
        let config = EngineConfig::default();
        let stats = CycleStats {
            average_period_length: 5.0,
            last_period_start: Some(day("2026-02-10")),
            next_period_start: Some(day("2026-03-10")),
            ovulation_date: Some(day("2026-02-24")),
            fertility_window_start: Some(day("2026-02-19")),
            fertility_window_end: Some(day("2026-02-25")),
            ..Default::default()
        };

        let phase = |raw: &str| detect_current_phase(&stats, &[], day(raw), &config);
        assert_eq!(phase("2026-02-12"), CyclePhase::Menstrual);
        assert_eq!(phase("2026-02-16"), CyclePhase::Follicular);
        assert_eq!(phase("2026-02-20"), CyclePhase::Fertile);
        assert_eq!(phase("2026-02-24"), CyclePhase::Ovulation);
        assert_eq!(phase("2026-02-25"), CyclePhase::Fertile);
        assert_eq!(phase("2026-03-01"), CyclePhase::Luteal);

        // a logged period day wins over everything else
        let logged = [LoggedDay {
            date: day("2026-02-24"),
            record_id: 1,
            is_period: true,
            has_data: true,
        }];
        assert_eq!(
            detect_current_phase(&stats, &logged, day("2026-02-24"), &config),
            CyclePhase::Menstrual
        );

        let impossible = CycleStats {
            ovulation_impossible: true,
            ovulation_date: None,
            ..stats.clone()
        };
        assert_eq!(
            detect_current_phase(&impossible, &[], day("2026-03-01"), &config),
            CyclePhase::Unknown
        );

        let no_ovulation = CycleStats {
            ovulation_date: None,
            ..stats
        };
        assert_eq!(
            detect_current_phase(&no_ovulation, &[], day("2026-03-01"), &config),
            CyclePhase::Unknown
        );
    }

    #[test]
    fn test_phase_ignores_day_order() {
        let config = EngineConfig::default();
        let stats = CycleStats {
            average_period_length: 3.0,
            last_period_start: Some(day("2025-02-26")),
            ovulation_date: Some(day("2025-03-26")),
            ..Default::default()
        };
        let logged = |raw: &str| LoggedDay {
            date: day(raw),
            record_id: 1,
            is_period: true,
            has_data: true,
        };
        let sorted = [logged("2025-02-26"), logged("2025-03-01"), logged("2025-03-20")];
        let shuffled = [logged("2025-03-20"), logged("2025-02-26"), logged("2025-03-01")];

        assert_eq!(
            detect_current_phase(&stats, &sorted, day("2025-03-20"), &config),
            CyclePhase::Menstrual
        );
        assert_eq!(
            detect_current_phase(&stats, &shuffled, day("2025-03-20"), &config),
            CyclePhase::Menstrual
        );
    }
}
