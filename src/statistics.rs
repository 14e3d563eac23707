//! Cycle statistics
//!
//! Central-tendency statistics over the most recent reconstructed cycles, and the
//! purely observed [`CycleStats`] built from them before any baseline is applied.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::baseline::detect_current_phase;
use crate::config::EngineConfig;
use crate::cycles::{CycleReconstructor, Reconstruction};
use crate::normalizer::{add_days, days_between, round_half_up, LoggedDay};
use crate::ovulation::OvulationPredictor;
use crate::types::CycleStats;

/// Number of most recent cycles the statistics look at
pub const STATISTICS_WINDOW: usize = 6;

/// Averages over the statistics window. All zero when no gap is known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub average_cycle_length: f64,
    pub median_cycle_length: i64,
    pub average_period_length: f64,
}

/// Aggregator for cycle statistics
pub struct StatisticsAggregator;

impl StatisticsAggregator {
    /// Summarize the most recent cycles of a reconstruction
    pub fn summarize(reconstruction: &Reconstruction) -> CycleSummary {
        let recent_lengths = tail(&reconstruction.cycle_lengths, STATISTICS_WINDOW);
        if recent_lengths.is_empty() {
            return CycleSummary::default();
        }

        let period_lengths: Vec<i64> = reconstruction
            .cycles
            .iter()
            .map(|cycle| cycle.period_length_days)
            .filter(|length| *length > 0)
            .collect();

        CycleSummary {
            average_cycle_length: mean(recent_lengths),
            median_cycle_length: median(recent_lengths),
            average_period_length: mean(tail(&period_lengths, STATISTICS_WINDOW)),
        }
    }

    /// Build stats from logged history alone
    pub fn observed_stats(days: &[LoggedDay], today: NaiveDate, config: &EngineConfig) -> CycleStats {
        let reconstruction = CycleReconstructor::reconstruct(days);
        Self::observed_stats_from(&reconstruction, days, today, config)
    }

    /// Build stats from an existing reconstruction of `days`
    pub fn observed_stats_from(
        reconstruction: &Reconstruction,
        days: &[LoggedDay],
        today: NaiveDate,
        config: &EngineConfig,
    ) -> CycleStats {
        let mut stats = CycleStats::default();
        let Some(last_start) = reconstruction.last_start() else {
            return stats;
        };

        let summary = Self::summarize(reconstruction);
        stats.average_cycle_length = summary.average_cycle_length;
        stats.median_cycle_length = summary.median_cycle_length;
        stats.average_period_length = summary.average_period_length;
        stats.last_period_start = Some(last_start);

        let cycle_length = if summary.median_cycle_length > 0 {
            summary.median_cycle_length
        } else {
            config.default_cycle_length
        };
        let period_length = match round_half_up(summary.average_period_length) {
            length if length > 0 => length,
            _ => config.default_period_length,
        };

        stats.next_period_start = Some(add_days(last_start, cycle_length));
        match OvulationPredictor::new(config.luteal_phase_days).predict(
            last_start,
            cycle_length,
            period_length,
        ) {
            Some(window) => {
                stats.ovulation_date = Some(window.ovulation_date);
                stats.ovulation_exact = window.exact;
                stats.fertility_window_start = window.fertility.map(|w| w.start);
                stats.fertility_window_end = window.fertility.map(|w| w.end);
            }
            None => stats.ovulation_impossible = true,
        }

        if today >= last_start {
            stats.current_cycle_day = days_between(last_start, today) + 1;
        }
        stats.current_phase = detect_current_phase(&stats, days, today, config);

        stats
    }
}

fn tail(values: &[i64], n: usize) -> &[i64] {
    &values[values.len().saturating_sub(n)..]
}

fn mean(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<i64>() as f64 / values.len() as f64
}

/// Median with even-count windows rounded half up
fn median(values: &[i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        return sorted[mid];
    }
    round_half_up((sorted[mid - 1] + sorted[mid]) as f64 / 2.0)
}
