//! Engine orchestration
//!
//! This module provides the public API for cyclecast. It wires the stages
//! together: records → day normalization → cycle reconstruction → observed
//! statistics → baseline reconciliation → calendar / dashboard views.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::baseline::BaselineReconciler;
use crate::calendar::{calendar_log_range, CalendarProjector};
use crate::config::EngineConfig;
use crate::cycles::CycleReconstructor;
use crate::dashboard::{completed_lengths, trim_trend, CycleTrend, DashboardContext, StatsFlags};
use crate::error::EngineError;
use crate::normalizer::{add_days, date_at, parse_utc_offset, DayNormalizer};
use crate::policy::{owner_baseline, owner_baseline_cycle_length, sanitize_for_viewer};
use crate::statistics::StatisticsAggregator;
use crate::types::{CalendarDayState, CycleStats, DayRecord, UserBaseline};

/// Read access to stored day records
pub trait DayLogSource {
    /// Every record of the user
    fn list_all(&self, user_id: u64) -> Result<Vec<DayRecord>, EngineError>;

    /// Records whose stored instant lies in `[from, to)`; an absent bound is open
    fn list_in_range(
        &self,
        user_id: u64,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<DayRecord>, EngineError>;
}

/// Day log source backed by memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryLogSource {
    records: BTreeMap<u64, Vec<DayRecord>>,
}

impl InMemoryLogSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record for a user
    pub fn insert(&mut self, user_id: u64, record: DayRecord) {
        self.records.entry(user_id).or_default().push(record);
    }

    /// Store many records for a user
    pub fn extend(&mut self, user_id: u64, records: impl IntoIterator<Item = DayRecord>) {
        self.records.entry(user_id).or_default().extend(records);
    }
}

impl DayLogSource for InMemoryLogSource {
    fn list_all(&self, user_id: u64) -> Result<Vec<DayRecord>, EngineError> {
        Ok(self.records.get(&user_id).cloned().unwrap_or_default())
    }

    fn list_in_range(
        &self,
        user_id: u64,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<DayRecord>, EngineError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(EngineError::SourceError(format!(
                    "range start {from} is after end {to}"
                )));
            }
        }

        Ok(self
            .records
            .get(&user_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| from.map_or(true, |from| r.date >= from))
                    .filter(|r| to.map_or(true, |to| r.date < to))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// First instant of a calendar day in the given location
fn day_start_instant<Tz: TimeZone>(day: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let naive = day.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Stateless engine holding only configuration
#[derive(Debug, Clone, Default)]
pub struct CycleEngine {
    config: EngineConfig,
}

impl CycleEngine {
    /// Create an engine with validated configuration
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reconciled statistics for a user at `now`
    pub fn cycle_stats<Tz: TimeZone>(
        &self,
        records: &[DayRecord],
        baseline: Option<&UserBaseline>,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> CycleStats {
        let today = date_at(&now, tz);
        let days = DayNormalizer::normalize(records, tz);
        let reconstruction = CycleReconstructor::reconstruct(&days);
        debug!(
            records = records.len(),
            days = days.len(),
            cycles = reconstruction.starts.len(),
            %today,
            "computing cycle stats"
        );

        let observed =
            StatisticsAggregator::observed_stats_from(&reconstruction, &days, today, &self.config);
        let stats = BaselineReconciler::new(&self.config).apply(
            baseline,
            &days,
            &reconstruction,
            observed,
            today,
            tz,
        );
        debug!(
            cycle_day = stats.current_cycle_day,
            phase = stats.current_phase.as_str(),
            "cycle stats ready"
        );
        stats
    }

    /// Month grid for the month containing `month_start` (today's month when absent)
    pub fn calendar<Tz: TimeZone>(
        &self,
        month_start: Option<NaiveDate>,
        records: &[DayRecord],
        baseline: Option<&UserBaseline>,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> Vec<CalendarDayState> {
        let stats = self.cycle_stats(records, baseline, now, tz);
        let month_start = month_start.unwrap_or_else(|| date_at(&now, tz));
        CalendarProjector::build(month_start, records, &stats, now, tz, &self.config)
    }

    /// Completed cycle lengths with summary flags
    pub fn trend<Tz: TimeZone>(
        &self,
        records: &[DayRecord],
        baseline: Option<&UserBaseline>,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> CycleTrend {
        let baseline = owner_baseline(baseline);
        let today = date_at(&now, tz);
        let days = DayNormalizer::normalize(records, tz);
        let reconstruction = CycleReconstructor::reconstruct(&days);
        let lengths = trim_trend(
            completed_lengths(&reconstruction, today),
            self.config.max_trend_points,
        );

        let stats = self.cycle_stats(records, baseline, now, tz);
        let flags = StatsFlags::build(
            baseline,
            &reconstruction,
            &stats,
            today,
            tz,
            lengths.len(),
            &self.config,
        );

        CycleTrend {
            lengths,
            baseline_cycle_length: owner_baseline_cycle_length(baseline),
            flags,
        }
    }

    /// Dashboard view of the current cycle
    pub fn dashboard<Tz: TimeZone>(
        &self,
        records: &[DayRecord],
        baseline: Option<&UserBaseline>,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> DashboardContext {
        let baseline = owner_baseline(baseline);
        let stats = self.cycle_stats(records, baseline, now, tz);
        DashboardContext::build(baseline, &stats, date_at(&now, tz), tz, &self.config)
    }

    /// Statistics over every record the source holds for `user_id`
    pub fn cycle_stats_from_source<Tz: TimeZone>(
        &self,
        source: &dyn DayLogSource,
        user_id: u64,
        baseline: Option<&UserBaseline>,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> Result<CycleStats, EngineError> {
        let records = source.list_all(user_id)?;
        Ok(self.cycle_stats(&records, baseline, now, tz))
    }

    /// Month grid loading only the records around the month from the source
    pub fn calendar_from_source<Tz: TimeZone>(
        &self,
        source: &dyn DayLogSource,
        user_id: u64,
        month_start: NaiveDate,
        baseline: Option<&UserBaseline>,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> Result<Vec<CalendarDayState>, EngineError> {
        let stats = self.cycle_stats_from_source(source, user_id, baseline, now, tz)?;

        let (from, to) = calendar_log_range(month_start);
        let records = source.list_in_range(
            user_id,
            Some(day_start_instant(from, tz)),
            Some(day_start_instant(add_days(to, 1), tz)),
        )?;

        Ok(CalendarProjector::build(
            month_start,
            &records,
            &stats,
            now,
            tz,
            &self.config,
        ))
    }

    /// Records of `owner_id` as `viewer` may see them
    pub fn records_for_viewer(
        &self,
        source: &dyn DayLogSource,
        owner_id: u64,
        viewer: Option<&UserBaseline>,
    ) -> Result<Vec<DayRecord>, EngineError> {
        debug!(
            owner_id,
            viewer = viewer.map_or("none", |v| v.role.as_str()),
            "loading records for viewer"
        );
        Ok(sanitize_for_viewer(viewer, source.list_all(owner_id)?))
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// JSON request accepted by the string entry points, the CLI and the FFI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRequest {
    #[serde(default)]
    pub records: Vec<DayRecord>,
    #[serde(default)]
    pub baseline: Option<UserBaseline>,
    pub now: DateTime<Utc>,
    /// `UTC` or a fixed offset such as `+02:00`
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Any day of the month to render; defaults to the current month
    #[serde(default)]
    pub month: Option<NaiveDate>,
}

impl EngineRequest {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn engine_for(config: Option<&EngineConfig>) -> Result<CycleEngine, EngineError> {
    match config {
        Some(config) => CycleEngine::new(config.clone()),
        None => Ok(CycleEngine::default()),
    }
}

/// Compute reconciled statistics for a JSON request
pub fn cycle_stats_json(request_json: &str, config: Option<&EngineConfig>) -> Result<String, EngineError> {
    let engine = engine_for(config)?;
    let request = EngineRequest::from_json(request_json)?;
    let tz = parse_utc_offset(&request.timezone)?;

    let stats = engine.cycle_stats(&request.records, request.baseline.as_ref(), request.now, &tz);
    Ok(serde_json::to_string(&stats)?)
}

/// Compute a month calendar grid for a JSON request
pub fn calendar_json(request_json: &str, config: Option<&EngineConfig>) -> Result<String, EngineError> {
    let engine = engine_for(config)?;
    let request = EngineRequest::from_json(request_json)?;
    let tz = parse_utc_offset(&request.timezone)?;

    let states = engine.calendar(
        request.month,
        &request.records,
        request.baseline.as_ref(),
        request.now,
        &tz,
    );
    Ok(serde_json::to_string(&states)?)
}

/// Compute the dashboard context for a JSON request
pub fn dashboard_json(request_json: &str, config: Option<&EngineConfig>) -> Result<String, EngineError> {
    let engine = engine_for(config)?;
    let request = EngineRequest::from_json(request_json)?;
    let tz = parse_utc_offset(&request.timezone)?;

    let context = engine.dashboard(&request.records, request.baseline.as_ref(), request.now, &tz);
    Ok(serde_json::to_string(&context)?)
}

/// Compute the cycle-length trend for a JSON request
pub fn trend_json(request_json: &str, config: Option<&EngineConfig>) -> Result<String, EngineError> {
    let engine = engine_for(config)?;
    let request = EngineRequest::from_json(request_json)?;
    let tz = parse_utc_offset(&request.timezone)?;

    let trend = engine.trend(&request.records, request.baseline.as_ref(), request.now, &tz);
    Ok(serde_json::to_string(&trend)?)
}
