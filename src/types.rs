//! Core types for the cyclecast engine
//!
//! This module defines the data that flows through the engine: the daily records
//! supplied by the log store, the owner's declared baseline, and the derived
//! cycle statistics and calendar states handed back to callers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Menstrual flow intensity recorded for a day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowLevel {
    #[default]
    None,
    Light,
    Medium,
    Heavy,
}

/// Account role of the user a baseline belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Owner,
    Partner,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Owner => "owner",
            UserRole::Partner => "partner",
        }
    }
}

/// One logged observation for one day, as provided by the log store.
///
/// `date` is the instant the store keyed the day by. The engine normalizes it to a
/// calendar day in the caller's location before any comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    /// Store identifier, used as the tie-breaker between duplicates
    #[serde(default)]
    pub id: u64,
    /// Instant stored for this day
    pub date: DateTime<Utc>,
    /// Whether the day was flagged as a period day
    #[serde(default)]
    pub is_period: bool,
    /// Flow intensity
    #[serde(default)]
    pub flow: FlowLevel,
    /// Opaque symptom references
    #[serde(default)]
    pub symptom_ids: BTreeSet<u64>,
    /// Free-form notes
    #[serde(default)]
    pub notes: String,
}

impl DayRecord {
    /// Create a record with only the period flag set
    pub fn new(id: u64, date: DateTime<Utc>, is_period: bool) -> Self {
        Self {
            id,
            date,
            is_period,
            flow: if is_period {
                FlowLevel::Medium
            } else {
                FlowLevel::None
            },
            symptom_ids: BTreeSet::new(),
            notes: String::new(),
        }
    }

    /// Whether any non-trivial field is set on this record
    pub fn has_data(&self) -> bool {
        self.is_period
            || !self.symptom_ids.is_empty()
            || !self.notes.trim().is_empty()
            || self.flow != FlowLevel::None
    }
}

/// Onboarding values declared by the user. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBaseline {
    #[serde(default)]
    pub role: UserRole,
    /// Declared cycle length in days
    pub cycle_length: i64,
    /// Declared period length in days
    pub period_length: i64,
    /// Whether follow-up period days are filled in automatically by the log store
    #[serde(default)]
    pub auto_period_fill: bool,
    /// Declared start of the most recent period
    #[serde(default)]
    pub last_period_start: Option<DateTime<Utc>>,
}

/// A reconstructed cycle. Never persisted; recomputed on every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    pub start_date: NaiveDate,
    /// Day before the next cycle start; absent for the still-open latest cycle
    pub end_date: Option<NaiveDate>,
    /// Consecutive period days from the start
    pub period_length_days: i64,
}

/// Phase of the current cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePhase {
    Menstrual,
    Follicular,
    Fertile,
    Ovulation,
    Luteal,
    #[default]
    Unknown,
}

impl CyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Menstrual => "menstrual",
            CyclePhase::Follicular => "follicular",
            CyclePhase::Fertile => "fertile",
            CyclePhase::Ovulation => "ovulation",
            CyclePhase::Luteal => "luteal",
            CyclePhase::Unknown => "unknown",
        }
    }
}

/// Cycle statistics and predictions for one user at one moment.
///
/// Date fields are absent when they cannot be determined; absence is a valid state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleStats {
    /// 1-based day of the current cycle, 0 when no cycle has started
    pub current_cycle_day: i64,
    pub current_phase: CyclePhase,
    pub average_cycle_length: f64,
    pub median_cycle_length: i64,
    pub average_period_length: f64,
    pub last_period_start: Option<NaiveDate>,
    pub next_period_start: Option<NaiveDate>,
    pub ovulation_date: Option<NaiveDate>,
    /// Ovulation derived from the luteal-phase rule rather than a fallback heuristic
    pub ovulation_exact: bool,
    /// The cycle/period combination leaves no room for ovulation
    pub ovulation_impossible: bool,
    pub fertility_window_start: Option<NaiveDate>,
    pub fertility_window_end: Option<NaiveDate>,
}

impl CycleStats {
    /// Serialize stats to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// State of one cell in a month calendar grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDayState {
    pub date: NaiveDate,
    /// Day of month
    pub day: u32,
    pub in_month: bool,
    pub is_today: bool,
    /// Logged as a period day by the latest record for the date
    pub is_period: bool,
    /// Falls in a projected period block
    pub is_predicted: bool,
    pub is_fertility: bool,
    pub is_ovulation: bool,
    /// Any record for the date carries data
    pub has_data: bool,
}
