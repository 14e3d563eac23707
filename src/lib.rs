//! cyclecast - Deterministic cycle reconstruction and prediction engine
//!
//! cyclecast turns a sparse, irregularly logged sequence of daily period flags into
//! cycle statistics and forward predictions through a pure pipeline:
//! day normalization → cycle reconstruction → statistics → ovulation prediction
//! → baseline reconciliation → calendar and dashboard projection.
//!
//! Every operation takes the current instant and the caller's location as
//! explicit inputs; identical inputs always produce identical outputs.

pub mod baseline;
pub mod calendar;
pub mod config;
pub mod cycles;
pub mod dashboard;
pub mod error;
pub mod normalizer;
pub mod ovulation;
pub mod pipeline;
pub mod policy;
pub mod projection;
pub mod statistics;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use calendar::build_calendar_day_states;
pub use config::EngineConfig;
pub use dashboard::{CycleTrend, DashboardContext, StatsFlags};
pub use error::EngineError;
pub use ovulation::{predict_cycle_window, CycleWindow, FertilityWindow};
pub use pipeline::{
    calendar_json, cycle_stats_json, dashboard_json, trend_json, CycleEngine, DayLogSource,
    EngineRequest, InMemoryLogSource,
};
pub use types::{
    CalendarDayState, CyclePhase, CycleStats, DayRecord, FlowLevel, UserBaseline, UserRole,
};

/// Engine version
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI and FFI
pub const PRODUCER_NAME: &str = "cyclecast";
