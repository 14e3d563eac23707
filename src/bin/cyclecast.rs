//! cyclecast CLI - Command-line interface for the cycle prediction engine
//!
//! Commands:
//! - stats: Reconciled cycle statistics for a request
//! - calendar: Month grid with logged and predicted days
//! - predict: Ovulation and fertile window for one cycle
//! - trend: Completed cycle lengths with summary flags
//! - dashboard: Current-cycle context with forward projections
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cyclecast::normalizer::{parse_day, parse_utc_offset};
use cyclecast::ovulation::OvulationPredictor;
use cyclecast::pipeline::{CycleEngine, EngineRequest};
use cyclecast::policy::is_cycle_combination_compatible;
use cyclecast::{EngineConfig, EngineError, ENGINE_VERSION, PRODUCER_NAME};

/// cyclecast - Deterministic menstrual-cycle reconstruction and prediction
#[derive(Parser)]
#[command(name = "cyclecast")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Reconstruct cycles and predict periods, ovulation and fertile windows", long_about = None)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Enable debug logging on stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute reconciled cycle statistics
    Stats {
        /// Request file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,
    },

    /// Render a month calendar grid
    Calendar {
        /// Request file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Any day of the month to render (YYYY-MM-DD); overrides the request
        #[arg(long)]
        month: Option<String>,
    },

    /// Predict ovulation and the fertile window for one cycle
    Predict {
        /// First day of the period (YYYY-MM-DD)
        #[arg(long)]
        period_start: String,

        /// Cycle length in days
        #[arg(long, default_value = "28")]
        cycle_length: i64,

        /// Period length in days
        #[arg(long, default_value = "5")]
        period_length: i64,
    },

    /// Completed cycle lengths for charting
    Trend {
        /// Request file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,
    },

    /// Dashboard context for the current cycle
    Dashboard {
        /// Request file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliFailure> {
    if let Commands::Doctor { json } = cli.command {
        return cmd_doctor(cli.config.as_deref(), json);
    }

    let engine = load_engine(cli.config.as_deref())?;
    let pretty = cli.pretty;

    match cli.command {
        Commands::Stats { input } => {
            let request = read_request(&input)?;
            let tz = parse_utc_offset(&request.timezone)?;
            let stats = engine.cycle_stats(&request.records, request.baseline.as_ref(), request.now, &tz);
            emit(&stats, pretty)
        }

        Commands::Calendar { input, month } => {
            let request = read_request(&input)?;
            let tz = parse_utc_offset(&request.timezone)?;
            let month = match month {
                Some(raw) => Some(parse_day(&raw)?),
                None => request.month,
            };
            let states = engine.calendar(month, &request.records, request.baseline.as_ref(), request.now, &tz);
            emit(&states, pretty)
        }

        Commands::Predict {
            period_start,
            cycle_length,
            period_length,
        } => cmd_predict(&engine, &period_start, cycle_length, period_length, pretty),

        Commands::Trend { input } => {
            let request = read_request(&input)?;
            let tz = parse_utc_offset(&request.timezone)?;
            let trend = engine.trend(&request.records, request.baseline.as_ref(), request.now, &tz);
            emit(&trend, pretty)
        }

        Commands::Dashboard { input } => {
            let request = read_request(&input)?;
            let tz = parse_utc_offset(&request.timezone)?;
            let context = engine.dashboard(&request.records, request.baseline.as_ref(), request.now, &tz);
            emit(&context, pretty)
        }

        Commands::Doctor { .. } => Ok(()),
    }
}

fn load_config(path: &Path) -> Result<EngineConfig, CliFailure> {
    let content = fs::read_to_string(path)?;
    Ok(EngineConfig::from_json(&content)?)
}

fn load_engine(config: Option<&Path>) -> Result<CycleEngine, CliFailure> {
    let config = match config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    Ok(CycleEngine::new(config)?)
}

fn read_request(input: &Path) -> Result<EngineRequest, CliFailure> {
    let content = if input.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(input)?
    };

    let request = EngineRequest::from_json(&content)?;
    debug!(records = request.records.len(), timezone = %request.timezone, "request loaded");
    Ok(request)
}

fn emit<T: Serialize>(value: &T, pretty: bool) -> Result<(), CliFailure> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", output);
    Ok(())
}

#[derive(Serialize)]
struct PredictReport {
    period_start: String,
    cycle_length: i64,
    period_length: i64,
    calculable: bool,
    ovulation_date: Option<String>,
    ovulation_exact: bool,
    fertility_window_start: Option<String>,
    fertility_window_end: Option<String>,
}

fn cmd_predict(
    engine: &CycleEngine,
    period_start: &str,
    cycle_length: i64,
    period_length: i64,
    pretty: bool,
) -> Result<(), CliFailure> {
    if cycle_length <= 0 || period_length <= 0 {
        return Err(CliFailure::InvalidArgument(format!(
            "lengths must be positive, got cycle {} and period {}",
            cycle_length, period_length
        )));
    }

    let start = parse_day(period_start)?;
    let window = OvulationPredictor::new(engine.config().luteal_phase_days).predict(
        start,
        cycle_length,
        period_length,
    );

    let report = PredictReport {
        period_start: start.to_string(),
        cycle_length,
        period_length,
        calculable: window.is_some(),
        ovulation_date: window.map(|w| w.ovulation_date.to_string()),
        ovulation_exact: window.map_or(false, |w| w.exact),
        fertility_window_start: window.and_then(|w| w.fertility).map(|f| f.start.to_string()),
        fertility_window_end: window.and_then(|w| w.fertility).map(|f| f.end.to_string()),
    };
    emit(&report, pretty)
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), CliFailure> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("cyclecast version {}", ENGINE_VERSION),
    });

    match config {
        Some(path) if !path.exists() => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Config file does not exist".to_string(),
        }),
        Some(path) => match load_config(path) {
            Ok(config) => {
                let compatible =
                    is_cycle_combination_compatible(config.default_cycle_length, config.default_period_length);
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Config valid (luteal {} days, defaults {}/{})",
                        config.luteal_phase_days, config.default_cycle_length, config.default_period_length
                    ),
                });
                if !compatible {
                    checks.push(DoctorCheck {
                        name: "config_defaults".to_string(),
                        status: CheckStatus::Warning,
                        message: "Default cycle and period lengths leave no room for ovulation".to_string(),
                    });
                }
            }
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: CliError::from(e).message,
            }),
        },
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using built-in defaults".to_string(),
        }),
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass requests with --input <file>)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (requests can be read with --input -)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("cyclecast Doctor Report");
        println!("=======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CliFailure::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum CliFailure {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    InvalidArgument(String),
    DoctorFailed,
}

impl From<io::Error> for CliFailure {
    fn from(e: io::Error) -> Self {
        CliFailure::Io(e)
    }
}

impl From<EngineError> for CliFailure {
    fn from(e: EngineError) -> Self {
        CliFailure::Engine(e)
    }
}

impl From<serde_json::Error> for CliFailure {
    fn from(e: serde_json::Error) -> Self {
        CliFailure::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CliFailure> for CliError {
    fn from(e: CliFailure) -> Self {
        match e {
            CliFailure::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CliFailure::Engine(e) => {
                let (code, hint) = match &e {
                    EngineError::JsonError(_) => ("JSON_ERROR", "Check request JSON syntax and field names"),
                    EngineError::InvalidTimezone(_) => ("TIMEZONE_ERROR", "Use UTC or an offset such as +02:00"),
                    EngineError::DateParseError(_) => ("DATE_ERROR", "Dates use the YYYY-MM-DD format"),
                    EngineError::InvalidConfig(_) => ("CONFIG_ERROR", "Run 'cyclecast doctor --config <file>'"),
                    EngineError::SourceError(_) => ("SOURCE_ERROR", "Check the log source"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            CliFailure::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CliFailure::InvalidArgument(msg) => CliError {
                code: "INVALID_ARGUMENT".to_string(),
                message: msg,
                hint: Some("Run with --help for usage".to_string()),
            },
            CliFailure::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
