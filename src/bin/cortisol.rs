//! Cortisol CLI - Command-line access to the tracker core
//!
//! Commands:
//! - scan: List and classify every file under the export folder
//! - sleep: Print the sleep overview
//! - intraday: Print the merged heart-rate and step series of a date
//! - predict: Predict wake levels for one or more days
//! - curve: Print the wake-anchored comparison or reference curve
//! - doctor: Diagnose export folder and predictor configuration

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use cortisol_tracker::config::{Config, PredictorConfig};
use cortisol_tracker::curve::check_curve_request;
use cortisol_tracker::pipeline::{parse_date, IntradaySource, MAX_PREDICTION_DAYS};
use cortisol_tracker::predictor::CommandPredictor;
use cortisol_tracker::types::SignalCategory;
use cortisol_tracker::{ComputeError, PredictionService, PRODUCER_NAME, VERSION};

/// Cortisol Tracker - Fitbit export aggregation and cortisol curve projection
#[derive(Parser)]
#[command(name = "cortisol")]
#[command(version = VERSION)]
#[command(about = "Aggregate Fitbit exports and project the daily cortisol curve", long_about = None)]
struct Cli {
    /// Export folder (defaults to CORTISOL_DATA_ROOT, then data/Fitbit)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Maximum directory depth below the export folder
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Linear model JSON file
    #[arg(long, global = true, conflicts_with = "predictor_cmd")]
    model: Option<PathBuf>,

    /// External predictor command line
    #[arg(long, global = true)]
    predictor_cmd: Option<String>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List and classify every file under the export folder
    Scan,

    /// Print the sleep overview (most recent nights)
    Sleep,

    /// Print the merged heart-rate and step series of a date
    Intraday {
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
    },

    /// Predict wake levels
    Predict {
        /// Number of days ending at --date
        #[arg(long, default_value = "1")]
        days: u32,

        /// Last date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },

    /// Print the comparison curve for a wake level
    Curve {
        /// Wake level in ug/dL, defaults to the population average
        #[arg(long)]
        wake: Option<f64>,

        /// Hours since wake to cover
        #[arg(long, default_value = "16")]
        hours: u32,

        /// Print only the curve for --wake, without the population column
        #[arg(long)]
        reference: bool,
    },

    /// Diagnose export folder and predictor configuration
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let log_env = std::env::var("CORTISOL_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "warn".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(log_env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .compact()
        .with_ansi(false)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config, CortisolCliError> {
    let mut config = Config::from_env()?;
    if let Some(root) = &cli.root {
        config.data_root = root.clone();
    }
    if let Some(depth) = cli.max_depth {
        config.max_scan_depth = depth;
    }
    if let Some(model) = &cli.model {
        config.predictor = PredictorConfig::LinearModel(model.clone());
    }
    if let Some(command) = &cli.predictor_cmd {
        config.predictor = PredictorConfig::Command(
            CommandPredictor::parse(command)
                .ok_or_else(|| CortisolCliError::Usage("empty --predictor-cmd".to_string()))?,
        );
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), CortisolCliError> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

fn run(cli: Cli) -> Result<(), CortisolCliError> {
    let config = load_config(&cli)?;
    let pretty = cli.pretty;

    match cli.command {
        Commands::Scan => cmd_scan(&config, pretty),
        Commands::Sleep => print_json(&config.store().sleep_overview()?, pretty),
        Commands::Intraday { date } => {
            let date = parse_date(&date)?;
            print_json(&config.store().intraday(date)?, pretty)
        }
        Commands::Predict { days, date } => cmd_predict(&config, days, date.as_deref(), pretty),
        Commands::Curve {
            wake,
            hours,
            reference,
        } => {
            let projector = config.curve_projector()?;
            let wake = wake.unwrap_or(projector.config().population_wake_level);
            check_curve_request(wake, hours)?;
            if reference {
                print_json(&projector.reference_curve(wake, hours), pretty)
            } else {
                print_json(&projector.compare_curve(wake, hours), pretty)
            }
        }
        Commands::Doctor { json } => cmd_doctor(&config, json),
    }
}

#[derive(Serialize)]
struct ScannedFile {
    file: String,
    category: SignalCategory,
}

fn cmd_scan(config: &Config, pretty: bool) -> Result<(), CortisolCliError> {
    let exports = config.store().scan()?;
    let files: Vec<ScannedFile> = exports
        .files
        .iter()
        .map(|f| ScannedFile {
            file: exports.relative_name(f),
            category: f.category(),
        })
        .collect();
    print_json(&files, pretty)
}

fn cmd_predict(
    config: &Config,
    days: u32,
    date: Option<&str>,
    pretty: bool,
) -> Result<(), CortisolCliError> {
    if days == 0 || days > MAX_PREDICTION_DAYS {
        return Err(CortisolCliError::Usage(format!(
            "--days must be between 1 and {}",
            MAX_PREDICTION_DAYS
        )));
    }

    let now = Local::now().naive_local();
    let end_date: NaiveDate = match date {
        Some(raw) => parse_date(raw)?,
        None => now.date(),
    };

    let service = PredictionService::new(
        Arc::new(config.store()),
        config.predictor.build()?,
        config.curve_projector()?,
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let response = runtime.block_on(service.predict(days, end_date, now))?;
    print_json(&response, pretty)
}

fn cmd_doctor(config: &Config, json: bool) -> Result<(), CortisolCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} {}", PRODUCER_NAME, VERSION),
    });

    match config.store().scan() {
        Ok(exports) => {
            let counts = [
                SignalCategory::Sleep,
                SignalCategory::Steps,
                SignalCategory::HeartRate,
            ]
            .map(|c| exports.count(c));
            let status = if counts.iter().all(|&n| n == 0) {
                CheckStatus::Warning
            } else {
                CheckStatus::Ok
            };
            checks.push(DoctorCheck {
                name: "export_root".to_string(),
                status,
                message: format!(
                    "{}: {} files ({} sleep, {} steps, {} heart rate)",
                    exports.root.display(),
                    exports.files.len(),
                    counts[0],
                    counts[1],
                    counts[2]
                ),
            });
        }
        Err(e) => checks.push(DoctorCheck {
            name: "export_root".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        }),
    }

    let predictor_check = match (&config.predictor, config.predictor.build()) {
        (_, Err(e)) => DoctorCheck {
            name: "predictor".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
        (PredictorConfig::Baseline, Ok(_)) => DoctorCheck {
            name: "predictor".to_string(),
            status: CheckStatus::Warning,
            message: "No model configured; predictions equal the population mean".to_string(),
        },
        (PredictorConfig::LinearModel(path), Ok(_)) => DoctorCheck {
            name: "predictor".to_string(),
            status: CheckStatus::Ok,
            message: format!("Linear model {}", path.display()),
        },
        (PredictorConfig::Command(cmd), Ok(_)) => DoctorCheck {
            name: "predictor".to_string(),
            status: CheckStatus::Ok,
            message: format!("External command {} {}", cmd.program, cmd.args.join(" ")),
        },
    };
    checks.push(predictor_check);

    checks.push(DoctorCheck {
        name: "stdout".to_string(),
        status: CheckStatus::Ok,
        message: if atty::is(atty::Stream::Stdout) {
            "stdout is a TTY (use --pretty for readable JSON)".to_string()
        } else {
            "stdout is a pipe".to_string()
        },
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Cortisol Doctor Report");
        println!("======================");
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

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CortisolCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum CortisolCliError {
    Io(std::io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    Usage(String),
    DoctorFailed,
}

impl From<std::io::Error> for CortisolCliError {
    fn from(e: std::io::Error) -> Self {
        CortisolCliError::Io(e)
    }
}

impl From<ComputeError> for CortisolCliError {
    fn from(e: ComputeError) -> Self {
        CortisolCliError::Compute(e)
    }
}

impl From<serde_json::Error> for CortisolCliError {
    fn from(e: serde_json::Error) -> Self {
        CortisolCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CortisolCliError> for CliError {
    fn from(e: CortisolCliError) -> Self {
        match e {
            CortisolCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CortisolCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::MissingRoot(_) => (
                        "FOLDER_NOT_FOUND",
                        "Set --root or CORTISOL_DATA_ROOT to the export folder",
                    ),
                    ComputeError::DateParseError(_) | ComputeError::InvalidQuery(_) => {
                        ("INVALID_INPUT", "Dates use the YYYY-MM-DD format")
                    }
                    ComputeError::Config(_) => {
                        ("CONFIG_ERROR", "Check the CORTISOL_* environment variables")
                    }
                    ComputeError::Prediction(_) => {
                        ("PREDICTION_ERROR", "Run 'cortisol doctor' to check the predictor")
                    }
                    _ => ("COMPUTE_ERROR", "Run 'cortisol doctor' for details"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            CortisolCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CortisolCliError::Usage(msg) => CliError {
                code: "USAGE_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'cortisol --help'".to_string()),
            },
            CortisolCliError::DoctorFailed => CliError {
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
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
