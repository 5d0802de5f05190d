//! repflux CLI - Command-line interface for the repflux engine
//!
//! Commands:
//! - analyze: Analyse a recorded landmark stream (batch mode)
//! - run: Analyse a landmark stream from stdin as it arrives (streaming mode)
//! - validate: Validate landmark stream schema
//! - doctor: Diagnose configuration and input health
//! - schema: Print input, output or config schema

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use repflux::schema::{LandmarkStreamReader, StreamRecord, SCHEMA_VERSION};
use repflux::source::{LandmarkFileSource, PoseProvider};
use repflux::summary::render_text;
use repflux::types::{AnalysisMode, AnalysisResult, ExerciseType, FrameSample};
use repflux::{AnalysisConfig, AnalysisError, AnalysisProcessor, ENGINE_VERSION, PRODUCER_NAME};

/// repflux - Exercise analysis over pose landmark streams
#[derive(Parser)]
#[command(name = "repflux")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Count reps, check form and flag unreliable footage from pose landmarks", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG applies otherwise
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse a recorded landmark stream (batch mode)
    Analyze {
        /// Exercise type (BICEP_CURLS, SITUPS, VERTICAL_JUMP)
        #[arg(short, long)]
        exercise: String,

        /// Analysis mode (FILE or LIVE)
        #[arg(short, long, default_value = "FILE")]
        mode: String,

        /// Input landmark stream (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        tuning: Tuning,

        /// Output format
        #[arg(long, default_value = "json")]
        format: OutputFormat,
    },

    /// Analyse a landmark stream from stdin as it arrives (streaming mode)
    Run {
        /// Exercise type (BICEP_CURLS, SITUPS, VERTICAL_JUMP)
        #[arg(short, long)]
        exercise: String,

        /// Analysis mode (FILE or LIVE)
        #[arg(short, long, default_value = "LIVE")]
        mode: String,

        #[command(flatten)]
        tuning: Tuning,

        /// Write one frame report per input frame before the final result
        #[arg(long)]
        emit_frames: bool,

        /// Flush output after each record (--flush false to buffer)
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        flush: bool,
    },

    /// Validate landmark stream schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and input health
    Doctor {
        /// Check a config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a landmark stream file
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

/// Threshold overrides shared by the analysis commands
#[derive(clap::Args)]
struct Tuning {
    /// Load thresholds from a JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reps per limb counted as reaching the goal
    #[arg(long)]
    rep_goal: Option<u32>,

    /// Frame rate to assume, overriding the stream header
    #[arg(long)]
    fps: Option<f64>,
}

impl Tuning {
    fn load(&self) -> Result<AnalysisConfig, RepfluxCliError> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json(&fs::read_to_string(path)?)?,
            None => AnalysisConfig::default(),
        };
        if let Some(goal) = self.rep_goal {
            config.rep_goal = goal;
        }
        if let Some(fps) = self.fps {
            config.default_fps = fps;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON result
    Json,
    /// Pretty-printed JSON result
    JsonPretty,
    /// Human-readable workout summary
    Text,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (pose.landmark_stream.v1)
    Input,
    /// Output schema (analysis result)
    Output,
    /// Threshold configuration with defaults
    Config,
}

/// Provider wrapper that forces the frame rate
struct FixedFps<P> {
    inner: P,
    fps: f64,
}

impl<P: PoseProvider> PoseProvider for FixedFps<P> {
    fn fps(&self) -> Option<f64> {
        Some(self.fps)
    }

    fn label(&self) -> Option<String> {
        self.inner.label()
    }

    fn next_frame(&mut self) -> Result<Option<FrameSample>, AnalysisError> {
        self.inner.next_frame()
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), RepfluxCliError> {
    match cli.command {
        Commands::Analyze {
            exercise,
            mode,
            input,
            tuning,
            format,
        } => cmd_analyze(&exercise, &mode, &input, &tuning, format),

        Commands::Run {
            exercise,
            mode,
            tuning,
            emit_frames,
            flush,
        } => cmd_run(&exercise, &mode, &tuning, emit_frames, flush),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor {
            config,
            input,
            json,
        } => cmd_doctor(config.as_deref(), input.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_analyze(
    exercise: &str,
    mode: &str,
    input: &Path,
    tuning: &Tuning,
    format: OutputFormat,
) -> Result<(), RepfluxCliError> {
    let config = tuning.load()?;
    let processor = AnalysisProcessor::with_config(config)?;

    let result = if input.to_string_lossy() == "-" {
        let (exercise_type, analysis_mode) = parse_request(exercise, mode)?;
        let source = LandmarkFileSource::from_reader(io::stdin().lock(), "stdin")?;
        analyze_source(&processor, exercise_type, analysis_mode, source, tuning.fps)
    } else if let Some(fps) = tuning.fps {
        let (exercise_type, analysis_mode) = parse_request(exercise, mode)?;
        let source = LandmarkFileSource::open(input)?;
        analyze_source(&processor, exercise_type, analysis_mode, source, Some(fps))
    } else {
        processor.analyze_path(exercise, mode, input)
    };

    print!("{}", format_result(&result, &format, processor.config())?);
    io::stdout().flush()?;

    finish(&result)
}

fn cmd_run(
    exercise: &str,
    mode: &str,
    tuning: &Tuning,
    emit_frames: bool,
    flush: bool,
) -> Result<(), RepfluxCliError> {
    let config = tuning.load()?;
    let processor = AnalysisProcessor::with_config(config)?;
    let (exercise_type, analysis_mode) = parse_request(exercise, mode)?;

    let stdin = io::stdin();
    let source = LandmarkFileSource::from_reader(stdin.lock(), "stdin")?;
    let mut source = FixedFps {
        fps: tuning.fps.or(source.fps()).unwrap_or(processor.config().default_fps),
        inner: source,
    };

    let mut stdout = io::stdout();
    let mut write_error: Option<io::Error> = None;

    let result = processor.analyze_with(exercise_type, analysis_mode, &mut source, |report| {
        if !emit_frames {
            return ControlFlow::Continue(());
        }
        let written = serde_json::to_string(report)
            .map_err(io::Error::from)
            .and_then(|line| writeln!(stdout, "{}", line))
            .and_then(|_| if flush { stdout.flush() } else { Ok(()) });
        match written {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => {
                write_error = Some(e);
                ControlFlow::Break(())
            }
        }
    });

    if let Some(e) = write_error {
        return Err(e.into());
    }

    writeln!(stdout, "{}", result.to_json()?)?;
    stdout.flush()?;

    finish(&result)
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), RepfluxCliError> {
    let input_data = read_input(input)?;

    let records = match input_format {
        InputFormat::Ndjson => LandmarkStreamReader::parse_ndjson(&input_data)?,
        InputFormat::Json => LandmarkStreamReader::parse_array(&input_data)?,
    };

    let results = LandmarkStreamReader::validate_records(&records);
    let frames = records
        .iter()
        .filter(|r| matches!(r, StreamRecord::Frame(_)))
        .count();
    let detected = records
        .iter()
        .filter(|r| matches!(r, StreamRecord::Frame(f) if f.landmarks.is_some()))
        .count();

    let report = ValidationReport {
        total_records: records.len(),
        frame_records: frames,
        detected_frames: detected,
        invalid_records: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                frame_index: r.frame_index,
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Frame records:   {}", report.frame_records);
        println!("Detected frames: {}", report.detected_frames);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                let frame = err
                    .frame_index
                    .map(|i| format!("frame {}", i))
                    .unwrap_or_else(|| "header".to_string());
                println!("  - Record {} ({}): {}", err.index, frame, err.error);
            }
        }
    }

    if report.invalid_records > 0 {
        Err(RepfluxCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, input: Option<&Path>, json: bool) -> Result<(), RepfluxCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck::ok(
        "engine_version",
        format!("repflux version {}", ENGINE_VERSION),
    ));
    checks.push(DoctorCheck::ok(
        "schema_version",
        format!("Input schema: {}", SCHEMA_VERSION),
    ));

    if let Some(config_path) = config {
        let check = match fs::read_to_string(config_path) {
            Ok(content) => match AnalysisConfig::from_json(&content) {
                Ok(cfg) => DoctorCheck::ok(
                    "config",
                    format!(
                        "Config valid (curl {}/{} deg, goal {} reps)",
                        cfg.bicep_up_threshold, cfg.bicep_down_threshold, cfg.rep_goal
                    ),
                ),
                Err(e) => DoctorCheck::error("config", format!("Invalid config: {}", e)),
            },
            Err(e) => DoctorCheck::error("config", format!("Cannot read config file: {}", e)),
        };
        checks.push(check);
    }

    if let Some(input_path) = input {
        let check = match LandmarkFileSource::open(input_path) {
            Ok(source) => match source.fps() {
                Some(fps) => DoctorCheck::ok("input", format!("Landmark stream readable ({} fps)", fps)),
                None => DoctorCheck::warning(
                    "input",
                    "Landmark stream has no header; the default frame rate will be assumed".to_string(),
                ),
            },
            Err(e) => DoctorCheck::error("input", e.to_string()),
        };
        checks.push(check);
    }

    // Check stdin is available (for streaming mode)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck::ok("stdin", "stdin is a TTY (interactive mode)".to_string())
    } else {
        DoctorCheck::ok("stdin", "stdin is a pipe (streaming mode ready)".to_string())
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
        println!("repflux Doctor Report");
        println!("=====================");
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
        Err(RepfluxCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), RepfluxCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: {}", SCHEMA_VERSION);
                println!();
                println!("One JSON record per line. Two record types:");
                println!();
                println!("1. stream - optional header, first line only");
                println!("   - schema_version, fps, source, landmark_model");
                println!();
                println!("2. frame - one per video frame");
                println!("   - index, timestamp_ms");
                println!("   - landmarks: {{ <joint>: {{ x, y, visibility }} }} or null when nobody was detected");
                println!();
                println!("Joints read by the engine: left/right shoulder, elbow, wrist, hip, knee, ankle");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: analysis result");
                println!();
                println!("- session_id, producer, engine_version, started_at");
                println!("- exercise_type, analysis_mode, source");
                println!("- success, error");
                println!("- total_reps (+ left_reps, right_reps for BICEP_CURLS)");
                println!("- max_height_cm, jump_count (VERTICAL_JUMP)");
                println!("- form_score, consistency_score, cheat_detected, form_issues");
                println!("- frames_processed, low_confidence_frames, extraction_faults, detection_quality");
            }
        }
        SchemaType::Config => {
            println!("{}", AnalysisConfig::default().to_json()?);
        }
    }

    Ok(())
}

// Helper functions

fn parse_request(exercise: &str, mode: &str) -> Result<(ExerciseType, AnalysisMode), RepfluxCliError> {
    Ok((exercise.parse()?, mode.parse()?))
}

fn analyze_source<P: PoseProvider>(
    processor: &AnalysisProcessor,
    exercise: ExerciseType,
    mode: AnalysisMode,
    source: P,
    fps: Option<f64>,
) -> AnalysisResult {
    match fps {
        Some(fps) => processor.analyze(exercise, mode, &mut FixedFps { inner: source, fps }),
        None => {
            let mut source = source;
            processor.analyze(exercise, mode, &mut source)
        }
    }
}

fn read_input(input: &Path) -> Result<String, RepfluxCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn format_result(
    result: &AnalysisResult,
    format: &OutputFormat,
    config: &AnalysisConfig,
) -> Result<String, RepfluxCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(result)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(result)? + "\n"),
        OutputFormat::Text => Ok(render_text(result, config)),
    }
}

/// The result is always printed; a failed analysis still exits non-zero
fn finish(result: &AnalysisResult) -> Result<(), RepfluxCliError> {
    match (&result.success, &result.error) {
        (true, _) => Ok(()),
        (false, Some(msg)) => Err(RepfluxCliError::AnalysisFailed(msg.clone())),
        (false, None) => Err(RepfluxCliError::AnalysisFailed("analysis failed".to_string())),
    }
}

fn get_input_json_schema() -> String {
    let landmark = serde_json::json!({
        "type": "object",
        "required": ["x", "y"],
        "properties": {
            "x": { "type": "number" },
            "y": { "type": "number" },
            "visibility": { "type": "number", "minimum": 0, "maximum": 1, "default": 1 }
        }
    });

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": SCHEMA_VERSION,
        "description": "One record of a pose landmark stream",
        "oneOf": [
            {
                "type": "object",
                "required": ["type", "schema_version"],
                "properties": {
                    "type": { "const": "stream" },
                    "schema_version": { "type": "string", "const": SCHEMA_VERSION },
                    "fps": { "type": "number", "exclusiveMinimum": 0 },
                    "source": { "type": "string" },
                    "landmark_model": { "type": "string" }
                }
            },
            {
                "type": "object",
                "required": ["type"],
                "properties": {
                    "type": { "const": "frame" },
                    "index": { "type": "integer", "minimum": 0 },
                    "timestamp_ms": { "type": "number", "minimum": 0 },
                    "landmarks": {
                        "oneOf": [
                            { "type": "null" },
                            { "type": "object", "additionalProperties": landmark }
                        ]
                    }
                }
            }
        ]
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "repflux analysis result",
        "type": "object",
        "required": [
            "session_id", "producer", "engine_version", "exercise_type", "analysis_mode",
            "started_at", "success", "cheat_detected", "frames_processed",
            "low_confidence_frames", "extraction_faults"
        ],
        "properties": {
            "session_id": { "type": "string", "format": "uuid" },
            "producer": { "type": "string" },
            "engine_version": { "type": "string" },
            "exercise_type": { "type": "string" },
            "analysis_mode": { "type": "string", "enum": ["FILE", "LIVE"] },
            "source": { "type": "string" },
            "started_at": { "type": "string", "format": "date-time" },
            "success": { "type": "boolean" },
            "error": { "type": ["string", "null"] },
            "total_reps": { "type": "integer" },
            "left_reps": { "type": "integer" },
            "right_reps": { "type": "integer" },
            "max_height_cm": { "type": "number" },
            "jump_count": { "type": "integer" },
            "form_score": { "type": ["integer", "null"], "minimum": 0, "maximum": 100 },
            "consistency_score": { "type": ["integer", "null"], "minimum": 0, "maximum": 100 },
            "cheat_detected": { "type": "boolean" },
            "form_issues": { "type": "array", "items": { "type": "string" } },
            "frames_processed": { "type": "integer" },
            "low_confidence_frames": { "type": "integer" },
            "extraction_faults": { "type": "integer" },
            "detection_quality": { "type": ["number", "null"], "minimum": 0, "maximum": 1 }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum RepfluxCliError {
    Io(io::Error),
    Analysis(AnalysisError),
    Json(serde_json::Error),
    AnalysisFailed(String),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for RepfluxCliError {
    fn from(e: io::Error) -> Self {
        RepfluxCliError::Io(e)
    }
}

impl From<AnalysisError> for RepfluxCliError {
    fn from(e: AnalysisError) -> Self {
        RepfluxCliError::Analysis(e)
    }
}

impl From<serde_json::Error> for RepfluxCliError {
    fn from(e: serde_json::Error) -> Self {
        RepfluxCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<RepfluxCliError> for CliError {
    fn from(e: RepfluxCliError) -> Self {
        match e {
            RepfluxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            RepfluxCliError::Analysis(e) => {
                let (code, hint) = match &e {
                    AnalysisError::UnsupportedExercise(_) => (
                        "UNSUPPORTED_EXERCISE",
                        "Use BICEP_CURLS, SITUPS or VERTICAL_JUMP",
                    ),
                    AnalysisError::UnsupportedMode(_) => ("UNSUPPORTED_MODE", "Use FILE or LIVE"),
                    AnalysisError::InvalidConfig(_) => {
                        ("INVALID_CONFIG", "Run 'repflux schema config' for the defaults")
                    }
                    AnalysisError::SourceUnavailable(_) => {
                        ("SOURCE_UNAVAILABLE", "Check file paths and permissions")
                    }
                    _ => ("PARSE_ERROR", "Ensure input matches pose.landmark_stream.v1"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            RepfluxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            RepfluxCliError::AnalysisFailed(msg) => CliError {
                code: "ANALYSIS_FAILED".to_string(),
                message: msg,
                hint: Some("Run 'repflux validate' on the input for details".to_string()),
            },
            RepfluxCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            RepfluxCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    frame_records: usize,
    detected_frames: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    frame_index: Option<u64>,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

impl DoctorCheck {
    fn ok(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message,
        }
    }

    fn warning(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message,
        }
    }

    fn error(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message,
        }
    }
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
