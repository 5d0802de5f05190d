//! Pipeline orchestration
//!
//! This module provides the public API for repflux. It drives one
//! `ExerciseSession` over a `PoseProvider` until the stream ends or the caller
//! stops it:
//!
//! 1. PoseProvider - yields frames (or per-frame decode faults)
//! 2. ExerciseSession - quality gate, form evaluation, rep counting
//! 3. finalize - scored `AnalysisResult`
//!
//! Entry points never return `Err`. Anything that goes wrong is reported in
//! the result's `success`/`error` fields.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::session::{ExerciseSession, FrameReport};
use crate::source::{LandmarkFileSource, PoseProvider};
use crate::types::{AnalysisMode, AnalysisResult, ExerciseType};
use std::io::Cursor;
use std::ops::ControlFlow;
use std::path::Path;

/// Analyse a landmark stream file with the default configuration.
///
/// # Arguments
/// * `exercise_type` - `BICEP_CURLS`, `SITUPS` or `VERTICAL_JUMP`
/// * `analysis_mode` - `FILE` or `LIVE`
/// * `path` - pose.landmark_stream.v1 file
///
/// # Example
/// ```ignore
/// let result = run_analysis("BICEP_CURLS", "FILE", "workout.ndjson");
/// println!("{} reps", result.total_reps().unwrap_or(0));
/// ```
pub fn run_analysis(exercise_type: &str, analysis_mode: &str, path: &str) -> AnalysisResult {
    AnalysisProcessor::new().analyze_path(exercise_type, analysis_mode, path)
}

/// Analyse an in-memory NDJSON landmark stream with the default configuration
pub fn analyze_ndjson(exercise_type: &str, analysis_mode: &str, ndjson: &str) -> AnalysisResult {
    AnalysisProcessor::new().analyze_ndjson(exercise_type, analysis_mode, ndjson)
}

/// Analyse every frame of a provider with the given configuration
pub fn analyze<P: PoseProvider + ?Sized>(
    exercise: ExerciseType,
    mode: AnalysisMode,
    provider: &mut P,
    config: &AnalysisConfig,
) -> AnalysisResult {
    drive(exercise, mode, provider, config, |_| ControlFlow::Continue(()))
}

/// Run a session over the provider. `on_frame` sees every frame report and
/// may stop the run early; the partial result is still returned.
fn drive<P, F>(
    exercise: ExerciseType,
    mode: AnalysisMode,
    provider: &mut P,
    config: &AnalysisConfig,
    mut on_frame: F,
) -> AnalysisResult
where
    P: PoseProvider + ?Sized,
    F: FnMut(&FrameReport) -> ControlFlow<()>,
{
    let mut session = ExerciseSession::new(exercise, mode, config, provider.fps());
    if let Some(label) = provider.label() {
        session = session.with_source(label);
    }

    let mut stream_error = None;

    loop {
        let report = match provider.next_frame() {
            Ok(Some(sample)) => session.process_frame(&sample),
            Ok(None) => break,
            Err(e) if e.is_recoverable() => session.skip_frame(&e),
            Err(e) => {
                tracing::error!(error = %e, frames = session.frames_processed(), "frame source failed");
                stream_error = Some(e);
                break;
            }
        };

        if on_frame(&report).is_break() {
            tracing::debug!(frames = session.frames_processed(), "analysis stopped by caller");
            break;
        }
    }

    let mut result = session.finalize();
    if let Some(e) = stream_error {
        result.success = false;
        result.error = Some(e.to_string());
    }
    result
}

/// Parse and validate the request strings, or build the failure result
fn parse_request(
    exercise_type: &str,
    analysis_mode: &str,
    source: Option<&str>,
) -> Result<(ExerciseType, AnalysisMode), AnalysisResult> {
    let reject = |e: AnalysisError| {
        tracing::warn!(error = %e, "rejected analysis request");
        AnalysisResult::failure(exercise_type, analysis_mode, source, e.to_string())
    };
    let exercise = exercise_type.parse::<ExerciseType>().map_err(reject)?;
    let mode = analysis_mode.parse::<AnalysisMode>().map_err(reject)?;
    Ok((exercise, mode))
}

/// Config-bearing analysis front end.
///
/// Use this when the same thresholds apply to several analyses, or to get
/// per-frame reports while a stream is running.
#[derive(Debug, Clone, Default)]
pub struct AnalysisProcessor {
    config: AnalysisConfig,
}

impl AnalysisProcessor {
    /// Create a processor with default thresholds
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a processor with custom thresholds
    pub fn with_config(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Load thresholds from JSON
    pub fn load_config(&mut self, json: &str) -> Result<(), AnalysisError> {
        self.config = AnalysisConfig::from_json(json)?;
        Ok(())
    }

    /// Save thresholds to JSON
    pub fn save_config(&self) -> Result<String, AnalysisError> {
        Ok(self.config.to_json()?)
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyse every frame of a provider
    pub fn analyze<P: PoseProvider + ?Sized>(
        &self,
        exercise: ExerciseType,
        mode: AnalysisMode,
        provider: &mut P,
    ) -> AnalysisResult {
        analyze(exercise, mode, provider, &self.config)
    }

    /// Analyse a provider, handing each frame report to `on_frame`. Returning
    /// `ControlFlow::Break` stops the run and finalizes what was seen so far.
    pub fn analyze_with<P, F>(
        &self,
        exercise: ExerciseType,
        mode: AnalysisMode,
        provider: &mut P,
        on_frame: F,
    ) -> AnalysisResult
    where
        P: PoseProvider + ?Sized,
        F: FnMut(&FrameReport) -> ControlFlow<()>,
    {
        drive(exercise, mode, provider, &self.config, on_frame)
    }

    /// Analyse a landmark stream file
    pub fn analyze_path(
        &self,
        exercise_type: &str,
        analysis_mode: &str,
        path: impl AsRef<Path>,
    ) -> AnalysisResult {
        let path = path.as_ref();
        let label = path.display().to_string();

        let (exercise, mode) = match parse_request(exercise_type, analysis_mode, Some(&label)) {
            Ok(request) => request,
            Err(failure) => return failure,
        };

        match LandmarkFileSource::open(path) {
            Ok(mut source) => self.analyze(exercise, mode, &mut source),
            Err(e) => {
                tracing::error!(error = %e, "could not open landmark stream");
                AnalysisResult::failure(exercise_type, analysis_mode, Some(&label), e.to_string())
            }
        }
    }

    /// Analyse an in-memory NDJSON landmark stream
    pub fn analyze_ndjson(
        &self,
        exercise_type: &str,
        analysis_mode: &str,
        ndjson: &str,
    ) -> AnalysisResult {
        let (exercise, mode) = match parse_request(exercise_type, analysis_mode, None) {
            Ok(request) => request,
            Err(failure) => return failure,
        };

        match LandmarkFileSource::from_reader(Cursor::new(ndjson.as_bytes()), "ndjson") {
            Ok(mut source) => self.analyze(exercise, mode, &mut source),
            Err(e) => AnalysisResult::failure(exercise_type, analysis_mode, None, e.to_string()),
        }
    }
}
