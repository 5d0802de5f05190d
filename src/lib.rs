//! repflux - On-device exercise analysis over pose landmark streams
//!
//! repflux turns a stream of body landmarks into repetition counts, form
//! feedback and a cheat verdict through a deterministic per-frame pipeline:
//! quality gating → form evaluation → rep counting → session scoring.
//!
//! ## Modules
//!
//! - **Frame pipeline**: geometry, form, counter, quality, jump, session
//! - **Input**: landmark stream schema and frame sources
//! - **Front ends**: pipeline entry points, summary text, C FFI

pub mod config;
pub mod counter;
pub mod error;
pub mod form;
pub mod geometry;
pub mod jump;
pub mod pipeline;
pub mod quality;
pub mod schema;
pub mod session;
pub mod source;
pub mod summary;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::AnalysisConfig;
pub use error::AnalysisError;
pub use pipeline::{analyze, analyze_ndjson, run_analysis, AnalysisProcessor};
pub use session::{ExerciseSession, FrameReport};
pub use source::{LandmarkFileSource, PoseProvider, VecSource};
pub use types::{AnalysisMode, AnalysisResult, ExerciseType, FrameSample, PoseLandmarks};

// Schema exports
pub use schema::{LandmarkStreamReader, StreamRecord, SCHEMA_VERSION};

/// Engine version embedded in every result
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name embedded in every result
pub const PRODUCER_NAME: &str = "repflux";
