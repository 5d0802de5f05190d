//! pose.landmark_stream.v1 schema definition
//!
//! A line-oriented format for landmark streams extracted by an external pose
//! model. Each line is one record:
//! - an optional `stream` header carrying the schema version and frame rate
//! - one `frame` record per video frame, with `landmarks: null` when the
//!   pose model found nobody

use crate::types::{FrameSample, PoseLandmarks};
use serde::{Deserialize, Serialize};

/// Current schema version
pub const SCHEMA_VERSION: &str = "pose.landmark_stream.v1";

/// Stream-level metadata, written once before the first frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamHeader {
    pub schema_version: String,
    /// Capture frame rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    /// Opaque description of where the frames came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Pose model that produced the landmarks (e.g. "blazepose_full")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmark_model: Option<String>,
}

impl StreamHeader {
    pub fn new(fps: Option<f64>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            fps,
            source: None,
            landmark_model: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }
        if let Some(fps) = self.fps {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(ValidationError::InvalidFps(fps));
            }
        }
        Ok(())
    }
}

/// One video frame's detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Position in the source video, starting at 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<f64>,
    /// Detected joints keyed by name; null when nobody was detected
    #[serde(default)]
    pub landmarks: Option<PoseLandmarks>,
}

impl FrameRecord {
    pub fn from_sample(index: u64, sample: &FrameSample) -> Self {
        Self {
            index: Some(index),
            timestamp_ms: sample.timestamp_ms,
            landmarks: sample.pose.clone(),
        }
    }

    pub fn into_sample(self) -> FrameSample {
        FrameSample {
            timestamp_ms: self.timestamp_ms,
            pose: self.landmarks,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(ts) = self.timestamp_ms {
            if !ts.is_finite() || ts < 0.0 {
                return Err(ValidationError::InvalidTimestamp(ts));
            }
        }

        let Some(pose) = &self.landmarks else {
            return Ok(());
        };

        for (joint, landmark) in pose.iter() {
            if !landmark.x.is_finite() || !landmark.y.is_finite() {
                return Err(ValidationError::NonFiniteCoordinate {
                    joint: joint.to_string(),
                });
            }
            if !(0.0..=1.0).contains(&landmark.visibility) {
                return Err(ValidationError::VisibilityOutOfRange {
                    joint: joint.to_string(),
                    value: landmark.visibility,
                });
            }
        }
        Ok(())
    }
}

/// One line of a landmark stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamRecord {
    Stream(StreamHeader),
    Frame(FrameRecord),
}

impl StreamRecord {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            StreamRecord::Stream(header) => header.validate(),
            StreamRecord::Frame(frame) => frame.validate(),
        }
    }

    pub fn record_type(&self) -> &'static str {
        match self {
            StreamRecord::Stream(_) => "stream",
            StreamRecord::Frame(_) => "frame",
        }
    }
}

/// Validation errors for landmark stream records
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Invalid frame rate: {0}")]
    InvalidFps(f64),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(f64),

    #[error("Non-finite coordinate for joint {joint}")]
    NonFiniteCoordinate { joint: String },

    #[error("Visibility for joint {joint} out of range [0, 1]: {value}")]
    VisibilityOutOfRange { joint: String, value: f64 },

    #[error("Stream header must be the first record")]
    HeaderNotFirst,

    #[error("Frame index {actual} does not follow {previous}")]
    IndexOutOfOrder { previous: u64, actual: u64 },
}
