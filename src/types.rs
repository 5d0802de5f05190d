//! Core types for the repflux engine
//!
//! This module defines the data that flows through each frame of an analysis:
//! landmarks from the pose provider, per-frame form verdicts, and the terminal
//! analysis result emitted when a session ends.

use crate::error::AnalysisError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// 2D coordinate in the normalized image plane (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One named body joint's position and detection confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Normalized horizontal position (0-1)
    pub x: f64,
    /// Normalized vertical position (0-1, increases downward)
    pub y: f64,
    /// Detection confidence (0-1)
    #[serde(default = "default_visibility")]
    pub visibility: f64,
}

fn default_visibility() -> f64 {
    1.0
}

impl Landmark {
    pub fn new(x: f64, y: f64, visibility: f64) -> Self {
        Self { x, y, visibility }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Joints the exercise logic reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointName {
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl JointName {
    pub const ALL: [JointName; 12] = [
        JointName::LeftShoulder,
        JointName::RightShoulder,
        JointName::LeftElbow,
        JointName::RightElbow,
        JointName::LeftWrist,
        JointName::RightWrist,
        JointName::LeftHip,
        JointName::RightHip,
        JointName::LeftKnee,
        JointName::RightKnee,
        JointName::LeftAnkle,
        JointName::RightAnkle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JointName::LeftShoulder => "left_shoulder",
            JointName::RightShoulder => "right_shoulder",
            JointName::LeftElbow => "left_elbow",
            JointName::RightElbow => "right_elbow",
            JointName::LeftWrist => "left_wrist",
            JointName::RightWrist => "right_wrist",
            JointName::LeftHip => "left_hip",
            JointName::RightHip => "right_hip",
            JointName::LeftKnee => "left_knee",
            JointName::RightKnee => "right_knee",
            JointName::LeftAnkle => "left_ankle",
            JointName::RightAnkle => "right_ankle",
        }
    }
}

/// Body side of a tracked limb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    pub fn shoulder(&self) -> JointName {
        match self {
            Side::Left => JointName::LeftShoulder,
            Side::Right => JointName::RightShoulder,
        }
    }

    pub fn elbow(&self) -> JointName {
        match self {
            Side::Left => JointName::LeftElbow,
            Side::Right => JointName::RightElbow,
        }
    }

    pub fn wrist(&self) -> JointName {
        match self {
            Side::Left => JointName::LeftWrist,
            Side::Right => JointName::RightWrist,
        }
    }

    pub fn hip(&self) -> JointName {
        match self {
            Side::Left => JointName::LeftHip,
            Side::Right => JointName::RightHip,
        }
    }

    pub fn knee(&self) -> JointName {
        match self {
            Side::Left => JointName::LeftKnee,
            Side::Right => JointName::RightKnee,
        }
    }

    pub fn ankle(&self) -> JointName {
        match self {
            Side::Left => JointName::LeftAnkle,
            Side::Right => JointName::RightAnkle,
        }
    }
}

/// Landmarks of one detected body, keyed by joint name.
///
/// Joints the engine does not read (e.g. face points) are kept so that the
/// mean visibility reflects everything the pose model reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseLandmarks {
    landmarks: HashMap<String, Landmark>,
}

impl PoseLandmarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(landmarks: HashMap<String, Landmark>) -> Self {
        Self { landmarks }
    }

    /// Builder-style insert of a known joint
    pub fn with(mut self, joint: JointName, landmark: Landmark) -> Self {
        self.insert(joint, landmark);
        self
    }

    pub fn insert(&mut self, joint: JointName, landmark: Landmark) {
        self.landmarks.insert(joint.as_str().to_string(), landmark);
    }

    pub fn get(&self, joint: JointName) -> Result<&Landmark, AnalysisError> {
        self.landmarks
            .get(joint.as_str())
            .ok_or_else(|| AnalysisError::MissingLandmark(joint.as_str().to_string()))
    }

    pub fn point(&self, joint: JointName) -> Result<Point, AnalysisError> {
        self.get(joint).map(Landmark::point)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Landmark)> {
        self.landmarks.iter().map(|(name, lm)| (name.as_str(), lm))
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// Mean visibility over every reported joint, None when empty
    pub fn mean_visibility(&self) -> Option<f64> {
        if self.landmarks.is_empty() {
            return None;
        }
        let sum: f64 = self.landmarks.values().map(|lm| lm.visibility).sum();
        Some(sum / self.landmarks.len() as f64)
    }
}

/// Everything the pose provider yields for one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSample {
    /// Capture time relative to stream start (milliseconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<f64>,
    /// Detected body, or None when the pose model found nobody
    pub pose: Option<PoseLandmarks>,
}

impl FrameSample {
    pub fn detected(pose: PoseLandmarks) -> Self {
        Self {
            timestamp_ms: None,
            pose: Some(pose),
        }
    }

    pub fn not_detected() -> Self {
        Self {
            timestamp_ms: None,
            pose: None,
        }
    }

    pub fn with_timestamp_ms(mut self, timestamp_ms: f64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    pub fn is_detected(&self) -> bool {
        self.pose.is_some()
    }
}

/// Supported exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExerciseType {
    BicepCurls,
    Situps,
    VerticalJump,
}

impl ExerciseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseType::BicepCurls => "BICEP_CURLS",
            ExerciseType::Situps => "SITUPS",
            ExerciseType::VerticalJump => "VERTICAL_JUMP",
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseType {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "BICEP_CURLS" => Ok(ExerciseType::BicepCurls),
            "SITUPS" | "SIT_UPS" => Ok(ExerciseType::Situps),
            "VERTICAL_JUMP" => Ok(ExerciseType::VerticalJump),
            _ => Err(AnalysisError::UnsupportedExercise(s.to_string())),
        }
    }
}

/// How the stream is being consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisMode {
    /// Recorded clip analysed end to end
    File,
    /// Live capture; early frames are untrusted
    Live,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::File => "FILE",
            AnalysisMode::Live => "LIVE",
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisMode {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FILE" => Ok(AnalysisMode::File),
            "LIVE" => Ok(AnalysisMode::Live),
            _ => Err(AnalysisError::UnsupportedMode(s.to_string())),
        }
    }
}

/// Phase of a repetition cycle for one counted limb
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Unset,
    Down,
    Up,
}

impl Stage {
    /// Label shown to the athlete; an unset stage reads as READY
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Unset => "READY",
            Stage::Down => "down",
            Stage::Up => "up",
        }
    }
}

/// Per-frame posture judgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormStatus {
    Good,
    Bad,
}

/// Feedback shown when no rule fired
pub const GOOD_FORM_FEEDBACK: &str = "Good form!";

/// Issue appended when the batch quality verdict flags the clip
pub const POOR_QUALITY_ISSUE: &str = "Poor video quality or obstructed view detected";

/// Result of evaluating one limb's posture in one frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormVerdict {
    pub status: FormStatus,
    /// Headline feedback: the first issue, or the good-form message
    pub feedback: String,
    pub issues: Vec<String>,
}

impl FormVerdict {
    pub fn good() -> Self {
        Self {
            status: FormStatus::Good,
            feedback: GOOD_FORM_FEEDBACK.to_string(),
            issues: Vec::new(),
        }
    }

    pub fn from_issues(issues: Vec<String>) -> Self {
        match issues.first() {
            None => Self::good(),
            Some(first) => Self {
                status: FormStatus::Bad,
                feedback: first.clone(),
                issues,
            },
        }
    }

    pub fn is_good(&self) -> bool {
        self.status == FormStatus::Good
    }
}

impl Default for FormVerdict {
    fn default() -> Self {
        Self::good()
    }
}

/// Exercise-specific measurements carried by a successful result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExerciseMetrics {
    /// Two counted limbs (bicep curls)
    BilateralReps {
        total_reps: u32,
        left_reps: u32,
        right_reps: u32,
    },
    /// One counted cycle (sit-ups)
    Reps { total_reps: u32 },
    /// Jump measurements
    Jump { max_height_cm: f64, jump_count: u32 },
}

impl ExerciseMetrics {
    pub fn total_reps(&self) -> Option<u32> {
        match self {
            ExerciseMetrics::BilateralReps { total_reps, .. } => Some(*total_reps),
            ExerciseMetrics::Reps { total_reps } => Some(*total_reps),
            ExerciseMetrics::Jump { .. } => None,
        }
    }
}

/// Terminal, flat, serializable output of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub session_id: String,
    pub producer: String,
    pub engine_version: String,
    /// Exercise type as requested (kept verbatim so unknown types can be reported)
    pub exercise_type: String,
    pub analysis_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub started_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
    #[serde(flatten)]
    pub metrics: Option<ExerciseMetrics>,
    pub form_score: Option<u32>,
    pub consistency_score: Option<u32>,
    pub cheat_detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_issues: Option<Vec<String>>,
    pub frames_processed: u64,
    pub low_confidence_frames: u64,
    pub extraction_faults: u64,
    /// (frames - low confidence) / frames; None when no frame was processed
    pub detection_quality: Option<f64>,
}

impl AnalysisResult {
    /// A result for a run that could not start or was rejected outright
    pub fn failure(
        exercise_type: &str,
        analysis_mode: &str,
        source: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            producer: crate::PRODUCER_NAME.to_string(),
            engine_version: crate::ENGINE_VERSION.to_string(),
            exercise_type: exercise_type.to_string(),
            analysis_mode: analysis_mode.to_string(),
            source: source.map(str::to_string),
            started_at: Utc::now(),
            success: false,
            error: Some(message.into()),
            metrics: None,
            form_score: None,
            consistency_score: None,
            cheat_detected: false,
            form_issues: None,
            frames_processed: 0,
            low_confidence_frames: 0,
            extraction_faults: 0,
            detection_quality: None,
        }
    }

    pub fn total_reps(&self) -> Option<u32> {
        self.metrics.as_ref().and_then(ExerciseMetrics::total_reps)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
