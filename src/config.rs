//! Analysis configuration
//!
//! Every threshold the engine uses lives here and is passed explicitly to the
//! session that needs it. Defaults reproduce the tuned values of the workout
//! tracker this engine replaces.

use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};

/// Thresholds and tolerances for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Elbow angle above which a curl arm is extended (degrees)
    pub bicep_down_threshold: f64,
    /// Elbow angle below which a curl arm is flexed (degrees)
    pub bicep_up_threshold: f64,
    /// Torso angle below which a sit-up is crunched (degrees)
    pub situp_up_threshold: f64,
    /// Torso angle above which a sit-up is flat (degrees)
    pub situp_down_threshold: f64,

    /// Maximum shoulder-elbow distance before the elbow counts as drifting
    pub elbow_drift_tolerance: f64,
    /// Maximum horizontal elbow offset from the shoulder
    pub elbow_offset_tolerance: f64,
    /// Acceptable hip-shoulder-elbow band (degrees)
    pub upper_arm_min_angle: f64,
    pub upper_arm_max_angle: f64,

    /// Mean landmark visibility below which a frame is low confidence
    pub confidence_floor: f64,
    /// Low-confidence ratio that suppresses rep crediting during the run
    pub live_cheat_ratio: f64,
    /// Low-confidence ratio that flags the finished clip
    pub batch_cheat_ratio: f64,
    /// Frames seen before the live ratio is trusted
    pub warmup_frames: u64,
    /// LIVE mode only: frames earlier than this are untrusted (seconds)
    pub min_live_duration_sec: f64,

    /// Target reps per counted limb
    pub rep_goal: u32,

    /// Hip rise above baseline that marks takeoff
    pub jump_rise_threshold: f64,
    /// Hip distance above baseline under which the athlete has landed
    pub jump_land_threshold: f64,
    /// Weight of the previous baseline in the exponential update
    pub baseline_smoothing: f64,
    /// Sampling rate assumed when the source does not report one
    pub default_fps: f64,
    /// Normalized ankle displacement to centimeters
    pub ankle_height_scale: f64,
    /// Displacement height that counts as a jump (cm)
    pub min_jump_height_cm: f64,
    /// Gravitational acceleration (m/s^2)
    pub gravity: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bicep_down_threshold: 140.0,
            bicep_up_threshold: 50.0,
            situp_up_threshold: 60.0,
            situp_down_threshold: 110.0,
            elbow_drift_tolerance: 0.25,
            elbow_offset_tolerance: 0.1,
            upper_arm_min_angle: 70.0,
            upper_arm_max_angle: 110.0,
            confidence_floor: 0.5,
            live_cheat_ratio: 0.3,
            batch_cheat_ratio: 0.5,
            warmup_frames: 10,
            min_live_duration_sec: 2.0,
            rep_goal: 10,
            jump_rise_threshold: 0.05,
            jump_land_threshold: 0.02,
            baseline_smoothing: 0.95,
            default_fps: 30.0,
            ankle_height_scale: 200.0,
            min_jump_height_cm: 15.0,
            gravity: 9.81,
        }
    }
}

impl AnalysisConfig {
    /// Load a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        let config: AnalysisConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Reject threshold combinations the state machines cannot run with
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.bicep_up_threshold >= self.bicep_down_threshold {
            return Err(AnalysisError::InvalidConfig(format!(
                "bicep_up_threshold ({}) must be below bicep_down_threshold ({})",
                self.bicep_up_threshold, self.bicep_down_threshold
            )));
        }
        if self.situp_up_threshold >= self.situp_down_threshold {
            return Err(AnalysisError::InvalidConfig(format!(
                "situp_up_threshold ({}) must be below situp_down_threshold ({})",
                self.situp_up_threshold, self.situp_down_threshold
            )));
        }
        if self.upper_arm_min_angle > self.upper_arm_max_angle {
            return Err(AnalysisError::InvalidConfig(
                "upper_arm_min_angle must not exceed upper_arm_max_angle".to_string(),
            ));
        }
        for (name, ratio) in [
            ("live_cheat_ratio", self.live_cheat_ratio),
            ("batch_cheat_ratio", self.batch_cheat_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(AnalysisError::InvalidConfig(format!(
                    "{} must be in (0, 1], got {}",
                    name, ratio
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.confidence_floor) {
            return Err(AnalysisError::InvalidConfig(format!(
                "confidence_floor must be in [0, 1], got {}",
                self.confidence_floor
            )));
        }
        if !(0.0..1.0).contains(&self.baseline_smoothing) {
            return Err(AnalysisError::InvalidConfig(format!(
                "baseline_smoothing must be in [0, 1), got {}",
                self.baseline_smoothing
            )));
        }
        if self.default_fps <= 0.0 {
            return Err(AnalysisError::InvalidConfig(
                "default_fps must be positive".to_string(),
            ));
        }
        if self.jump_land_threshold > self.jump_rise_threshold {
            return Err(AnalysisError::InvalidConfig(
                "jump_land_threshold must not exceed jump_rise_threshold".to_string(),
            ));
        }
        Ok(())
    }
}
