//! Vertical jump measurement
//!
//! Two estimators exist and are deliberately kept apart because they do not
//! agree numerically:
//! - `FlightTimeEstimator` detects takeoff and landing from the hip's rise
//!   over a smoothed baseline and converts flight time to height.
//! - `AnkleDisplacementEstimator` scales the ankles' peak rise over the first
//!   detected frame directly to centimeters.
//!
//! LIVE analysis uses flight time; FILE analysis uses ankle displacement.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::types::{AnalysisMode, JointName, PoseLandmarks};
use serde::{Deserialize, Serialize};

/// Accumulated jump measurements
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JumpMetrics {
    /// Best height so far (cm)
    pub max_height_cm: f64,
    /// Height of the most recent completed jump (cm)
    pub last_height_cm: f64,
    pub jump_count: u32,
}

/// A jump-height strategy fed one detected frame at a time
pub trait JumpEstimator {
    fn strategy(&self) -> JumpStrategy;

    /// Feed one detected pose. `frame_index` counts every frame of the stream,
    /// detected or not, starting at 1.
    fn update(
        &mut self,
        pose: &PoseLandmarks,
        frame_index: u64,
        cheating: bool,
    ) -> Result<(), AnalysisError>;

    fn metrics(&self) -> JumpMetrics;

    fn is_airborne(&self) -> bool {
        false
    }
}

/// Named jump-height strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpStrategy {
    FlightTime,
    AnkleDisplacement,
}

impl JumpStrategy {
    pub fn for_mode(mode: AnalysisMode) -> Self {
        match mode {
            AnalysisMode::Live => JumpStrategy::FlightTime,
            AnalysisMode::File => JumpStrategy::AnkleDisplacement,
        }
    }

    pub fn build(&self, config: &AnalysisConfig, fps: f64) -> Box<dyn JumpEstimator> {
        match self {
            JumpStrategy::FlightTime => Box::new(FlightTimeEstimator::new(config, fps)),
            JumpStrategy::AnkleDisplacement => Box::new(AnkleDisplacementEstimator::new(config)),
        }
    }
}

/// Height from flight time: h = 1/2 * g * (t/2)^2
pub fn height_from_flight_time(flight_time_sec: f64, gravity: f64) -> f64 {
    let half = flight_time_sec / 2.0;
    0.5 * gravity * half * half
}

/// Takeoff/landing detector over the left hip
#[derive(Debug, Clone)]
pub struct FlightTimeEstimator {
    rise_threshold: f64,
    land_threshold: f64,
    smoothing: f64,
    fps: f64,
    gravity: f64,
    baseline_y: Option<f64>,
    airborne: bool,
    takeoff_frame: Option<u64>,
    metrics: JumpMetrics,
}

impl FlightTimeEstimator {
    pub fn new(config: &AnalysisConfig, fps: f64) -> Self {
        Self {
            rise_threshold: config.jump_rise_threshold,
            land_threshold: config.jump_land_threshold,
            smoothing: config.baseline_smoothing,
            fps: if fps > 0.0 { fps } else { config.default_fps },
            gravity: config.gravity,
            baseline_y: None,
            airborne: false,
            takeoff_frame: None,
            metrics: JumpMetrics::default(),
        }
    }

    pub fn baseline_y(&self) -> Option<f64> {
        self.baseline_y
    }
}

impl JumpEstimator for FlightTimeEstimator {
    fn strategy(&self) -> JumpStrategy {
        JumpStrategy::FlightTime
    }

    fn update(
        &mut self,
        pose: &PoseLandmarks,
        frame_index: u64,
        cheating: bool,
    ) -> Result<(), AnalysisError> {
        let hip_y = pose.point(JointName::LeftHip)?.y;
        let baseline = *self.baseline_y.get_or_insert(hip_y);

        // y grows downward: rising means a smaller y
        if !self.airborne && hip_y < baseline - self.rise_threshold && !cheating {
            self.airborne = true;
            self.takeoff_frame = Some(frame_index);
            tracing::debug!(frame_index, hip_y, baseline, "takeoff");
        }

        if self.airborne && hip_y > baseline - self.land_threshold {
            if let Some(takeoff) = self.takeoff_frame.take() {
                let flight_time = frame_index.saturating_sub(takeoff) as f64 / self.fps;
                let height_cm = 100.0 * height_from_flight_time(flight_time, self.gravity);
                self.metrics.last_height_cm = height_cm;
                self.metrics.max_height_cm = self.metrics.max_height_cm.max(height_cm);
                self.metrics.jump_count += 1;
                tracing::info!(flight_time, height_cm, "jump landed");
            }
            self.airborne = false;
        }

        if !self.airborne {
            self.baseline_y = Some(baseline * self.smoothing + hip_y * (1.0 - self.smoothing));
        }

        Ok(())
    }

    fn metrics(&self) -> JumpMetrics {
        self.metrics
    }

    fn is_airborne(&self) -> bool {
        self.airborne
    }
}

/// Peak ankle rise over the first detected frame, linearly scaled
#[derive(Debug, Clone)]
pub struct AnkleDisplacementEstimator {
    scale: f64,
    min_jump_height_cm: f64,
    baseline_y: Option<f64>,
    metrics: JumpMetrics,
}

impl AnkleDisplacementEstimator {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            scale: config.ankle_height_scale,
            min_jump_height_cm: config.min_jump_height_cm,
            baseline_y: None,
            metrics: JumpMetrics::default(),
        }
    }
}

impl JumpEstimator for AnkleDisplacementEstimator {
    fn strategy(&self) -> JumpStrategy {
        JumpStrategy::AnkleDisplacement
    }

    fn update(
        &mut self,
        pose: &PoseLandmarks,
        _frame_index: u64,
        _cheating: bool,
    ) -> Result<(), AnalysisError> {
        let left = pose.point(JointName::LeftAnkle)?.y;
        let right = pose.point(JointName::RightAnkle)?.y;
        let ankle_y = (left + right) / 2.0;

        let baseline = *self.baseline_y.get_or_insert(ankle_y);
        let height_cm = ((baseline - ankle_y) * self.scale).max(0.0);

        self.metrics.last_height_cm = height_cm;
        self.metrics.max_height_cm = self.metrics.max_height_cm.max(height_cm);

        // Single-jump clip: any clearance above the minimum is the jump
        if height_cm > self.min_jump_height_cm {
            self.metrics.jump_count = 1;
        }

        Ok(())
    }

    fn metrics(&self) -> JumpMetrics {
        self.metrics
    }
}
