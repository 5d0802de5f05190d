//! Repetition counting
//!
//! A two-threshold state machine turns a stream of joint angles into discrete
//! repetitions. One instance tracks one counted limb. The gap between the two
//! thresholds is the only hysteresis: samples inside it leave the stage alone.

use crate::config::AnalysisConfig;
use crate::types::Stage;

/// Which crossing credits a repetition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountDirection {
    /// Arm on a large angle (down), credit on a small one (up). Bicep curls.
    OnFlexion,
    /// Arm on a small angle (up), credit on a large one (down). Sit-ups.
    OnExtension,
}

/// Rep-counting state machine for one limb
#[derive(Debug, Clone)]
pub struct RepCounter {
    label: &'static str,
    direction: CountDirection,
    /// Angle under which the joint is flexed
    low: f64,
    /// Angle over which the joint is extended
    high: f64,
    stage: Stage,
    reps: u32,
}

impl RepCounter {
    pub fn new(label: &'static str, direction: CountDirection, low: f64, high: f64) -> Self {
        Self {
            label,
            direction,
            low,
            high,
            stage: Stage::Unset,
            reps: 0,
        }
    }

    pub fn bicep(label: &'static str, config: &AnalysisConfig) -> Self {
        Self::new(
            label,
            CountDirection::OnFlexion,
            config.bicep_up_threshold,
            config.bicep_down_threshold,
        )
    }

    pub fn situp(config: &AnalysisConfig) -> Self {
        Self::new(
            "torso",
            CountDirection::OnExtension,
            config.situp_up_threshold,
            config.situp_down_threshold,
        )
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn reps(&self) -> u32 {
        self.reps
    }

    /// Feed one angle sample. `allow_credit` is false when form or detection
    /// quality forbids crediting; the crossing is then ignored entirely.
    ///
    /// Returns true when this sample completed a repetition.
    pub fn update(&mut self, angle: f64, allow_credit: bool) -> bool {
        let (arm_stage, credit_stage, arms, credits) = match self.direction {
            CountDirection::OnFlexion => (Stage::Down, Stage::Up, angle > self.high, angle < self.low),
            CountDirection::OnExtension => (Stage::Up, Stage::Down, angle < self.low, angle > self.high),
        };

        if arms && self.stage != arm_stage {
            tracing::debug!(limb = self.label, angle, "stage -> {}", arm_stage.label());
            self.stage = arm_stage;
        }

        if credits && self.stage == arm_stage && allow_credit {
            self.stage = credit_stage;
            self.reps += 1;
            tracing::info!(limb = self.label, reps = self.reps, angle, "repetition counted");
            return true;
        }

        false
    }
}
