//! Per-frame form evaluation
//!
//! A form evaluator scores one limb's posture in one frame against
//! exercise-specific rules. Only exercises with posture rules have one;
//! sit-ups and jumps are judged purely by their counting signal.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::geometry::{angle_at_vertex, distance};
use crate::types::{FormVerdict, Point, PoseLandmarks, Side};

pub const ISSUE_ELBOW_DRIFT: &str = "Keep elbow close to body";
pub const ISSUE_UPPER_ARM: &str = "Keep upper arm stable";
pub const ISSUE_ELBOW_BACK: &str = "Don't swing elbow back";
pub const ISSUE_ELBOW_FORWARD: &str = "Don't swing elbow forward";

/// Posture rules for one exercise
pub trait FormEvaluator {
    /// Evaluate one limb of a detected pose
    fn evaluate(&self, pose: &PoseLandmarks, side: Side) -> Result<FormVerdict, AnalysisError>;
}

/// The four joints of one arm
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmJoints {
    pub shoulder: Point,
    pub elbow: Point,
    pub wrist: Point,
    pub hip: Point,
}

impl ArmJoints {
    pub fn extract(pose: &PoseLandmarks, side: Side) -> Result<Self, AnalysisError> {
        Ok(Self {
            shoulder: pose.point(side.shoulder())?,
            elbow: pose.point(side.elbow())?,
            wrist: pose.point(side.wrist())?,
            hip: pose.point(side.hip())?,
        })
    }

    /// Shoulder-elbow-wrist angle, the curl's counting signal
    pub fn elbow_angle(&self) -> f64 {
        angle_at_vertex(self.shoulder, self.elbow, self.wrist)
    }

    /// Hip-shoulder-elbow angle
    pub fn upper_arm_angle(&self) -> f64 {
        angle_at_vertex(self.hip, self.shoulder, self.elbow)
    }
}

/// Bicep curl posture rules
#[derive(Debug, Clone)]
pub struct BicepFormEvaluator {
    drift_tolerance: f64,
    offset_tolerance: f64,
    upper_arm_min: f64,
    upper_arm_max: f64,
}

impl Default for BicepFormEvaluator {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl BicepFormEvaluator {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            drift_tolerance: config.elbow_drift_tolerance,
            offset_tolerance: config.elbow_offset_tolerance,
            upper_arm_min: config.upper_arm_min_angle,
            upper_arm_max: config.upper_arm_max_angle,
        }
    }

    /// Apply every rule to one arm; each violated rule adds one issue
    pub fn check(&self, arm: &ArmJoints) -> FormVerdict {
        let mut issues = Vec::new();

        if distance(arm.shoulder, arm.elbow) > self.drift_tolerance {
            issues.push(ISSUE_ELBOW_DRIFT.to_string());
        }

        let upper_arm = arm.upper_arm_angle();
        if upper_arm < self.upper_arm_min || upper_arm > self.upper_arm_max {
            issues.push(ISSUE_UPPER_ARM.to_string());
        }

        // Back and forward swings are mutually exclusive
        if arm.elbow.x < arm.shoulder.x - self.offset_tolerance {
            issues.push(ISSUE_ELBOW_BACK.to_string());
        } else if arm.elbow.x > arm.shoulder.x + self.offset_tolerance {
            issues.push(ISSUE_ELBOW_FORWARD.to_string());
        }

        FormVerdict::from_issues(issues)
    }
}

impl FormEvaluator for BicepFormEvaluator {
    fn evaluate(&self, pose: &PoseLandmarks, side: Side) -> Result<FormVerdict, AnalysisError> {
        let arm = ArmJoints::extract(pose, side)?;
        Ok(self.check(&arm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FormStatus, JointName, Landmark, GOOD_FORM_FEEDBACK};
    use pretty_assertions::assert_eq;

    fn arm(elbow: (f64, f64)) -> ArmJoints {
        ArmJoints {
            shoulder: Point::new(0.5, 0.3),
            elbow: Point::new(elbow.0, elbow.1),
            wrist: Point::new(0.6, 0.2),
            hip: Point::new(0.5, 0.6),
        }
    }

    #[test]
    fn test_good_form() {
        // Upper arm perpendicular to the torso, elbow tucked in
        let verdict = BicepFormEvaluator::default().check(&arm((0.58, 0.3)));
        assert_eq!(verdict.status, FormStatus::Good);
        assert_eq!(verdict.feedback, GOOD_FORM_FEEDBACK);
        assert!(verdict.issues.is_empty());
    }

    #[test]
    fn test_hanging_arm_flags_upper_arm() {
        // Elbow straight below the shoulder: hip-shoulder-elbow angle is 0
        let verdict = BicepFormEvaluator::default().check(&arm((0.5, 0.45)));
        assert_eq!(verdict.issues, vec![ISSUE_UPPER_ARM.to_string()]);
    }

    #[test]
    fn test_elbow_swung_forward() {
        let verdict = BicepFormEvaluator::default().check(&arm((0.65, 0.3)));
        assert_eq!(verdict.status, FormStatus::Bad);
        assert_eq!(verdict.issues, vec![ISSUE_ELBOW_FORWARD.to_string()]);
        assert_eq!(verdict.feedback, ISSUE_ELBOW_FORWARD);
    }

    #[test]
    fn test_elbow_swung_back_and_drifting() {
        let verdict = BicepFormEvaluator::default().check(&arm((0.2, 0.3)));
        assert_eq!(
            verdict.issues,
            vec![ISSUE_ELBOW_DRIFT.to_string(), ISSUE_ELBOW_BACK.to_string()]
        );
        assert_eq!(verdict.feedback, ISSUE_ELBOW_DRIFT);
    }

    #[test]
    fn test_evaluate_reports_missing_joint() {
        let pose = PoseLandmarks::new()
            .with(JointName::LeftShoulder, Landmark::new(0.5, 0.3, 0.9))
            .with(JointName::LeftElbow, Landmark::new(0.58, 0.3, 0.9));
        let err = BicepFormEvaluator::default()
            .evaluate(&pose, Side::Left)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingLandmark(_)));
    }

    #[test]
    fn test_thresholds_follow_config() {
        let config = AnalysisConfig {
            elbow_offset_tolerance: 0.2,
            ..Default::default()
        };
        let verdict = BicepFormEvaluator::from_config(&config).check(&arm((0.65, 0.3)));
        assert!(verdict.is_good());
    }
}
