//! End-of-workout summary
//!
//! Turns a finished `AnalysisResult` into goal progress and a short plain-text
//! report for the athlete.

use crate::config::AnalysisConfig;
use crate::types::{AnalysisResult, ExerciseMetrics};
use serde::Serialize;
use std::fmt::Write;

/// Jump heights above these earn a better rating (cm)
const EXCELLENT_JUMP_CM: f64 = 30.0;
const GOOD_JUMP_CM: f64 = 20.0;

/// Progress toward the rep goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GoalProgress {
    pub target: u32,
    pub completed: u32,
}

impl GoalProgress {
    /// Goal progress for a rep-counted result. The goal is per limb, so a
    /// two-arm exercise must reach twice the configured goal.
    pub fn for_metrics(metrics: &ExerciseMetrics, rep_goal: u32) -> Option<Self> {
        match metrics {
            ExerciseMetrics::BilateralReps { total_reps, .. } => Some(Self {
                target: rep_goal.saturating_mul(2),
                completed: *total_reps,
            }),
            ExerciseMetrics::Reps { total_reps } => Some(Self {
                target: rep_goal,
                completed: *total_reps,
            }),
            ExerciseMetrics::Jump { .. } => None,
        }
    }

    pub fn reached(&self) -> bool {
        self.completed >= self.target
    }

    pub fn remaining(&self) -> u32 {
        self.target.saturating_sub(self.completed)
    }
}

/// Qualitative rating of the best jump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpRating {
    Excellent,
    Good,
    NeedsWork,
}

impl JumpRating {
    pub fn from_height(height_cm: f64) -> Self {
        if height_cm > EXCELLENT_JUMP_CM {
            JumpRating::Excellent
        } else if height_cm > GOOD_JUMP_CM {
            JumpRating::Good
        } else {
            JumpRating::NeedsWork
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            JumpRating::Excellent => "Excellent jump height!",
            JumpRating::Good => "Good jump. Keep practising to go higher.",
            JumpRating::NeedsWork => "Keep working on your jump technique.",
        }
    }
}

/// Render the plain-text workout summary
pub fn render_text(result: &AnalysisResult, config: &AnalysisConfig) -> String {
    let mut out = String::new();
    let rule = "=".repeat(50);

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "WORKOUT SUMMARY ({})", result.exercise_type);
    let _ = writeln!(out, "{rule}");

    if let Some(error) = &result.error {
        let _ = writeln!(out, "Analysis failed: {error}");
    }

    match &result.metrics {
        Some(ExerciseMetrics::BilateralReps {
            total_reps,
            left_reps,
            right_reps,
        }) => {
            let _ = writeln!(out, "Left arm: {left_reps} reps");
            let _ = writeln!(out, "Right arm: {right_reps} reps");
            let _ = writeln!(out, "Total: {total_reps} reps");
        }
        Some(ExerciseMetrics::Reps { total_reps }) => {
            let _ = writeln!(out, "Sit-ups completed: {total_reps} reps");
        }
        Some(ExerciseMetrics::Jump {
            max_height_cm,
            jump_count,
        }) => {
            let _ = writeln!(out, "Best vertical jump: {max_height_cm:.2} cm ({jump_count} jumps)");
            let _ = writeln!(out, "{}", JumpRating::from_height(*max_height_cm).message());
        }
        None => {}
    }

    if let Some(metrics) = &result.metrics {
        write_goal(&mut out, metrics, config.rep_goal);
    }

    if let Some(score) = result.form_score {
        let _ = writeln!(out, "Form score: {score}/100");
    }
    if result.cheat_detected {
        let _ = writeln!(out, "Warning: poor video quality or obstructed view detected");
    }

    let _ = writeln!(out, "Total frames analysed: {}", result.frames_processed);
    if result.low_confidence_frames > 0 {
        if let Some(quality) = result.detection_quality {
            let _ = writeln!(out, "Detection confidence: {:.1}%", quality * 100.0);
        }
    }
    let _ = writeln!(out, "{rule}");

    out
}

fn write_goal(out: &mut String, metrics: &ExerciseMetrics, rep_goal: u32) {
    let Some(goal) = GoalProgress::for_metrics(metrics, rep_goal) else {
        return;
    };
    if goal.reached() {
        let _ = writeln!(out, "Goal of {} reps reached!", goal.target);
    } else {
        let _ = writeln!(out, "Keep going: {} more reps to reach your goal of {}.", goal.remaining(), goal.target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn result_with(metrics: ExerciseMetrics) -> AnalysisResult {
        let mut result = AnalysisResult::failure("BICEP_CURLS", "FILE", None, "");
        result.success = true;
        result.error = None;
        result.metrics = Some(metrics);
        result.form_score = Some(100);
        result.frames_processed = 200;
        result
    }

    #[test]
    fn test_bilateral_goal_is_doubled() {
        let metrics = ExerciseMetrics::BilateralReps {
            total_reps: 15,
            left_reps: 8,
            right_reps: 7,
        };
        let goal = GoalProgress::for_metrics(&metrics, 10).unwrap();
        assert_eq!(goal.target, 20);
        assert!(!goal.reached());
        assert_eq!(goal.remaining(), 5);
    }

    #[test]
    fn test_situp_goal() {
        let goal = GoalProgress::for_metrics(&ExerciseMetrics::Reps { total_reps: 12 }, 10).unwrap();
        assert!(goal.reached());
        assert_eq!(goal.remaining(), 0);
    }

    #[test]
    fn test_jump_has_no_goal() {
        let metrics = ExerciseMetrics::Jump {
            max_height_cm: 25.0,
            jump_count: 2,
        };
        assert_eq!(GoalProgress::for_metrics(&metrics, 10), None);
    }

    #[test]
    fn test_jump_rating() {
        assert_eq!(JumpRating::from_height(31.0), JumpRating::Excellent);
        assert_eq!(JumpRating::from_height(30.0), JumpRating::Good);
        assert_eq!(JumpRating::from_height(20.5), JumpRating::Good);
        assert_eq!(JumpRating::from_height(20.0), JumpRating::NeedsWork);
    }

    #[test]
    fn test_render_curls() {
        let mut result = result_with(ExerciseMetrics::BilateralReps {
            total_reps: 15,
            left_reps: 8,
            right_reps: 7,
        });
        result.low_confidence_frames = 50;
        result.detection_quality = Some(0.75);

        let text = render_text(&result, &AnalysisConfig::default());
        assert!(text.contains("Left arm: 8 reps"));
        assert!(text.contains("Total: 15 reps"));
        assert!(text.contains("5 more reps to reach your goal of 20"));
        assert!(text.contains("Total frames analysed: 200"));
        assert!(text.contains("Detection confidence: 75.0%"));
    }

    #[test]
    fn test_render_jump() {
        let result = result_with(ExerciseMetrics::Jump {
            max_height_cm: 32.456,
            jump_count: 1,
        });
        let text = render_text(&result, &AnalysisConfig::default());
        assert!(text.contains("Best vertical jump: 32.46 cm"));
        assert!(text.contains("Excellent jump height!"));
        assert!(!text.contains("Detection confidence"));
    }
}
