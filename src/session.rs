//! Exercise session aggregation
//!
//! An `ExerciseSession` owns all mutable state for one continuous analysis of
//! one exercise. Each frame is pushed through quality gating, form evaluation
//! and rep counting before the next one is accepted; `finalize` turns the
//! accumulated state into the scored `AnalysisResult`.

use crate::config::AnalysisConfig;
use crate::counter::RepCounter;
use crate::error::AnalysisError;
use crate::form::{ArmJoints, BicepFormEvaluator};
use crate::geometry::angle_at_vertex;
use crate::jump::{JumpEstimator, JumpMetrics, JumpStrategy};
use crate::quality::QualityGate;
use crate::types::{
    AnalysisMode, AnalysisResult, ExerciseMetrics, ExerciseType, FormVerdict, FrameSample,
    PoseLandmarks, Side, Stage, POOR_QUALITY_ISSUE,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Scores applied when the batch quality verdict flags the clip
const CHEAT_FORM_SCORE: u32 = 40;
const CHEAT_CONSISTENCY_SCORE: u32 = 50;
const CONSISTENCY_SCORE: u32 = 85;
/// Form score floor while not cheating
const FORM_SCORE_FLOOR: u32 = 60;
/// Deduction per distinct form issue
const ISSUE_PENALTY: u32 = 10;
const BICEP_FORM_CEILING: u32 = 100;
const SITUP_FORM_CEILING: u32 = 90;
const JUMP_FORM_SCORE: u32 = 90;

/// Counting state of one limb plus the last verdict it received
#[derive(Debug, Clone)]
struct LimbState {
    counter: RepCounter,
    angle: Option<f64>,
    verdict: Option<FormVerdict>,
}

impl LimbState {
    fn new(counter: RepCounter) -> Self {
        Self {
            counter,
            angle: None,
            verdict: None,
        }
    }

    fn report(&self, limb: &str) -> LimbReport {
        LimbReport {
            limb: limb.to_string(),
            stage: self.counter.stage(),
            reps: self.counter.reps(),
            angle: self.angle,
            form: self.verdict.clone(),
        }
    }
}

/// Exercise-specific state
enum Tracker {
    BicepCurls {
        evaluator: BicepFormEvaluator,
        left: LimbState,
        right: LimbState,
    },
    Situps {
        torso: LimbState,
    },
    VerticalJump {
        estimator: Box<dyn JumpEstimator>,
    },
}

/// Per-limb view of one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimbReport {
    pub limb: String,
    pub stage: Stage,
    pub reps: u32,
    pub angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<FormVerdict>,
}

/// What one processed frame changed, for live feedback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame_index: u64,
    pub detected: bool,
    pub low_confidence: bool,
    /// Live cheat flag; reps are not credited while set
    pub cheating: bool,
    /// Set when the frame was skipped by a recoverable fault
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
    pub rep_counted: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub limbs: Vec<LimbReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jump: Option<JumpMetrics>,
    pub airborne: bool,
}

/// Mutable state of one analysis run for exactly one exercise
pub struct ExerciseSession {
    session_id: String,
    started_at: DateTime<Utc>,
    exercise: ExerciseType,
    mode: AnalysisMode,
    source: Option<String>,
    fps: f64,
    quality: QualityGate,
    tracker: Tracker,
    frames_processed: u64,
    extraction_faults: u64,
    form_issues: Vec<String>,
    cheating: bool,
    /// Frame index and timestamp (ms) of the last timestamped frame
    last_timestamp: Option<(u64, f64)>,
}

impl ExerciseSession {
    /// Start a session. `fps` falls back to the configured default when the
    /// source does not report a usable rate.
    pub fn new(
        exercise: ExerciseType,
        mode: AnalysisMode,
        config: &AnalysisConfig,
        fps: Option<f64>,
    ) -> Self {
        let fps = fps.filter(|f| *f > 0.0).unwrap_or(config.default_fps);

        let min_duration = match mode {
            AnalysisMode::Live => Some(config.min_live_duration_sec),
            AnalysisMode::File => None,
        };

        let tracker = match exercise {
            ExerciseType::BicepCurls => Tracker::BicepCurls {
                evaluator: BicepFormEvaluator::from_config(config),
                left: LimbState::new(RepCounter::bicep("left_arm", config)),
                right: LimbState::new(RepCounter::bicep("right_arm", config)),
            },
            ExerciseType::Situps => Tracker::Situps {
                torso: LimbState::new(RepCounter::situp(config)),
            },
            ExerciseType::VerticalJump => Tracker::VerticalJump {
                estimator: JumpStrategy::for_mode(mode).build(config, fps),
            },
        };

        let session_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!(%session_id, exercise = %exercise, mode = %mode, fps, "session started");

        Self {
            session_id,
            started_at: Utc::now(),
            exercise,
            mode,
            source: None,
            fps,
            quality: QualityGate::new(config, min_duration),
            tracker,
            frames_processed: 0,
            extraction_faults: 0,
            form_issues: Vec::new(),
            cheating: false,
            last_timestamp: None,
        }
    }

    /// Attach an opaque description of the frame source (path, camera id)
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn exercise(&self) -> ExerciseType {
        self.exercise
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn extraction_faults(&self) -> u64 {
        self.extraction_faults
    }

    /// Live cheat flag as of the last frame
    pub fn is_cheating(&self) -> bool {
        self.cheating
    }

    /// Deduplicated form issues seen so far, in first-seen order
    pub fn form_issues(&self) -> &[String] {
        &self.form_issues
    }

    /// Process one frame from the pose provider
    pub fn process_frame(&mut self, sample: &FrameSample) -> FrameReport {
        self.frames_processed += 1;
        let frame_index = self.frames_processed;

        if let Some(ms) = sample.timestamp_ms {
            self.last_timestamp = Some((frame_index, ms));
        }
        let elapsed_sec = self.elapsed_sec(frame_index);

        let low_confidence = self.quality.observe(sample.pose.as_ref());
        self.cheating = self.quality.live_flag(elapsed_sec);

        let mut fault = None;
        let mut rep_counted = false;

        if let Some(pose) = &sample.pose {
            match self.apply_exercise(pose, frame_index) {
                Ok(counted) => rep_counted = counted,
                Err(e) => {
                    self.extraction_faults += 1;
                    tracing::warn!(frame_index, error = %e, "skipping frame");
                    fault = Some(e.to_string());
                }
            }
        }

        self.report(frame_index, sample.is_detected(), low_confidence, fault, rep_counted)
    }

    /// Count a frame the source could not decode. It is treated as a frame
    /// without a usable detection and skipped for exercise logic.
    pub fn skip_frame(&mut self, error: &AnalysisError) -> FrameReport {
        self.frames_processed += 1;
        self.extraction_faults += 1;
        let frame_index = self.frames_processed;

        self.quality.record(true);
        self.cheating = self.quality.live_flag(self.elapsed_sec(frame_index));

        tracing::warn!(frame_index, error = %error, "skipping undecodable frame");
        self.report(frame_index, false, true, Some(error.to_string()), false)
    }

    /// Seconds since the stream began. Once a frame carried a timestamp,
    /// frames without one are placed after it at the session frame rate.
    fn elapsed_sec(&self, frame_index: u64) -> f64 {
        match self.last_timestamp {
            Some((index, ms)) => ms / 1000.0 + (frame_index - index) as f64 / self.fps,
            None => (frame_index - 1) as f64 / self.fps,
        }
    }

    /// Run the exercise logic for a detected pose. Every landmark is read
    /// before any state changes so a fault leaves the session untouched.
    fn apply_exercise(
        &mut self,
        pose: &PoseLandmarks,
        frame_index: u64,
    ) -> Result<bool, AnalysisError> {
        let cheating = self.cheating;

        match &mut self.tracker {
            Tracker::BicepCurls {
                evaluator,
                left,
                right,
            } => {
                let left_arm = ArmJoints::extract(pose, Side::Left)?;
                let right_arm = ArmJoints::extract(pose, Side::Right)?;

                let mut counted = false;
                for (limb, arm) in [(left, left_arm), (right, right_arm)] {
                    let angle = arm.elbow_angle();
                    let verdict = evaluator.check(&arm);

                    for issue in &verdict.issues {
                        if !self.form_issues.contains(issue) {
                            self.form_issues.push(issue.clone());
                        }
                    }

                    counted |= limb.counter.update(angle, verdict.is_good() && !cheating);
                    limb.angle = Some(angle);
                    limb.verdict = Some(verdict);
                }
                Ok(counted)
            }
            Tracker::Situps { torso } => {
                let shoulder = pose.point(Side::Left.shoulder())?;
                let hip = pose.point(Side::Left.hip())?;
                let knee = pose.point(Side::Left.knee())?;

                let angle = angle_at_vertex(shoulder, hip, knee);
                torso.angle = Some(angle);
                Ok(torso.counter.update(angle, !cheating))
            }
            Tracker::VerticalJump { estimator } => {
                let before = estimator.metrics().jump_count;
                estimator.update(pose, frame_index, cheating)?;
                Ok(estimator.metrics().jump_count > before)
            }
        }
    }

    fn report(
        &self,
        frame_index: u64,
        detected: bool,
        low_confidence: bool,
        fault: Option<String>,
        rep_counted: bool,
    ) -> FrameReport {
        let (limbs, jump, airborne) = match &self.tracker {
            Tracker::BicepCurls { left, right, .. } => {
                (vec![left.report("left_arm"), right.report("right_arm")], None, false)
            }
            Tracker::Situps { torso } => (vec![torso.report("torso")], None, false),
            Tracker::VerticalJump { estimator } => {
                (Vec::new(), Some(estimator.metrics()), estimator.is_airborne())
            }
        };

        FrameReport {
            frame_index,
            detected,
            low_confidence,
            cheating: self.cheating,
            fault,
            rep_counted,
            limbs,
            jump,
            airborne,
        }
    }

    /// Produce the scored result from everything processed so far.
    ///
    /// Reads state only, so calling it repeatedly yields the same result and
    /// a cancelled run still yields a well-formed partial result.
    pub fn finalize(&self) -> AnalysisResult {
        let mut result = AnalysisResult {
            session_id: self.session_id.clone(),
            producer: crate::PRODUCER_NAME.to_string(),
            engine_version: crate::ENGINE_VERSION.to_string(),
            exercise_type: self.exercise.as_str().to_string(),
            analysis_mode: self.mode.as_str().to_string(),
            source: self.source.clone(),
            started_at: self.started_at,
            success: false,
            error: None,
            metrics: None,
            form_score: None,
            consistency_score: None,
            cheat_detected: false,
            form_issues: None,
            frames_processed: self.frames_processed,
            low_confidence_frames: self.quality.low_confidence_frames(),
            extraction_faults: self.extraction_faults,
            detection_quality: self.quality.detection_quality(),
        };

        if self.frames_processed == 0 {
            result.error = Some(AnalysisError::NoFrames.to_string());
            return result;
        }

        let cheat_detected = self.quality.batch_flag();
        let consistency = if cheat_detected {
            CHEAT_CONSISTENCY_SCORE
        } else {
            CONSISTENCY_SCORE
        };

        let mut issues = self.form_issues.clone();
        if cheat_detected {
            issues.push(POOR_QUALITY_ISSUE.to_string());
        }

        let (metrics, form_score, form_issues) = match &self.tracker {
            Tracker::BicepCurls { left, right, .. } => {
                let left_reps = left.counter.reps();
                let right_reps = right.counter.reps();
                (
                    ExerciseMetrics::BilateralReps {
                        total_reps: left_reps + right_reps,
                        left_reps,
                        right_reps,
                    },
                    self.issue_score(BICEP_FORM_CEILING, cheat_detected),
                    Some(issues),
                )
            }
            Tracker::Situps { torso } => (
                ExerciseMetrics::Reps {
                    total_reps: torso.counter.reps(),
                },
                self.issue_score(SITUP_FORM_CEILING, cheat_detected),
                Some(issues),
            ),
            Tracker::VerticalJump { estimator } => {
                let jump = estimator.metrics();
                (
                    ExerciseMetrics::Jump {
                        max_height_cm: round2(jump.max_height_cm),
                        jump_count: jump.jump_count,
                    },
                    if cheat_detected {
                        CHEAT_FORM_SCORE
                    } else {
                        JUMP_FORM_SCORE
                    },
                    None,
                )
            }
        };

        result.success = true;
        result.metrics = Some(metrics);
        result.form_score = Some(form_score);
        result.consistency_score = Some(consistency);
        result.cheat_detected = cheat_detected;
        result.form_issues = form_issues;

        tracing::debug!(
            session_id = %self.session_id,
            frames = self.frames_processed,
            cheat_detected,
            "session finalized"
        );

        result
    }

    fn issue_score(&self, ceiling: u32, cheat_detected: bool) -> u32 {
        if cheat_detected {
            return CHEAT_FORM_SCORE;
        }
        let penalty = ISSUE_PENALTY.saturating_mul(self.form_issues.len() as u32);
        ceiling.saturating_sub(penalty).max(FORM_SCORE_FLOOR)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JointName, Landmark};
    use pretty_assertions::assert_eq;

    const SHOULDER: (f64, f64) = (0.5, 0.3);
    const ELBOW: (f64, f64) = (0.58, 0.3);
    const HIP: (f64, f64) = (0.5, 0.6);

    /// Wrist placed so the shoulder-elbow-wrist angle equals `elbow_angle`
    fn wrist_for(elbow_angle: f64) -> (f64, f64) {
        let theta = (180.0 - elbow_angle).to_radians();
        (ELBOW.0 + 0.1 * theta.cos(), ELBOW.1 + 0.1 * theta.sin())
    }

    fn arm(pose: PoseLandmarks, side: Side, elbow_angle: f64) -> PoseLandmarks {
        let wrist = wrist_for(elbow_angle);
        pose.with(side.shoulder(), Landmark::new(SHOULDER.0, SHOULDER.1, 0.9))
            .with(side.elbow(), Landmark::new(ELBOW.0, ELBOW.1, 0.9))
            .with(side.wrist(), Landmark::new(wrist.0, wrist.1, 0.9))
            .with(side.hip(), Landmark::new(HIP.0, HIP.1, 0.9))
    }

    fn curl_frame(left_angle: f64, right_angle: f64) -> FrameSample {
        let pose = arm(PoseLandmarks::new(), Side::Left, left_angle);
        FrameSample::detected(arm(pose, Side::Right, right_angle))
    }

    fn situp_frame(torso_angle: f64) -> FrameSample {
        // Knee placed at `torso_angle` around the hip from the shoulder direction
        let theta = (-90.0 + torso_angle).to_radians();
        let pose = PoseLandmarks::new()
            .with(JointName::LeftShoulder, Landmark::new(0.5, 0.3, 0.9))
            .with(JointName::LeftHip, Landmark::new(0.5, 0.6, 0.9))
            .with(
                JointName::LeftKnee,
                Landmark::new(0.5 + 0.2 * theta.cos(), 0.6 + 0.2 * theta.sin(), 0.9),
            );
        FrameSample::detected(pose)
    }

    fn curl_session() -> ExerciseSession {
        ExerciseSession::new(
            ExerciseType::BicepCurls,
            AnalysisMode::File,
            &AnalysisConfig::default(),
            Some(30.0),
        )
    }

    #[test]
    fn test_fixture_geometry() {
        let pose = curl_frame(30.0, 160.0).pose.unwrap();
        let left = ArmJoints::extract(&pose, Side::Left).unwrap();
        assert!((left.elbow_angle() - 30.0).abs() < 1e-9);
        assert!(BicepFormEvaluator::default().check(&left).is_good());

        let torso = situp_frame(40.0).pose.unwrap();
        let angle = angle_at_vertex(
            torso.point(JointName::LeftShoulder).unwrap(),
            torso.point(JointName::LeftHip).unwrap(),
            torso.point(JointName::LeftKnee).unwrap(),
        );
        assert!((angle - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_clean_curl_clip() {
        let mut session = curl_session();
        // Left arm: 10 cycles of 5 frames extended, 5 frames flexed. Right arm idle.
        for _ in 0..10 {
            for _ in 0..5 {
                session.process_frame(&curl_frame(160.0, 160.0));
            }
            for _ in 0..5 {
                session.process_frame(&curl_frame(30.0, 160.0));
            }
        }

        let result = session.finalize();
        assert!(result.success);
        assert_eq!(result.frames_processed, 100);
        assert_eq!(result.total_reps(), Some(10));
        assert_eq!(
            result.metrics,
            Some(ExerciseMetrics::BilateralReps {
                total_reps: 10,
                left_reps: 10,
                right_reps: 0
            })
        );
        assert_eq!(result.form_score, Some(100));
        assert_eq!(result.consistency_score, Some(85));
        assert!(!result.cheat_detected);
        assert_eq!(result.form_issues, Some(Vec::new()));
        assert_eq!(result.detection_quality, Some(1.0));
    }

    #[test]
    fn test_mostly_undetected_clip_is_flagged() {
        let mut session = curl_session();
        for i in 0..100 {
            if i % 5 < 3 {
                session.process_frame(&FrameSample::not_detected());
            } else if i % 2 == 0 {
                session.process_frame(&curl_frame(160.0, 160.0));
            } else {
                session.process_frame(&curl_frame(30.0, 30.0));
            }
        }

        let result = session.finalize();
        assert!(result.success);
        assert!(result.cheat_detected);
        assert_eq!(result.form_score, Some(40));
        assert_eq!(result.consistency_score, Some(50));
        assert_eq!(result.low_confidence_frames, 60);
        assert!((result.detection_quality.unwrap() - 0.4).abs() < 1e-12);
        assert!(result
            .form_issues
            .unwrap()
            .contains(&POOR_QUALITY_ISSUE.to_string()));
    }

    #[test]
    fn test_bad_form_deducts_and_blocks_reps() {
        let mut session = curl_session();
        let swung = |angle: f64| {
            let mut pose = curl_frame(angle, 160.0).pose.unwrap();
            pose.insert(JointName::LeftElbow, Landmark::new(0.65, 0.3, 0.9));
            FrameSample::detected(pose)
        };
        for _ in 0..3 {
            session.process_frame(&swung(175.0));
            session.process_frame(&swung(10.0));
        }

        let result = session.finalize();
        assert_eq!(result.total_reps(), Some(0));
        assert_eq!(
            result.form_issues,
            Some(vec!["Don't swing elbow forward".to_string()])
        );
        assert_eq!(result.form_score, Some(90));
    }

    #[test]
    fn test_situp_session() {
        let mut session = ExerciseSession::new(
            ExerciseType::Situps,
            AnalysisMode::File,
            &AnalysisConfig::default(),
            None,
        );
        for angle in [120.0, 120.0, 40.0, 120.0, 30.0, 115.0] {
            session.process_frame(&situp_frame(angle));
        }

        let result = session.finalize();
        assert_eq!(result.metrics, Some(ExerciseMetrics::Reps { total_reps: 2 }));
        assert_eq!(result.form_score, Some(90));
        assert_eq!(result.form_issues, Some(Vec::new()));
    }

    #[test]
    fn test_missing_landmark_skips_frame() {
        let mut session = curl_session();
        session.process_frame(&curl_frame(160.0, 160.0));

        let full = curl_frame(30.0, 30.0).pose.unwrap();
        let broken = PoseLandmarks::from_map(
            full.iter()
                .filter(|(name, _)| *name != "right_wrist")
                .map(|(name, lm)| (name.to_string(), *lm))
                .collect(),
        );
        let report = session.process_frame(&FrameSample::detected(broken));
        assert!(report.fault.is_some());
        assert!(!report.rep_counted);

        // Neither arm moved on the faulty frame
        assert_eq!(report.limbs[0].stage, Stage::Down);
        assert_eq!(report.limbs[0].reps, 0);

        let report = session.process_frame(&curl_frame(30.0, 30.0));
        assert!(report.rep_counted);

        let result = session.finalize();
        assert_eq!(result.extraction_faults, 1);
        assert_eq!(result.frames_processed, 3);
        assert_eq!(result.total_reps(), Some(2));
    }

    #[test]
    fn test_live_mode_warmup_blocks_reps() {
        let mut session = ExerciseSession::new(
            ExerciseType::BicepCurls,
            AnalysisMode::Live,
            &AnalysisConfig::default(),
            Some(30.0),
        );
        // Inside the first two seconds every frame is untrusted
        let report = session.process_frame(&curl_frame(160.0, 160.0).with_timestamp_ms(0.0));
        assert!(report.cheating);
        let report = session.process_frame(&curl_frame(30.0, 30.0).with_timestamp_ms(500.0));
        assert!(report.cheating);
        assert!(!report.rep_counted);
        assert_eq!(report.limbs[0].stage, Stage::Down);

        session.process_frame(&curl_frame(160.0, 160.0).with_timestamp_ms(2500.0));
        let report = session.process_frame(&curl_frame(30.0, 30.0).with_timestamp_ms(3000.0));
        assert!(!report.cheating);
        assert!(report.rep_counted);
        assert_eq!(session.finalize().total_reps(), Some(2));
    }

    #[test]
    fn test_live_skip_frame_follows_timestamps() {
        let mut session = ExerciseSession::new(
            ExerciseType::BicepCurls,
            AnalysisMode::Live,
            &AnalysisConfig::default(),
            Some(30.0),
        );
        let report = session.process_frame(&curl_frame(160.0, 160.0).with_timestamp_ms(2500.0));
        assert!(!report.cheating);

        // Past the minimum duration on the stream clock, not at frame 2 / 30 fps
        let report = session.skip_frame(&AnalysisError::FrameDecode {
            line: 2,
            message: "bad json".to_string(),
        });
        assert!(!report.cheating);

        let report = session.process_frame(&curl_frame(30.0, 30.0).with_timestamp_ms(2566.0));
        assert!(!report.cheating);
        assert!(report.rep_counted);
        assert_eq!(session.finalize().total_reps(), Some(2));
    }

    #[test]
    fn test_live_skip_frame_without_timestamps_uses_frame_rate() {
        let mut session = ExerciseSession::new(
            ExerciseType::Situps,
            AnalysisMode::Live,
            &AnalysisConfig::default(),
            Some(30.0),
        );
        session.process_frame(&situp_frame(40.0));
        let report = session.skip_frame(&AnalysisError::FrameDecode {
            line: 2,
            message: "bad json".to_string(),
        });
        assert!(report.cheating);
    }

    #[test]
    fn test_live_cheat_flag_blocks_situp_rep() {
        let mut session = ExerciseSession::new(
            ExerciseType::Situps,
            AnalysisMode::Live,
            &AnalysisConfig {
                min_live_duration_sec: 0.0,
                ..Default::default()
            },
            Some(30.0),
        );
        let report = session.process_frame(&situp_frame(40.0));
        assert!(!report.cheating);
        assert_eq!(report.limbs[0].stage, Stage::Up);

        for _ in 0..11 {
            session.process_frame(&FrameSample::not_detected());
        }
        let report = session.process_frame(&situp_frame(120.0));
        assert!(report.cheating);
        assert!(!report.rep_counted);
        assert_eq!(report.limbs[0].reps, 0);
        assert_eq!(report.limbs[0].stage, Stage::Up);

        let result = session.finalize();
        assert_eq!(result.total_reps(), Some(0));
        assert!(result.cheat_detected);
    }

    #[test]
    fn test_file_jump_with_poor_detection_is_flagged() {
        let mut session = ExerciseSession::new(
            ExerciseType::VerticalJump,
            AnalysisMode::File,
            &AnalysisConfig::default(),
            Some(30.0),
        );
        let ankles = |y: f64| {
            FrameSample::detected(
                PoseLandmarks::new()
                    .with(JointName::LeftAnkle, Landmark::new(0.45, y, 0.9))
                    .with(JointName::RightAnkle, Landmark::new(0.55, y, 0.9)),
            )
        };
        for y in [0.9, 0.78, 0.9] {
            session.process_frame(&ankles(y));
        }
        for _ in 0..4 {
            session.process_frame(&FrameSample::not_detected());
        }

        let result = session.finalize();
        assert!(result.success);
        assert!(result.cheat_detected);
        assert_eq!(
            result.metrics,
            Some(ExerciseMetrics::Jump {
                max_height_cm: 24.0,
                jump_count: 1
            })
        );
        assert_eq!(result.form_score, Some(40));
        assert_eq!(result.consistency_score, Some(50));
        assert_eq!(result.form_issues, None);
    }

    #[test]
    fn test_live_jump_uses_flight_time() {
        let mut session = ExerciseSession::new(
            ExerciseType::VerticalJump,
            AnalysisMode::Live,
            &AnalysisConfig {
                min_live_duration_sec: 0.0,
                ..Default::default()
            },
            Some(30.0),
        );
        let hip = |y: f64| {
            FrameSample::detected(
                PoseLandmarks::new().with(JointName::LeftHip, Landmark::new(0.5, y, 0.9)),
            )
        };
        for _ in 0..5 {
            session.process_frame(&hip(0.6));
        }
        let report = session.process_frame(&hip(0.5));
        assert!(report.airborne);
        for _ in 0..11 {
            session.process_frame(&hip(0.45));
        }
        let report = session.process_frame(&hip(0.6));
        assert!(report.rep_counted);

        let result = session.finalize();
        assert_eq!(
            result.metrics,
            Some(ExerciseMetrics::Jump {
                max_height_cm: 19.62,
                jump_count: 1
            })
        );
        assert_eq!(result.form_score, Some(90));
        assert_eq!(result.form_issues, None);
    }

    #[test]
    fn test_no_frames_is_not_success() {
        let session = curl_session();
        let result = session.finalize();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("No frames processed"));
        assert_eq!(result.detection_quality, None);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut session = curl_session();
        for angle in [160.0, 30.0, 160.0] {
            session.process_frame(&curl_frame(angle, angle));
        }
        session.process_frame(&FrameSample::not_detected());
        assert_eq!(session.finalize(), session.finalize());
    }

    #[test]
    fn test_skip_frame_counts_as_low_confidence() {
        let mut session = curl_session();
        session.process_frame(&curl_frame(160.0, 160.0));
        let report = session.skip_frame(&AnalysisError::FrameDecode {
            line: 2,
            message: "bad json".to_string(),
        });
        assert!(report.low_confidence);

        let result = session.finalize();
        assert_eq!(result.frames_processed, 2);
        assert_eq!(result.low_confidence_frames, 1);
        assert_eq!(result.extraction_faults, 1);
    }
}
