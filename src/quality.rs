//! Detection quality and cheat gating
//!
//! Tallies low-confidence frames and turns the ratio into two verdicts:
//! - a live flag, checked every frame, that suppresses rep crediting
//! - a batch flag, computed once from final tallies, that penalizes scores
//!
//! The two use different thresholds and need not agree frame by frame.

use crate::config::AnalysisConfig;
use crate::types::PoseLandmarks;

/// Running tally of low-confidence frames
#[derive(Debug, Clone)]
pub struct QualityGate {
    confidence_floor: f64,
    live_ratio: f64,
    batch_ratio: f64,
    warmup_frames: u64,
    /// Minimum elapsed time before any frame is trusted (LIVE mode only)
    min_duration_sec: Option<f64>,
    frames_seen: u64,
    low_confidence_frames: u64,
}

impl QualityGate {
    pub fn new(config: &AnalysisConfig, min_duration_sec: Option<f64>) -> Self {
        Self {
            confidence_floor: config.confidence_floor,
            live_ratio: config.live_cheat_ratio,
            batch_ratio: config.batch_cheat_ratio,
            warmup_frames: config.warmup_frames,
            min_duration_sec,
            frames_seen: 0,
            low_confidence_frames: 0,
        }
    }

    /// Whether a detection is too weak to trust
    pub fn is_low_confidence(&self, pose: Option<&PoseLandmarks>) -> bool {
        match pose.and_then(PoseLandmarks::mean_visibility) {
            Some(mean) => mean < self.confidence_floor,
            None => true,
        }
    }

    /// Count one frame; returns true if it was low confidence
    pub fn observe(&mut self, pose: Option<&PoseLandmarks>) -> bool {
        let low = self.is_low_confidence(pose);
        self.record(low);
        low
    }

    /// Count one frame whose confidence was decided elsewhere
    pub fn record(&mut self, low_confidence: bool) {
        self.frames_seen += 1;
        if low_confidence {
            self.low_confidence_frames += 1;
        }
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn low_confidence_frames(&self) -> u64 {
        self.low_confidence_frames
    }

    fn low_ratio(&self) -> Option<f64> {
        if self.frames_seen == 0 {
            return None;
        }
        Some(self.low_confidence_frames as f64 / self.frames_seen as f64)
    }

    /// Per-frame cheating flag given the time elapsed since the stream began
    pub fn live_flag(&self, elapsed_sec: f64) -> bool {
        if let Some(min) = self.min_duration_sec {
            if elapsed_sec < min {
                return true;
            }
        }

        self.frames_seen > self.warmup_frames
            && self.low_ratio().is_some_and(|ratio| ratio > self.live_ratio)
    }

    /// End-of-stream verdict; no warm-up applies
    pub fn batch_flag(&self) -> bool {
        self.low_ratio().is_some_and(|ratio| ratio > self.batch_ratio)
    }

    /// Fraction of frames with an acceptable detection, None before any frame
    pub fn detection_quality(&self) -> Option<f64> {
        self.low_ratio().map(|ratio| 1.0 - ratio)
    }
}
