// src/config.rs - Tunable calibration parameters for all calculators
use serde::{Deserialize, Serialize};

/// Calibration parameters exposed for clinical recalibration.
///
/// The defaults reproduce the empirically tuned values of the reference
/// deployment; none of them are fixed physics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RomConfig {
    /// Thumb-tip distance below which a Kapandji target counts as reached
    /// (normalized units).
    pub kapandji_distance_threshold: f64,
    /// Per-finger tracking confidence below which finger angles are not
    /// trusted and report as zero.
    pub finger_confidence_threshold: f64,
    /// Maximum accepted frame-to-frame change for any finger angle (degrees).
    pub max_angle_change_per_frame: f64,
    /// Number of top accepted values averaged in the smoothed aggregate.
    pub consistency_frame_count: usize,
    /// Moving-average window applied to accepted angle series before the
    /// top-value pick.
    pub smoothing_window: usize,
    /// Minimum accepted frames required for the smoothed aggregate; fewer
    /// falls back to the raw maximum with a low quality flag.
    pub min_valid_frames: usize,
    /// Per-landmark visibility threshold for the clearly-visible check.
    pub landmark_visibility_threshold: f64,
    /// Finger-average visibility threshold for the clearly-visible check.
    pub finger_visibility_average: f64,
    /// Fraction of landmarks/frames that must pass for a finger to count
    /// as clearly visible.
    pub clearly_visible_fraction: f64,
    /// Half-width of the wrist neutral band around 0° signed angle.
    pub wrist_neutral_zone: f64,
    /// Gain applied to the signed wrist angle outside the neutral band.
    pub wrist_sensitivity_gain: f64,
    /// Physiological clamp for the scaled wrist flexion/extension angle.
    pub wrist_angle_clamp: f64,
    /// Minimum elbow/wrist/shoulder visibility for a wrist result to be
    /// produced at all.
    pub min_wrist_confidence: f64,
    /// Band around the body centerline inside which laterality is
    /// ambiguous and the shoulder-visibility tiebreak applies.
    pub centerline_ambiguity_band: f64,
    /// Mean index/pinky visibility required to accept a deviation frame.
    pub deviation_visibility_threshold: f64,
    /// Maximum spread from the per-direction mean for the AMA-style
    /// reproducibility check (degrees).
    pub deviation_reproducibility_tolerance: f64,
    /// Physiological clamp for the signed deviation angle: negative is
    /// ulnar, positive is radial.
    pub deviation_min: f64,
    pub deviation_max: f64,
}

impl Default for RomConfig {
    fn default() -> Self {
        Self {
            kapandji_distance_threshold: 0.055,
            finger_confidence_threshold: 0.70,
            max_angle_change_per_frame: 30.0,
            consistency_frame_count: 3,
            smoothing_window: 5,
            min_valid_frames: 10,
            landmark_visibility_threshold: 0.70,
            finger_visibility_average: 0.80,
            clearly_visible_fraction: 0.80,
            wrist_neutral_zone: 3.0,
            wrist_sensitivity_gain: 1.5,
            wrist_angle_clamp: 90.0,
            min_wrist_confidence: 0.30,
            centerline_ambiguity_band: 0.05,
            deviation_visibility_threshold: 0.70,
            deviation_reproducibility_tolerance: 5.0,
            deviation_min: -35.0,
            deviation_max: 25.0,
        }
    }
}
