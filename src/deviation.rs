// src/deviation.rs - Signed radial/ulnar wrist deviation with reproducibility check
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::RomConfig;
use crate::geometry;
use crate::landmarks::{hand, pose, HandType, Landmark, MotionFrame};

/// One frame's deviation reading. Radial and ulnar are non-negative
/// magnitudes split from a single signed angle; at most one is non-zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviationFrame {
    /// Clamped signed angle: positive radial, negative ulnar, degrees.
    pub signed_angle: f64,
    pub radial_deviation: f64,
    pub ulnar_deviation: f64,
    pub confidence: f64,
    pub detected: bool,
}

/// Aggregate deviation over a motion sequence of repetitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviationResult {
    /// Deviation split of the frame with the largest magnitude.
    pub radial_deviation: f64,
    pub ulnar_deviation: f64,
    pub max_radial_deviation: f64,
    pub max_ulnar_deviation: f64,
    /// AMA-style check: each direction's readings stay within tolerance of
    /// their own mean across repetitions.
    pub reproducibility_valid: bool,
    /// Mean confidence over accepted frames.
    pub confidence: f64,
    pub frames_accepted: usize,
}

fn side_indices(hand_type: HandType) -> (usize, usize, usize, usize) {
    match hand_type {
        HandType::Left => (pose::LEFT_ELBOW, pose::LEFT_WRIST, pose::LEFT_INDEX, pose::LEFT_PINKY),
        HandType::Right => {
            (pose::RIGHT_ELBOW, pose::RIGHT_WRIST, pose::RIGHT_INDEX, pose::RIGHT_PINKY)
        }
    }
}

/// Compute signed radial/ulnar deviation for one frame.
///
/// The forearm axis runs elbow→wrist from the pose; the hand axis runs
/// wrist→midpoint of the index/pinky MCPs. When hand-landmark visibility is
/// insufficient (or the hand is absent) the pose fingertip landmarks stand
/// in for the MCP midpoint. Missing pose data degrades to an undetected
/// zero result.
pub fn calculate_wrist_deviation(
    frame: &MotionFrame,
    hand_type: HandType,
    config: &RomConfig,
) -> DeviationFrame {
    let (elbow_idx, wrist_idx, index_idx, pinky_idx) = side_indices(hand_type);
    if frame.pose_landmarks.len() <= pinky_idx.max(index_idx) {
        return DeviationFrame::default();
    }

    let elbow = frame.pose_landmarks[elbow_idx].position();
    let wrist = frame.pose_landmarks[wrist_idx].position();

    // Prefer the hand-landmark MCP midpoint; fall back to pose fingertips.
    let (hand_target, confidence) = if frame.has_full_hand() {
        let index_mcp = &frame.hand_landmarks[hand::INDEX_MCP];
        let pinky_mcp = &frame.hand_landmarks[hand::PINKY_MCP];
        let visibility = (index_mcp.confidence() + pinky_mcp.confidence()) / 2.0;
        if visibility >= config.deviation_visibility_threshold {
            (geometry::midpoint(&index_mcp.position(), &pinky_mcp.position()), visibility)
        } else {
            trace!(visibility, "hand MCP visibility insufficient, using pose fingertips");
            pose_fallback(frame, index_idx, pinky_idx)
        }
    } else {
        pose_fallback(frame, index_idx, pinky_idx)
    };

    let forearm_axis = geometry::normalize(&(wrist - elbow));
    let hand_axis = geometry::normalize(&(hand_target - wrist));
    if forearm_axis.norm() == 0.0 || hand_axis.norm() == 0.0 {
        return DeviationFrame { detected: true, confidence, ..Default::default() };
    }

    let unsigned = geometry::angle_between_vectors(&forearm_axis, &hand_axis);
    let cross = geometry::cross(&forearm_axis, &hand_axis);
    let mut signed = if cross.z >= 0.0 { unsigned } else { -unsigned };
    if hand_type == HandType::Right {
        signed = -signed;
    }
    let signed = signed.clamp(config.deviation_min, config.deviation_max);

    DeviationFrame {
        signed_angle: signed,
        radial_deviation: signed.max(0.0),
        ulnar_deviation: (-signed).max(0.0),
        confidence,
        detected: true,
    }
}

fn pose_fallback(
    frame: &MotionFrame,
    index_idx: usize,
    pinky_idx: usize,
) -> (nalgebra::Vector3<f64>, f64) {
    let index_tip = &frame.pose_landmarks[index_idx];
    let pinky_tip = &frame.pose_landmarks[pinky_idx];
    (
        geometry::midpoint(&index_tip.position(), &pinky_tip.position()),
        (index_tip.confidence() + pinky_tip.confidence()) / 2.0,
    )
}

/// Aggregate deviation across repetitions: running maxima per direction and
/// an AMA-style reproducibility check over the accepted readings.
pub fn max_wrist_deviation(
    frames: &[MotionFrame],
    hand_type: HandType,
    config: &RomConfig,
) -> DeviationResult {
    let mut result = DeviationResult::default();
    let mut radial_values: Vec<f64> = Vec::new();
    let mut ulnar_values: Vec<f64> = Vec::new();
    let mut confidence_sum = 0.0;
    let mut best_magnitude = -1.0f64;

    for frame in frames {
        let reading = calculate_wrist_deviation(frame, hand_type, config);
        if !reading.detected || reading.confidence < config.deviation_visibility_threshold {
            continue;
        }
        result.frames_accepted += 1;
        confidence_sum += reading.confidence;

        if reading.radial_deviation > 0.0 {
            radial_values.push(reading.radial_deviation);
        }
        if reading.ulnar_deviation > 0.0 {
            ulnar_values.push(reading.ulnar_deviation);
        }
        result.max_radial_deviation = result.max_radial_deviation.max(reading.radial_deviation);
        result.max_ulnar_deviation = result.max_ulnar_deviation.max(reading.ulnar_deviation);

        let magnitude = reading.signed_angle.abs();
        if magnitude > best_magnitude {
            best_magnitude = magnitude;
            result.radial_deviation = reading.radial_deviation;
            result.ulnar_deviation = reading.ulnar_deviation;
        }
    }

    result.reproducibility_valid = within_tolerance_of_mean(
        &radial_values,
        config.deviation_reproducibility_tolerance,
    ) && within_tolerance_of_mean(&ulnar_values, config.deviation_reproducibility_tolerance);
    if result.frames_accepted > 0 {
        result.confidence = confidence_sum / result.frames_accepted as f64;
    }

    debug!(
        max_radial = result.max_radial_deviation,
        max_ulnar = result.max_ulnar_deviation,
        reproducible = result.reproducibility_valid,
        accepted = result.frames_accepted,
        "wrist deviation aggregated"
    );
    result
}

fn within_tolerance_of_mean(values: &[f64], tolerance: f64) -> bool {
    if values.is_empty() {
        return true;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().all(|v| (v - mean).abs() <= tolerance)
}
