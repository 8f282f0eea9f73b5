// src/finger.rs - Per-finger MCP/PIP/DIP flexion angles and total active motion
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::RomConfig;
use crate::geometry;
use crate::landmarks::{hand, Landmark, MotionFrame};

/// Anatomical flexion limits per joint, degrees.
pub const MCP_MAX: f64 = 95.0;
pub const PIP_MAX: f64 = 115.0;
pub const DIP_MAX: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Finger {
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 4] = [Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky];

    pub fn name(&self) -> &'static str {
        match self {
            Finger::Index => "index",
            Finger::Middle => "middle",
            Finger::Ring => "ring",
            Finger::Pinky => "pinky",
        }
    }

    /// Landmark indices [MCP, PIP, DIP, TIP] for this finger.
    pub fn landmark_indices(&self) -> [usize; 4] {
        match self {
            Finger::Index => [hand::INDEX_MCP, hand::INDEX_PIP, hand::INDEX_DIP, hand::INDEX_TIP],
            Finger::Middle => {
                [hand::MIDDLE_MCP, hand::MIDDLE_PIP, hand::MIDDLE_DIP, hand::MIDDLE_TIP]
            }
            Finger::Ring => [hand::RING_MCP, hand::RING_PIP, hand::RING_DIP, hand::RING_TIP],
            Finger::Pinky => [hand::PINKY_MCP, hand::PINKY_PIP, hand::PINKY_DIP, hand::PINKY_TIP],
        }
    }
}

/// Flexion angles for one finger, degrees. A fully straight joint scores 0;
/// increasing flexion increases the score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JointAngles {
    pub mcp_angle: f64,
    pub pip_angle: f64,
    pub dip_angle: f64,
    pub total_active_rom: f64,
}

impl JointAngles {
    fn from_components(mcp: f64, pip: f64, dip: f64) -> Self {
        Self {
            mcp_angle: mcp,
            pip_angle: pip,
            dip_angle: dip,
            total_active_rom: mcp + pip + dip,
        }
    }
}

/// Diagnostic report of which joints exceeded their physiological range
/// before clamping. The clamped value is returned either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitReport {
    pub mcp_out_of_range: bool,
    pub pip_out_of_range: bool,
    pub dip_out_of_range: bool,
}

impl LimitReport {
    pub fn any(&self) -> bool {
        self.mcp_out_of_range || self.pip_out_of_range || self.dip_out_of_range
    }
}

/// Whether sequence aggregation smooths peaks or reports them raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Smoothing {
    Enabled,
    Disabled,
}

/// Aggregate ROM for one finger over a motion sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerRomResult {
    pub finger: Finger,
    pub max_angles: JointAngles,
    /// Temporal consistency score in [0, 1].
    pub temporal_quality: f64,
    /// True when visibility was good enough to bypass temporal filtering.
    pub clearly_visible: bool,
    /// Frames surviving the temporal-consistency filter.
    pub valid_frames: usize,
}

/// Clamp each joint to its physiological range and recompute the total
/// from the clamped values.
pub fn validate_anatomical_limits(angles: &JointAngles) -> (JointAngles, LimitReport) {
    let report = LimitReport {
        mcp_out_of_range: angles.mcp_angle > MCP_MAX,
        pip_out_of_range: angles.pip_angle > PIP_MAX,
        dip_out_of_range: angles.dip_angle > DIP_MAX,
    };
    let clamped = JointAngles::from_components(
        angles.mcp_angle.clamp(0.0, MCP_MAX),
        angles.pip_angle.clamp(0.0, PIP_MAX),
        angles.dip_angle.clamp(0.0, DIP_MAX),
    );
    (clamped, report)
}

/// Compute MCP/PIP/DIP flexion for one finger from a single frame's 21
/// hand landmarks.
///
/// An optional caller-supplied tracking confidence below the configured
/// threshold short-circuits to all-zero angles. Short landmark arrays and
/// degenerate geometry also degrade to zeros.
pub fn calculate_finger_joint_angles(
    hand_landmarks: &[Landmark],
    finger: Finger,
    finger_confidence: Option<f64>,
    config: &RomConfig,
) -> JointAngles {
    if hand_landmarks.len() < hand::LANDMARK_COUNT {
        return JointAngles::default();
    }

    if let Some(confidence) = finger_confidence {
        if confidence < config.finger_confidence_threshold {
            trace!(
                finger = finger.name(),
                confidence,
                "finger tracking confidence below threshold, reporting zero ROM"
            );
            return JointAngles::default();
        }
    }

    let [mcp, pip, dip, tip] = finger.landmark_indices();
    let wrist = hand_landmarks[hand::WRIST].position();
    let mcp_p = hand_landmarks[mcp].position();
    let pip_p = hand_landmarks[pip].position();
    let dip_p = hand_landmarks[dip].position();
    let tip_p = hand_landmarks[tip].position();

    // Flexion is the deviation from a straight joint: 180° minus the
    // three-point angle, floored at zero.
    let mcp_angle = flexion(&wrist, &mcp_p, &pip_p);
    let pip_angle = flexion(&mcp_p, &pip_p, &dip_p);
    let dip_angle = flexion(&pip_p, &dip_p, &tip_p);

    let raw = JointAngles::from_components(mcp_angle, pip_angle, dip_angle);
    let (clamped, report) = validate_anatomical_limits(&raw);
    if report.any() {
        debug!(
            finger = finger.name(),
            mcp = raw.mcp_angle,
            pip = raw.pip_angle,
            dip = raw.dip_angle,
            "joint angle outside physiological range, clamped"
        );
    }
    clamped
}

fn flexion(a: &nalgebra::Vector3<f64>, b: &nalgebra::Vector3<f64>, c: &nalgebra::Vector3<f64>) -> f64 {
    // A degenerate triplet yields a 0° three-point angle; report it as
    // zero flexion rather than the 180° a straight subtraction would give.
    if (a - b).norm() < 1e-10 || (c - b).norm() < 1e-10 {
        return 0.0;
    }
    (180.0 - geometry::angle_between(a, b, c)).max(0.0)
}

/// Per-frame flexion for all four fingers at once, for whole-hand display.
pub fn calculate_hand_joint_angles(
    hand_landmarks: &[Landmark],
    config: &RomConfig,
) -> Vec<(Finger, JointAngles)> {
    Finger::ALL
        .iter()
        .map(|&finger| {
            (finger, calculate_finger_joint_angles(hand_landmarks, finger, None, config))
        })
        .collect()
}

/// Maximum ROM for all four fingers over a full motion sequence.
pub fn calculate_all_fingers_max_rom(
    frames: &[MotionFrame],
    smoothing: Smoothing,
    config: &RomConfig,
) -> Vec<FingerRomResult> {
    Finger::ALL
        .iter()
        .map(|&finger| calculate_finger_max_rom(frames, finger, smoothing, config))
        .collect()
}

/// Maximum ROM for one finger over a full motion sequence.
pub fn calculate_finger_max_rom(
    frames: &[MotionFrame],
    finger: Finger,
    smoothing: Smoothing,
    config: &RomConfig,
) -> FingerRomResult {
    let per_frame: Vec<JointAngles> = frames
        .iter()
        .map(|frame| calculate_finger_joint_angles(&frame.hand_landmarks, finger, None, config))
        .collect();

    let temporal_quality = temporal_quality(&per_frame, config);
    let clearly_visible = finger_clearly_visible(frames, finger, config);

    if clearly_visible {
        // Tracking is trustworthy across the sequence: report the true
        // per-frame maximum without temporal filtering.
        let best = per_frame
            .iter()
            .copied()
            .max_by(|a, b| a.total_active_rom.total_cmp(&b.total_active_rom))
            .unwrap_or_default();
        return FingerRomResult {
            finger,
            max_angles: best,
            temporal_quality,
            clearly_visible: true,
            valid_frames: per_frame.len(),
        };
    }

    let accepted = temporal_filter(&per_frame, config);
    debug!(
        finger = finger.name(),
        total = per_frame.len(),
        accepted = accepted.len(),
        "temporal-consistency filter applied"
    );

    if accepted.len() >= config.min_valid_frames {
        let max_angles = match smoothing {
            Smoothing::Enabled => smoothed_peak(&accepted, config),
            Smoothing::Disabled => accepted
                .iter()
                .copied()
                .max_by(|a, b| a.total_active_rom.total_cmp(&b.total_active_rom))
                .unwrap_or_default(),
        };
        FingerRomResult {
            finger,
            max_angles,
            temporal_quality,
            clearly_visible: false,
            valid_frames: accepted.len(),
        }
    } else {
        // Too few consistent frames to smooth; report the raw maximum and
        // flag the low quality.
        let best = per_frame
            .iter()
            .copied()
            .max_by(|a, b| a.total_active_rom.total_cmp(&b.total_active_rom))
            .unwrap_or_default();
        FingerRomResult {
            finger,
            max_angles: best,
            temporal_quality: 0.3,
            clearly_visible: false,
            valid_frames: accepted.len(),
        }
    }
}

/// A finger is clearly visible when, in at least the configured fraction of
/// frames, at least that fraction of its landmarks meet the per-landmark
/// visibility threshold and the finger-average visibility meets its own
/// threshold. Landmarks without an explicit visibility score never count.
fn finger_clearly_visible(frames: &[MotionFrame], finger: Finger, config: &RomConfig) -> bool {
    if frames.is_empty() {
        return false;
    }
    let indices = finger.landmark_indices();

    let visible_frames = frames
        .iter()
        .filter(|frame| {
            if frame.hand_landmarks.len() < hand::LANDMARK_COUNT {
                return false;
            }
            let vis: Vec<f64> = indices
                .iter()
                .map(|&i| frame.hand_landmarks[i].explicit_visibility())
                .collect();
            let passing = vis
                .iter()
                .filter(|&&v| v >= config.landmark_visibility_threshold)
                .count();
            let average = vis.iter().sum::<f64>() / vis.len() as f64;
            passing as f64 / vis.len() as f64 >= config.clearly_visible_fraction
                && average >= config.finger_visibility_average
        })
        .count();

    visible_frames as f64 / frames.len() as f64 >= config.clearly_visible_fraction
}

/// Accept a frame only when its total ROM and each joint component move no
/// more than the configured tolerance from the previous accepted frame.
/// Rejected frames are dropped from the running history.
fn temporal_filter(per_frame: &[JointAngles], config: &RomConfig) -> Vec<JointAngles> {
    let tolerance = config.max_angle_change_per_frame;
    let mut accepted: Vec<JointAngles> = Vec::with_capacity(per_frame.len());

    for angles in per_frame {
        match accepted.last() {
            None => accepted.push(*angles),
            Some(prev) => {
                let consistent = (angles.total_active_rom - prev.total_active_rom).abs()
                    <= tolerance
                    && (angles.mcp_angle - prev.mcp_angle).abs() <= tolerance
                    && (angles.pip_angle - prev.pip_angle).abs() <= tolerance
                    && (angles.dip_angle - prev.dip_angle).abs() <= tolerance;
                if consistent {
                    accepted.push(*angles);
                } else {
                    trace!(
                        tam = angles.total_active_rom,
                        prev_tam = prev.total_active_rom,
                        "frame rejected by temporal-consistency filter"
                    );
                }
            }
        }
    }
    accepted
}

/// Smooth the peak estimate: moving-average each angle series, then average
/// the largest values rather than taking a single maximum, to reduce
/// single-frame spikes.
fn smoothed_peak(accepted: &[JointAngles], config: &RomConfig) -> JointAngles {
    let mcp: Vec<f64> = accepted.iter().map(|a| a.mcp_angle).collect();
    let pip: Vec<f64> = accepted.iter().map(|a| a.pip_angle).collect();
    let dip: Vec<f64> = accepted.iter().map(|a| a.dip_angle).collect();

    let window = config.smoothing_window.max(1);
    let n = config.consistency_frame_count.max(1);

    JointAngles::from_components(
        top_n_mean(&moving_average(&mcp, window), n),
        top_n_mean(&moving_average(&pip, window), n),
        top_n_mean(&moving_average(&dip, window), n),
    )
}

fn moving_average(series: &[f64], window: usize) -> Vec<f64> {
    series
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let start = i.saturating_sub(window - 1);
            let slice = &series[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

fn top_n_mean(values: &[f64], n: usize) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let take = n.min(sorted.len());
    sorted[..take].iter().sum::<f64>() / take as f64
}

/// Average of the in-tolerance transition fraction and a smoothness term
/// derived from the mean frame-to-frame change.
fn temporal_quality(per_frame: &[JointAngles], config: &RomConfig) -> f64 {
    if per_frame.len() < 2 {
        return 1.0;
    }
    let tolerance = config.max_angle_change_per_frame;
    let changes: Vec<f64> = per_frame
        .windows(2)
        .map(|w| (w[1].total_active_rom - w[0].total_active_rom).abs())
        .collect();

    let in_tolerance =
        changes.iter().filter(|&&c| c <= tolerance).count() as f64 / changes.len() as f64;
    let avg_change = changes.iter().sum::<f64>() / changes.len() as f64;
    let smoothness = (1.0 - avg_change / tolerance).clamp(0.0, 1.0);

    ((in_tolerance + smoothness) / 2.0).clamp(0.0, 1.0)
}
