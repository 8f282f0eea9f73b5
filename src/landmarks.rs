// src/landmarks.rs - Input data model: landmarks, frames, and anatomical indices
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// MediaPipe hand landmark indices (21 per hand).
pub mod hand {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_DIP: usize = 7;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_DIP: usize = 11;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP: usize = 13;
    pub const RING_PIP: usize = 14;
    pub const RING_DIP: usize = 15;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;

    pub const LANDMARK_COUNT: usize = 21;
}

/// MediaPipe pose landmark indices (up to 33); only the upper-limb subset
/// is consumed by the engine.
pub mod pose {
    pub const LEFT_SHOULDER: usize = 11;
    pub const RIGHT_SHOULDER: usize = 12;
    pub const LEFT_ELBOW: usize = 13;
    pub const RIGHT_ELBOW: usize = 14;
    pub const LEFT_WRIST: usize = 15;
    pub const RIGHT_WRIST: usize = 16;
    pub const LEFT_PINKY: usize = 17;
    pub const RIGHT_PINKY: usize = 18;
    pub const LEFT_INDEX: usize = 19;
    pub const RIGHT_INDEX: usize = 20;

    /// Minimum pose landmark count for elbow-referenced calculations.
    pub const MIN_UPPER_BODY: usize = 17;
}

/// A single tracked 3D point in normalized, camera-relative coordinates,
/// optionally carrying a visibility/confidence score in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z, visibility: None }
    }

    pub fn with_visibility(x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self { x, y, z, visibility: Some(visibility) }
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Visibility for confidence gating. A landmark that is present but
    /// carries no score is treated as fully tracked.
    pub fn confidence(&self) -> f64 {
        self.visibility.unwrap_or(1.0)
    }

    /// Visibility for the clearly-visible bypass in finger aggregation:
    /// bypassing the temporal filter requires positive evidence, so a
    /// missing score counts as not visible.
    pub fn explicit_visibility(&self) -> f64 {
        self.visibility.unwrap_or(0.0)
    }
}

/// One sample in time. Absent or short landmark arrays are valid input and
/// degrade to zeroed results downstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MotionFrame {
    pub hand_landmarks: Vec<Landmark>,
    #[serde(default)]
    pub pose_landmarks: Vec<Landmark>,
    pub timestamp: f64,
}

impl MotionFrame {
    pub fn new(hand_landmarks: Vec<Landmark>, pose_landmarks: Vec<Landmark>, timestamp: f64) -> Self {
        Self { hand_landmarks, pose_landmarks, timestamp }
    }

    pub fn has_full_hand(&self) -> bool {
        self.hand_landmarks.len() >= hand::LANDMARK_COUNT
    }

    pub fn has_upper_body_pose(&self) -> bool {
        self.pose_landmarks.len() >= pose::MIN_UPPER_BODY
    }
}

/// Which hand is being tracked, as seen by a front-facing mirrored camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandType {
    Left,
    Right,
}

impl HandType {
    pub fn name(&self) -> &'static str {
        match self {
            HandType::Left => "left",
            HandType::Right => "right",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_position() {
        let lm = Landmark::new(0.1, 0.2, 0.3);
        let p = lm.position();
        assert!((p.x - 0.1).abs() < 1e-12);
        assert!((p.y - 0.2).abs() < 1e-12);
        assert!((p.z - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_defaults() {
        let lm = Landmark::new(0.0, 0.0, 0.0);
        assert_eq!(lm.confidence(), 1.0);
        assert_eq!(lm.explicit_visibility(), 0.0);

        let lm = Landmark::with_visibility(0.0, 0.0, 0.0, 0.9);
        assert_eq!(lm.confidence(), 0.9);
        assert_eq!(lm.explicit_visibility(), 0.9);
    }

    #[test]
    fn test_frame_completeness_checks() {
        let frame = MotionFrame::default();
        assert!(!frame.has_full_hand());
        assert!(!frame.has_upper_body_pose());

        let frame = MotionFrame::new(
            vec![Landmark::new(0.0, 0.0, 0.0); 21],
            vec![Landmark::new(0.0, 0.0, 0.0); 33],
            0.0,
        );
        assert!(frame.has_full_hand());
        assert!(frame.has_upper_body_pose());
    }

    #[test]
    fn test_landmark_serde_round_trip() {
        let lm = Landmark::with_visibility(0.25, 0.5, -0.1, 0.8);
        let json = serde_json::to_string(&lm).unwrap();
        let back: Landmark = serde_json::from_str(&json).unwrap();
        assert_eq!(lm, back);
    }
}
