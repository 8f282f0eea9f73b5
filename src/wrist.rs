// src/wrist.rs - Elbow-referenced wrist flexion/extension with session locking
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::RomConfig;
use crate::geometry;
use crate::landmarks::{hand, pose, HandType, Landmark, MotionFrame};

/// The pose landmark set pinned for the duration of one recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLock {
    pub elbow_index: usize,
    pub wrist_index: usize,
    pub shoulder_index: usize,
    pub hand_type: HandType,
}

impl SessionLock {
    fn for_hand(hand_type: HandType) -> Self {
        match hand_type {
            HandType::Left => Self {
                elbow_index: pose::LEFT_ELBOW,
                wrist_index: pose::LEFT_WRIST,
                shoulder_index: pose::LEFT_SHOULDER,
                hand_type,
            },
            HandType::Right => Self {
                elbow_index: pose::RIGHT_ELBOW,
                wrist_index: pose::RIGHT_WRIST,
                shoulder_index: pose::RIGHT_SHOULDER,
                hand_type,
            },
        }
    }
}

/// Caller-owned session state for one recording.
///
/// Created lazily on the first successful hand-type determination, read on
/// every subsequent frame of the same recording, and reset explicitly when
/// a new recording starts. A mid-recording hand-type contradiction
/// invalidates and re-establishes the lock. Concurrent assessments must
/// each own their own instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WristSession {
    lock: Option<SessionLock>,
}

impl WristSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> Option<&SessionLock> {
        self.lock.as_ref()
    }

    /// Begin a new recording: discard the pinned landmark set.
    pub fn reset(&mut self) {
        if self.lock.is_some() {
            debug!("wrist session lock reset for new recording");
        }
        self.lock = None;
    }

    fn ensure(&mut self, hand_type: HandType) -> SessionLock {
        match self.lock {
            Some(lock) if lock.hand_type == hand_type => lock,
            Some(lock) => {
                debug!(
                    previous = lock.hand_type.name(),
                    detected = hand_type.name(),
                    "hand type changed mid-recording, re-establishing session lock"
                );
                let new_lock = SessionLock::for_hand(hand_type);
                self.lock = Some(new_lock);
                new_lock
            }
            None => {
                let new_lock = SessionLock::for_hand(hand_type);
                debug!(hand_type = hand_type.name(), "wrist session lock established");
                self.lock = Some(new_lock);
                new_lock
            }
        }
    }
}

/// Per-frame elbow-referenced wrist angle. Flexion and extension are
/// mutually exclusive: exactly one is non-zero when motion is present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ElbowWristAngles {
    /// Signed forearm-to-hand angle before sensitivity scaling, degrees.
    pub forearm_to_hand_angle: f64,
    pub wrist_flexion_angle: f64,
    pub wrist_extension_angle: f64,
    pub elbow_detected: bool,
    pub hand_type: Option<HandType>,
    pub confidence: f64,
}

/// Aggregate wrist flexion/extension over a motion sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WristRomResult {
    pub max_flexion: f64,
    pub max_extension: f64,
    /// Largest unscaled forearm-to-hand angle magnitude observed.
    pub max_raw_angle: f64,
    pub hand_type: Option<HandType>,
    /// Confidence of the best frame.
    pub confidence: f64,
    pub frames_detected: usize,
}

/// Classify the tracked hand as left or right from its wrist position
/// relative to the body centerline (mean shoulder x), inverted for the
/// front-facing mirrored camera. Within the ambiguity band the side of the
/// better-seen shoulder wins.
pub fn determine_hand_type(
    hand_wrist: &Landmark,
    pose_landmarks: &[Landmark],
    config: &RomConfig,
) -> Option<HandType> {
    if pose_landmarks.len() <= pose::RIGHT_SHOULDER {
        return None;
    }
    let left_shoulder = &pose_landmarks[pose::LEFT_SHOULDER];
    let right_shoulder = &pose_landmarks[pose::RIGHT_SHOULDER];
    let centerline = (left_shoulder.x + right_shoulder.x) / 2.0;
    let offset = hand_wrist.x - centerline;

    if offset.abs() <= config.centerline_ambiguity_band {
        // Ambiguous: tiebreak on relative shoulder visibility.
        let hand_type = if right_shoulder.confidence() >= left_shoulder.confidence() {
            HandType::Right
        } else {
            HandType::Left
        };
        trace!(offset, hand_type = hand_type.name(), "laterality tiebreak by shoulder visibility");
        Some(hand_type)
    } else if offset < 0.0 {
        // Mirrored camera: a hand left of the centerline is the right hand.
        Some(HandType::Right)
    } else {
        Some(HandType::Left)
    }
}

/// Compute the elbow-referenced wrist flexion/extension angle for one frame.
///
/// Insufficient landmarks or confidence below the configured minimum yield
/// an all-zero undetected result rather than an error.
pub fn calculate_elbow_wrist_angle(
    frame: &MotionFrame,
    session: &mut WristSession,
    config: &RomConfig,
) -> ElbowWristAngles {
    if !frame.has_full_hand() || !frame.has_upper_body_pose() {
        return ElbowWristAngles::default();
    }

    let hand_wrist = &frame.hand_landmarks[hand::WRIST];
    let detected = determine_hand_type(hand_wrist, &frame.pose_landmarks, config)
        .or_else(|| session.lock().map(|lock| lock.hand_type));
    let hand_type = match detected {
        Some(hand_type) => hand_type,
        None => return ElbowWristAngles::default(),
    };
    let lock = session.ensure(hand_type);

    let elbow = &frame.pose_landmarks[lock.elbow_index];
    let shoulder = &frame.pose_landmarks[lock.shoulder_index];
    let pose_wrist = &frame.pose_landmarks[lock.wrist_index];

    let confidence = elbow
        .confidence()
        .min(pose_wrist.confidence())
        .min(shoulder.confidence());
    if confidence < config.min_wrist_confidence {
        trace!(confidence, "wrist confidence below minimum, no reading produced");
        return ElbowWristAngles::default();
    }

    let forearm = geometry::normalize(&(hand_wrist.position() - elbow.position()));
    let hand_vec = geometry::normalize(
        &(frame.hand_landmarks[hand::MIDDLE_MCP].position() - hand_wrist.position()),
    );
    if forearm == nalgebra::Vector3::zeros() || hand_vec == nalgebra::Vector3::zeros() {
        return ElbowWristAngles {
            elbow_detected: true,
            hand_type: Some(hand_type),
            confidence,
            ..Default::default()
        };
    }

    let raw = geometry::angle_between_vectors(&forearm, &hand_vec);
    let cross = geometry::cross(&forearm, &hand_vec);
    let mut signed = if cross.z >= 0.0 { raw } else { -raw };
    if hand_type == HandType::Right {
        signed = -signed;
    }

    // Inside the neutral band the wrist is considered at rest; outside it,
    // the magnitude is scaled for clinical sensitivity and clamped.
    let (flexion, extension) = if signed.abs() <= config.wrist_neutral_zone {
        (0.0, 0.0)
    } else {
        let scaled = (signed * config.wrist_sensitivity_gain)
            .clamp(-config.wrist_angle_clamp, config.wrist_angle_clamp);
        (scaled.max(0.0), (-scaled).max(0.0))
    };

    ElbowWristAngles {
        forearm_to_hand_angle: signed,
        wrist_flexion_angle: flexion,
        wrist_extension_angle: extension,
        elbow_detected: true,
        hand_type: Some(hand_type),
        confidence,
    }
}

/// Aggregate a full recording: independent maxima of flexion and extension,
/// the largest raw angle, and the hand type/confidence of the best frame.
pub fn max_wrist_flexion_extension(
    frames: &[MotionFrame],
    session: &mut WristSession,
    config: &RomConfig,
) -> WristRomResult {
    let mut result = WristRomResult::default();
    let mut best_motion = -1.0f64;

    for frame in frames {
        let angles = calculate_elbow_wrist_angle(frame, session, config);
        if !angles.elbow_detected {
            continue;
        }
        result.frames_detected += 1;
        result.max_flexion = result.max_flexion.max(angles.wrist_flexion_angle);
        result.max_extension = result.max_extension.max(angles.wrist_extension_angle);
        result.max_raw_angle = result.max_raw_angle.max(angles.forearm_to_hand_angle.abs());

        let motion = angles.wrist_flexion_angle.max(angles.wrist_extension_angle);
        if motion > best_motion {
            best_motion = motion;
            result.hand_type = angles.hand_type;
            result.confidence = angles.confidence;
        }
    }

    debug!(
        max_flexion = result.max_flexion,
        max_extension = result.max_extension,
        frames = result.frames_detected,
        "wrist flexion/extension aggregated"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose_with_shoulders(left_x: f64, right_x: f64) -> Vec<Landmark> {
        let mut landmarks = vec![Landmark::with_visibility(0.0, 0.0, 0.0, 0.9); 33];
        landmarks[pose::LEFT_SHOULDER] = Landmark::with_visibility(left_x, 0.3, 0.0, 0.9);
        landmarks[pose::RIGHT_SHOULDER] = Landmark::with_visibility(right_x, 0.3, 0.0, 0.9);
        landmarks
    }

    /// Frame with the right-side pose arm vertical (elbow above the hand
    /// wrist) and the middle MCP offset by `bend_x` from straight.
    fn right_arm_frame(bend_x: f64) -> MotionFrame {
        let mut pose_landmarks = pose_with_shoulders(0.75, 0.45);
        pose_landmarks[pose::RIGHT_ELBOW] = Landmark::with_visibility(0.5, 0.8, 0.0, 0.9);
        pose_landmarks[pose::RIGHT_WRIST] = Landmark::with_visibility(0.5, 0.5, 0.0, 0.9);

        let mut hand_landmarks = vec![Landmark::new(0.0, 0.0, 0.0); 21];
        // Hand wrist left of the 0.6 centerline -> right hand (mirrored).
        hand_landmarks[hand::WRIST] = Landmark::new(0.5, 0.5, 0.0);
        hand_landmarks[hand::MIDDLE_MCP] = Landmark::new(0.5 + bend_x, 0.4, 0.0);
        MotionFrame::new(hand_landmarks, pose_landmarks, 0.0)
    }

    #[test]
    fn test_hand_left_of_centerline_is_right_hand() {
        // Scenario: hand wrist 0.10 left of body center on every frame.
        let config = RomConfig::default();
        let pose_landmarks = pose_with_shoulders(0.75, 0.45);
        let wrist = Landmark::new(0.5, 0.5, 0.0);
        for _ in 0..5 {
            assert_eq!(
                determine_hand_type(&wrist, &pose_landmarks, &config),
                Some(HandType::Right)
            );
        }
    }

    #[test]
    fn test_hand_right_of_centerline_is_left_hand() {
        let config = RomConfig::default();
        let pose_landmarks = pose_with_shoulders(0.75, 0.45);
        let wrist = Landmark::new(0.7, 0.5, 0.0);
        assert_eq!(
            determine_hand_type(&wrist, &pose_landmarks, &config),
            Some(HandType::Left)
        );
    }

    #[test]
    fn test_ambiguous_laterality_uses_shoulder_visibility() {
        let config = RomConfig::default();
        let mut pose_landmarks = pose_with_shoulders(0.75, 0.45);
        pose_landmarks[pose::LEFT_SHOULDER].visibility = Some(0.95);
        pose_landmarks[pose::RIGHT_SHOULDER].visibility = Some(0.40);
        // On the centerline exactly.
        let wrist = Landmark::new(0.6, 0.5, 0.0);
        assert_eq!(
            determine_hand_type(&wrist, &pose_landmarks, &config),
            Some(HandType::Left)
        );
    }

    #[test]
    fn test_short_pose_yields_no_hand_type() {
        let config = RomConfig::default();
        let wrist = Landmark::new(0.5, 0.5, 0.0);
        assert_eq!(determine_hand_type(&wrist, &[], &config), None);
    }

    #[test]
    fn test_session_lock_pins_right_side_landmarks() {
        let config = RomConfig::default();
        let mut session = WristSession::new();
        let frame = right_arm_frame(0.0);
        let angles = calculate_elbow_wrist_angle(&frame, &mut session, &config);
        assert!(angles.elbow_detected);

        let lock = session.lock().expect("lock established on first frame");
        assert_eq!(lock.hand_type, HandType::Right);
        assert_eq!(lock.elbow_index, pose::RIGHT_ELBOW);
        assert_eq!(lock.wrist_index, pose::RIGHT_WRIST);
        assert_eq!(lock.shoulder_index, pose::RIGHT_SHOULDER);
    }

    #[test]
    fn test_session_lock_reestablished_on_hand_type_change() {
        let config = RomConfig::default();
        let mut session = WristSession::new();
        calculate_elbow_wrist_angle(&right_arm_frame(0.0), &mut session, &config);
        assert_eq!(session.lock().unwrap().hand_type, HandType::Right);

        // Same skeleton but the hand wrist moves to the left side of the
        // centerline -> left hand.
        let mut frame = right_arm_frame(0.0);
        frame.hand_landmarks[hand::WRIST] = Landmark::new(0.7, 0.5, 0.0);
        calculate_elbow_wrist_angle(&frame, &mut session, &config);
        assert_eq!(session.lock().unwrap().hand_type, HandType::Left);
    }

    #[test]
    fn test_session_reset_clears_lock() {
        let config = RomConfig::default();
        let mut session = WristSession::new();
        calculate_elbow_wrist_angle(&right_arm_frame(0.0), &mut session, &config);
        assert!(session.lock().is_some());
        session.reset();
        assert!(session.lock().is_none());
    }

    #[test]
    fn test_neutral_hand_reports_no_motion() {
        let config = RomConfig::default();
        let mut session = WristSession::new();
        let angles = calculate_elbow_wrist_angle(&right_arm_frame(0.0), &mut session, &config);
        assert!(angles.elbow_detected);
        assert_eq!(angles.wrist_flexion_angle, 0.0);
        assert_eq!(angles.wrist_extension_angle, 0.0);
    }

    #[test]
    fn test_flexion_and_extension_mutually_exclusive() {
        let config = RomConfig::default();
        let mut session = WristSession::new();

        let bent = calculate_elbow_wrist_angle(&right_arm_frame(-0.1), &mut session, &config);
        assert!(bent.wrist_flexion_angle > 0.0);
        assert_eq!(bent.wrist_extension_angle, 0.0);

        let extended = calculate_elbow_wrist_angle(&right_arm_frame(0.1), &mut session, &config);
        assert!(extended.wrist_extension_angle > 0.0);
        assert_eq!(extended.wrist_flexion_angle, 0.0);

        assert_eq!(bent.wrist_flexion_angle.min(bent.wrist_extension_angle), 0.0);
        assert_eq!(
            extended.wrist_flexion_angle.min(extended.wrist_extension_angle),
            0.0
        );
    }

    #[test]
    fn test_scaled_angle_clamped_to_physiological_range() {
        let config = RomConfig::default();
        let mut session = WristSession::new();
        // 90° raw bend: MCP perpendicular to the forearm.
        let mut frame = right_arm_frame(0.0);
        frame.hand_landmarks[hand::MIDDLE_MCP] = Landmark::new(0.4, 0.5, 0.0);
        let angles = calculate_elbow_wrist_angle(&frame, &mut session, &config);
        assert!(angles.wrist_flexion_angle <= config.wrist_angle_clamp);
        assert!((angles.wrist_flexion_angle - config.wrist_angle_clamp).abs() < 1e-6);
    }

    #[test]
    fn test_insufficient_landmarks_degrade_to_undetected() {
        let config = RomConfig::default();
        let mut session = WristSession::new();

        let no_hand = MotionFrame::new(Vec::new(), pose_with_shoulders(0.75, 0.45), 0.0);
        assert_eq!(
            calculate_elbow_wrist_angle(&no_hand, &mut session, &config),
            ElbowWristAngles::default()
        );

        let mut short_pose = right_arm_frame(0.0);
        short_pose.pose_landmarks.truncate(16);
        assert_eq!(
            calculate_elbow_wrist_angle(&short_pose, &mut session, &config),
            ElbowWristAngles::default()
        );
    }

    #[test]
    fn test_low_visibility_produces_no_reading() {
        let config = RomConfig::default();
        let mut session = WristSession::new();
        let mut frame = right_arm_frame(-0.1);
        frame.pose_landmarks[pose::RIGHT_ELBOW].visibility = Some(0.1);
        let angles = calculate_elbow_wrist_angle(&frame, &mut session, &config);
        assert_eq!(angles, ElbowWristAngles::default());
    }

    #[test]
    fn test_sequence_aggregation_tracks_independent_maxima() {
        let config = RomConfig::default();
        let mut session = WristSession::new();
        let frames = vec![
            right_arm_frame(0.0),
            right_arm_frame(-0.05),
            right_arm_frame(-0.1),
            right_arm_frame(0.08),
            right_arm_frame(0.0),
        ];
        let result = max_wrist_flexion_extension(&frames, &mut session, &config);
        assert!(result.max_flexion > 0.0);
        assert!(result.max_extension > 0.0);
        assert!(result.max_raw_angle > 0.0);
        assert_eq!(result.hand_type, Some(HandType::Right));
        assert_eq!(result.frames_detected, 5);
        assert!((result.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_rerun_with_fresh_session_is_identical() {
        let config = RomConfig::default();
        let frames = vec![right_arm_frame(-0.1), right_arm_frame(0.05), right_arm_frame(0.0)];

        let mut session = WristSession::new();
        let first = max_wrist_flexion_extension(&frames, &mut session, &config);
        session.reset();
        let second = max_wrist_flexion_extension(&frames, &mut session, &config);

        assert_eq!(first.max_flexion, second.max_flexion);
        assert_eq!(first.max_extension, second.max_extension);
        assert_eq!(first.max_raw_angle, second.max_raw_angle);
        assert_eq!(first.hand_type, second.hand_type);
    }
}
