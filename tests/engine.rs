//! End-to-end checks across calculators: a synthetic recording flows through
//! every assessment, and results survive the serde persistence contract.

use rom_engine::landmarks::{hand, pose};
use rom_engine::{
    calculate_all_fingers_max_rom, max_kapandji_score, max_wrist_deviation,
    max_wrist_flexion_extension, HandType, Landmark, MotionFrame, RomConfig, Smoothing,
    WristSession,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A right-hand frame with a vertical forearm, the index finger bent at the
/// PIP by `pip_deg`, and the middle MCP offset by `wrist_bend_x`.
fn assessment_frame(pip_deg: f64, wrist_bend_x: f64, t: f64) -> MotionFrame {
    let mut pose_landmarks = vec![Landmark::with_visibility(0.0, 0.0, 0.0, 0.9); 33];
    pose_landmarks[pose::LEFT_SHOULDER] = Landmark::with_visibility(0.75, 0.3, 0.0, 0.9);
    pose_landmarks[pose::RIGHT_SHOULDER] = Landmark::with_visibility(0.45, 0.3, 0.0, 0.9);
    pose_landmarks[pose::RIGHT_ELBOW] = Landmark::with_visibility(0.5, 0.8, 0.0, 0.9);
    pose_landmarks[pose::RIGHT_WRIST] = Landmark::with_visibility(0.5, 0.5, 0.0, 0.9);

    let mut hand_landmarks = vec![Landmark::new(0.0, 0.0, 0.0); 21];
    hand_landmarks[hand::WRIST] = Landmark::new(0.5, 0.5, 0.0);
    hand_landmarks[hand::MIDDLE_MCP] = Landmark::new(0.5 + wrist_bend_x, 0.4, 0.0);
    hand_landmarks[hand::INDEX_MCP] = Landmark::new(0.5, 0.4, 0.0);
    hand_landmarks[hand::PINKY_MCP] = Landmark::new(0.5, 0.4, 0.0);

    // Index finger chain along +x from an offset base, bent at the PIP.
    let theta = pip_deg.to_radians();
    hand_landmarks[hand::INDEX_PIP] = Landmark::new(0.6, 0.4, 0.0);
    hand_landmarks[hand::INDEX_DIP] =
        Landmark::new(0.6 + theta.cos() * 0.05, 0.4 + theta.sin() * 0.05, 0.0);
    hand_landmarks[hand::INDEX_TIP] =
        Landmark::new(0.6 + theta.cos() * 0.1, 0.4 + theta.sin() * 0.1, 0.0);

    MotionFrame::new(hand_landmarks, pose_landmarks, t)
}

fn recording() -> Vec<MotionFrame> {
    (0..15)
        .map(|i| {
            let t = i as f64 / 30.0;
            assessment_frame(40.0 + i as f64, -0.02 * i as f64, t)
        })
        .collect()
}

#[test]
fn full_assessment_pipeline_produces_bounded_results() {
    init_logging();
    let config = RomConfig::default();
    let frames = recording();

    let fingers = calculate_all_fingers_max_rom(&frames, Smoothing::Enabled, &config);
    assert_eq!(fingers.len(), 4);
    for finger in &fingers {
        assert!(finger.max_angles.mcp_angle >= 0.0 && finger.max_angles.mcp_angle <= 95.0);
        assert!(finger.max_angles.pip_angle >= 0.0 && finger.max_angles.pip_angle <= 115.0);
        assert!(finger.max_angles.dip_angle >= 0.0 && finger.max_angles.dip_angle <= 90.0);
        let sum = finger.max_angles.mcp_angle
            + finger.max_angles.pip_angle
            + finger.max_angles.dip_angle;
        assert!((finger.max_angles.total_active_rom - sum).abs() < 1e-9);
        assert!(finger.temporal_quality >= 0.0 && finger.temporal_quality <= 1.0);
    }

    let kapandji = max_kapandji_score(&frames, &config).unwrap();
    assert!(kapandji.max_score <= 10);
    assert_eq!(kapandji.frames_evaluated, frames.len());

    let mut session = WristSession::new();
    let wrist = max_wrist_flexion_extension(&frames, &mut session, &config);
    assert_eq!(wrist.hand_type, Some(HandType::Right));
    assert!(wrist.max_flexion >= 0.0 && wrist.max_flexion <= 90.0);
    assert!(wrist.max_extension >= 0.0 && wrist.max_extension <= 90.0);

    let deviation = max_wrist_deviation(&frames, HandType::Right, &config);
    assert!(deviation.max_radial_deviation <= 25.0);
    assert!(deviation.max_ulnar_deviation <= 35.0);
}

#[test]
fn rerun_with_fresh_session_is_idempotent() {
    init_logging();
    let config = RomConfig::default();
    let frames = recording();

    let mut session = WristSession::new();
    let first = max_wrist_flexion_extension(&frames, &mut session, &config);
    session.reset();
    let second = max_wrist_flexion_extension(&frames, &mut session, &config);
    assert_eq!(first.max_flexion, second.max_flexion);
    assert_eq!(first.max_extension, second.max_extension);

    let a = calculate_all_fingers_max_rom(&frames, Smoothing::Enabled, &config);
    let b = calculate_all_fingers_max_rom(&frames, Smoothing::Enabled, &config);
    for (x, y) in a.iter().zip(b.iter()) {
        assert_eq!(x.max_angles, y.max_angles);
    }
}

#[test]
fn results_serialize_for_persistence() {
    init_logging();
    let config = RomConfig::default();
    let frames = recording();

    let fingers = calculate_all_fingers_max_rom(&frames, Smoothing::Enabled, &config);
    let json = serde_json::to_string(&fingers).unwrap();
    assert!(json.contains("total_active_rom"));

    let mut session = WristSession::new();
    let wrist = max_wrist_flexion_extension(&frames, &mut session, &config);
    let json = serde_json::to_string(&wrist).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value["max_flexion"].is_number());

    let deviation = max_wrist_deviation(&frames, HandType::Right, &config);
    let json = serde_json::to_string(&deviation).unwrap();
    assert!(json.contains("reproducibility_valid"));

    // Frames themselves round-trip, so recordings can be replayed later.
    let json = serde_json::to_string(&frames).unwrap();
    let back: Vec<MotionFrame> = serde_json::from_str(&json).unwrap();
    assert_eq!(back.len(), frames.len());
    assert_eq!(back[0].hand_landmarks[0], frames[0].hand_landmarks[0]);
}
