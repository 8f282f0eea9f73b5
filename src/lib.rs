//! rom_engine - Motion-derived joint angle analysis for hand/wrist
//! rehabilitation assessment.
//!
//! Turns sequences of normalized 3D hand/pose landmark frames into clinical
//! range-of-motion measurements: finger total active motion, thumb
//! opposition (Kapandji) score, wrist flexion/extension, and radial/ulnar
//! deviation. The engine is computation-only: it performs no I/O and owns
//! no global state; session-scoped disambiguation lives in caller-owned
//! [`WristSession`] and [`TargetState`] values.

pub mod config;
pub mod deviation;
pub mod error;
pub mod finger;
pub mod geometry;
pub mod kapandji;
pub mod landmarks;
pub mod wrist;

pub use config::RomConfig;
pub use deviation::{calculate_wrist_deviation, max_wrist_deviation, DeviationFrame, DeviationResult};
pub use error::EngineError;
pub use finger::{
    calculate_all_fingers_max_rom, calculate_finger_joint_angles, calculate_finger_max_rom,
    calculate_hand_joint_angles, validate_anatomical_limits, Finger, FingerRomResult, JointAngles,
    LimitReport, Smoothing,
};
pub use kapandji::{
    calculate_kapandji_score, max_kapandji_score, KapandjiFrameScore, KapandjiResult,
    KapandjiTarget, TargetState, KAPANDJI_TARGETS,
};
pub use landmarks::{HandType, Landmark, MotionFrame};
pub use wrist::{
    calculate_elbow_wrist_angle, determine_hand_type, max_wrist_flexion_extension,
    ElbowWristAngles, SessionLock, WristRomResult, WristSession,
};
