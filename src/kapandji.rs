// src/kapandji.rs - Thumb opposition (Kapandji) scoring and progressive guidance
use std::collections::BTreeSet;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::RomConfig;
use crate::error::EngineError;
use crate::geometry;
use crate::landmarks::{hand, Landmark, MotionFrame};

/// Resolved position source for one Kapandji target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetLandmark {
    Single(usize),
    /// Mean of wrist + middle/ring/pinky MCPs, approximating the distal
    /// palmar crease.
    PalmComposite,
}

/// One entry of the ordered Kapandji target catalog.
#[derive(Debug, Clone, Copy)]
pub struct KapandjiTarget {
    pub score: u8,
    pub landmark: TargetLandmark,
    pub label: &'static str,
}

/// The 10 anatomical targets in clinical order.
pub static KAPANDJI_TARGETS: [KapandjiTarget; 10] = [
    KapandjiTarget { score: 1, landmark: TargetLandmark::Single(hand::INDEX_PIP), label: "index proximal phalanx" },
    KapandjiTarget { score: 2, landmark: TargetLandmark::Single(hand::INDEX_DIP), label: "index middle phalanx" },
    KapandjiTarget { score: 3, landmark: TargetLandmark::Single(hand::INDEX_TIP), label: "index fingertip" },
    KapandjiTarget { score: 4, landmark: TargetLandmark::Single(hand::MIDDLE_TIP), label: "middle fingertip" },
    KapandjiTarget { score: 5, landmark: TargetLandmark::Single(hand::RING_TIP), label: "ring fingertip" },
    KapandjiTarget { score: 6, landmark: TargetLandmark::Single(hand::PINKY_TIP), label: "little fingertip" },
    KapandjiTarget { score: 7, landmark: TargetLandmark::Single(hand::PINKY_DIP), label: "little DIP crease" },
    KapandjiTarget { score: 8, landmark: TargetLandmark::Single(hand::PINKY_PIP), label: "little PIP crease" },
    KapandjiTarget { score: 9, landmark: TargetLandmark::Single(hand::PINKY_MCP), label: "little finger base" },
    KapandjiTarget { score: 10, landmark: TargetLandmark::PalmComposite, label: "distal palmar crease" },
];

impl KapandjiTarget {
    pub fn resolve(&self, hand_landmarks: &[Landmark]) -> Vector3<f64> {
        match self.landmark {
            TargetLandmark::Single(index) => hand_landmarks[index].position(),
            TargetLandmark::PalmComposite => {
                (hand_landmarks[hand::WRIST].position()
                    + hand_landmarks[hand::MIDDLE_MCP].position()
                    + hand_landmarks[hand::RING_MCP].position()
                    + hand_landmarks[hand::PINKY_MCP].position())
                    / 4.0
            }
        }
    }
}

/// Per-frame Kapandji evaluation under the strict sequential rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KapandjiFrameScore {
    pub score: u8,
    pub achieved_targets: Vec<String>,
}

/// Sequence-level Kapandji result: the best frame observed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KapandjiResult {
    pub max_score: u8,
    pub achieved_targets: Vec<String>,
    pub frames_evaluated: usize,
}

fn require_full_hand(hand_landmarks: &[Landmark]) -> Result<(), EngineError> {
    if hand_landmarks.len() != hand::LANDMARK_COUNT {
        return Err(EngineError::MalformedHand { actual: hand_landmarks.len() });
    }
    Ok(())
}

/// Score one frame against the target catalog.
///
/// Target n counts only if target n-1 counted in the same evaluation, which
/// prevents noisy single-frame contact from skipping levels. The returned
/// score is the highest sequentially reached target, 0 if none.
///
/// This is the one contractual precondition in the engine: the geometry is
/// undefined without exactly 21 hand landmarks.
pub fn calculate_kapandji_score(
    hand_landmarks: &[Landmark],
    config: &RomConfig,
) -> Result<KapandjiFrameScore, EngineError> {
    require_full_hand(hand_landmarks)?;

    let thumb_tip = hand_landmarks[hand::THUMB_TIP].position();
    let mut achieved = Vec::new();
    let mut score = 0u8;

    for target in KAPANDJI_TARGETS.iter() {
        let dist = geometry::distance(&thumb_tip, &target.resolve(hand_landmarks));
        if dist < config.kapandji_distance_threshold {
            score = target.score;
            achieved.push(target.label.to_string());
            trace!(target = target.label, dist, "kapandji target reached");
        } else {
            // Sequential rule: a miss ends the chain.
            break;
        }
    }

    Ok(KapandjiFrameScore { score, achieved_targets: achieved })
}

/// Maximum per-frame Kapandji score over a motion sequence.
///
/// Frames without any hand landmarks are skipped (hand not detected);
/// frames with a wrong non-zero count violate the input contract.
pub fn max_kapandji_score(
    frames: &[MotionFrame],
    config: &RomConfig,
) -> Result<KapandjiResult, EngineError> {
    let mut best = KapandjiFrameScore::default();
    let mut evaluated = 0usize;

    for frame in frames {
        if frame.hand_landmarks.is_empty() {
            continue;
        }
        let frame_score = calculate_kapandji_score(&frame.hand_landmarks, config)?;
        evaluated += 1;
        if frame_score.score > best.score {
            best = frame_score;
        }
    }

    debug!(max_score = best.score, evaluated, "kapandji sequence scored");
    Ok(KapandjiResult {
        max_score: best.score,
        achieved_targets: best.achieved_targets,
        frames_evaluated: evaluated,
    })
}

/// Progressive target state machine for live guided assessment.
///
/// One instance per assessment attempt. Targets are tested one at a time in
/// catalog order; achieved targets only accumulate and the current index
/// never decreases within an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetState {
    current_target_index: usize,
    achieved_targets: BTreeSet<u8>,
    is_target_reached: bool,
    max_score_achieved: u8,
    /// Highest score the patient is guided toward this attempt.
    target_bound: u8,
}

/// Guidance bound for first-time patients with no prior best score.
const FIRST_ATTEMPT_BOUND: u8 = 3;

impl TargetState {
    /// Start a new attempt. The guidance bound is the patient's prior best
    /// score capped at 10, or 3 for first-time patients.
    pub fn new(prior_best_score: Option<u8>) -> Self {
        let target_bound = prior_best_score
            .map(|s| s.clamp(1, 10))
            .unwrap_or(FIRST_ATTEMPT_BOUND);
        Self {
            current_target_index: 0,
            achieved_targets: BTreeSet::new(),
            is_target_reached: false,
            max_score_achieved: 0,
            target_bound,
        }
    }

    pub fn current_target(&self) -> &'static KapandjiTarget {
        &KAPANDJI_TARGETS[self.current_target_index]
    }

    pub fn current_target_index(&self) -> usize {
        self.current_target_index
    }

    pub fn achieved_targets(&self) -> &BTreeSet<u8> {
        &self.achieved_targets
    }

    pub fn is_target_reached(&self) -> bool {
        self.is_target_reached
    }

    pub fn max_score_achieved(&self) -> u8 {
        self.max_score_achieved
    }

    pub fn target_bound(&self) -> u8 {
        self.target_bound
    }

    /// Evaluate one live frame against the current target only.
    ///
    /// Returns whether the current target was newly achieved this frame.
    pub fn process_frame(
        &mut self,
        hand_landmarks: &[Landmark],
        config: &RomConfig,
    ) -> Result<bool, EngineError> {
        require_full_hand(hand_landmarks)?;

        if self.is_target_reached {
            return Ok(false);
        }

        let target = KAPANDJI_TARGETS[self.current_target_index];
        let thumb_tip = hand_landmarks[hand::THUMB_TIP].position();
        let dist = geometry::distance(&thumb_tip, &target.resolve(hand_landmarks));
        if dist >= config.kapandji_distance_threshold {
            return Ok(false);
        }

        let newly_achieved = self.achieved_targets.insert(target.score);
        if newly_achieved {
            self.max_score_achieved = self.max_score_achieved.max(target.score);
            debug!(
                target = target.label,
                score = target.score,
                "guided kapandji target achieved"
            );
            if target.score >= self.target_bound {
                // Terminal for this attempt.
                self.is_target_reached = true;
            } else {
                self.current_target_index += 1;
            }
        }
        Ok(newly_achieved)
    }
}
