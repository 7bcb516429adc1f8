// Gesture classification from one hand's landmarks.
//
// The pinch distance (thumb tip to index tip, detector units) is the only
// discriminator. No hysteresis here: the session reacts to the level every detection.
// Visual: the HUD flips between "DRAWING MODE" and "IDLE (PINCH TO DRAW)".

use crate::geometry::distance;
use crate::types::{GestureState, LandmarkSet};

pub const PINCH_THRESHOLD: f32 = 0.08;

/// Thresholds for the classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// Pinch distance strictly below this means Drawing.
    pub pinch_threshold: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self { pinch_threshold: PINCH_THRESHOLD }
    }
}

/// Distance between thumb tip and index tip.
pub fn pinch_distance(hand: &LandmarkSet) -> f32 {
    distance(hand.thumb_tip(), hand.index_tip())
}

/// Drawing while pinched, Idle otherwise. A distance exactly at the threshold is Idle.
pub fn classify(hand: &LandmarkSet, config: &GestureConfig) -> GestureState {
    if pinch_distance(hand) < config.pinch_threshold {
        GestureState::Drawing
    } else {
        GestureState::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{INDEX_TIP, LANDMARK_COUNT, NormalizedPoint, THUMB_TIP};

    fn hand(thumb: NormalizedPoint, index: NormalizedPoint) -> LandmarkSet {
        let mut points = [NormalizedPoint::new(0.5, 0.8); LANDMARK_COUNT];
        points[THUMB_TIP] = thumb;
        points[INDEX_TIP] = index;
        LandmarkSet::new(points)
    }

    #[test]
    fn close_tips_draw() {
        let h = hand(NormalizedPoint::new(0.40, 0.40), NormalizedPoint::new(0.42, 0.41));
        assert_eq!(classify(&h, &GestureConfig::default()), GestureState::Drawing);
    }

    #[test]
    fn spread_tips_idle() {
        let h = hand(NormalizedPoint::new(0.40, 0.40), NormalizedPoint::new(0.55, 0.25));
        assert_eq!(classify(&h, &GestureConfig::default()), GestureState::Idle);
    }

    #[test]
    fn threshold_is_exclusive() {
        let h = hand(NormalizedPoint::new(0.0, 0.0), NormalizedPoint::new(PINCH_THRESHOLD, 0.0));
        assert_eq!(pinch_distance(&h), PINCH_THRESHOLD);
        assert_eq!(classify(&h, &GestureConfig::default()), GestureState::Idle);
    }

    #[test]
    fn custom_threshold_is_honored() {
        let h = hand(NormalizedPoint::new(0.40, 0.40), NormalizedPoint::new(0.50, 0.40));
        let loose = GestureConfig { pinch_threshold: 0.15 };
        assert_eq!(classify(&h, &loose), GestureState::Drawing);
        assert_eq!(classify(&h, &GestureConfig::default()), GestureState::Idle);
    }
}
