use std::time::Instant;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

/// A landmark in frame-relative coordinates: `x` and `y` are in `[0, 1]` of the
/// frame width/height, `z` is depth relative to the wrist.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NormalizedLandmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl NormalizedLandmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Category {
    pub index: i32,
    pub score: f32,
    pub category_name: String,
    pub display_name: String,
}

impl Category {
    pub fn new(index: i32, name: &str, score: f32) -> Self {
        Self {
            index,
            score,
            category_name: name.to_string(),
            display_name: name.to_string(),
        }
    }
}

/// Output of one inference call.
///
/// `landmarks`, `gestures` and `handedness` are indexed per hand: entry `n` of
/// each belongs to the same detected hand. Gesture lists are ranked best-first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionResult {
    pub landmarks: Vec<Vec<NormalizedLandmark>>,
    pub gestures: Vec<Vec<Category>>,
    pub handedness: Vec<Vec<Category>>,
}

impl DetectionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn hand_count(&self) -> usize {
        self.landmarks.len()
    }

    /// The gesture shown to the user: the top-ranked category of the first hand,
    /// together with that hand's first handedness label.
    pub fn active_gesture(&self) -> Option<(&Category, Option<&Category>)> {
        let gesture = self.gestures.first()?.first()?;
        let handedness = self.handedness.first().and_then(|labels| labels.first());
        Some((gesture, handedness))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Handedness::Left => "Left",
            Handedness::Right => "Right",
        }
    }

    pub fn to_category(self, score: f32) -> Category {
        let (index, confidence) = match self {
            Handedness::Left => (0, 1.0 - score),
            Handedness::Right => (1, score),
        };
        Category::new(index, self.label(), confidence.clamp(0.0, 1.0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FingerState {
    Extended,
    HalfBent,
    Folded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_gesture_uses_first_hand_only() {
        let result = DetectionResult {
            landmarks: vec![vec![NormalizedLandmark::default()]; 2],
            gestures: vec![
                vec![Category::new(0, "Victory", 0.7), Category::new(1, "None", 0.2)],
                vec![Category::new(2, "Thumb_Up", 0.99)],
            ],
            handedness: vec![
                vec![Category::new(0, "Left", 0.8)],
                vec![Category::new(1, "Right", 0.9)],
            ],
        };

        let (gesture, handedness) = result.active_gesture().expect("active gesture");
        assert_eq!(gesture.category_name, "Victory");
        assert_eq!(handedness.map(|h| h.display_name.as_str()), Some("Left"));
        assert_eq!(result.hand_count(), 2);
    }

    #[test]
    fn empty_result_has_no_active_gesture() {
        assert!(DetectionResult::empty().active_gesture().is_none());

        let hand_without_ranking = DetectionResult {
            landmarks: vec![vec![NormalizedLandmark::default()]],
            gestures: vec![Vec::new()],
            handedness: vec![Vec::new()],
        };
        assert!(hand_without_ranking.active_gesture().is_none());
    }

    #[test]
    fn handedness_category_reports_confidence_of_chosen_side() {
        let right = Handedness::from_score(0.8).to_category(0.8);
        assert_eq!(right.display_name, "Right");
        assert!((right.score - 0.8).abs() < 1e-6);

        let left = Handedness::from_score(0.1).to_category(0.1);
        assert_eq!(left.display_name, "Left");
        assert!((left.score - 0.9).abs() < 1e-6);
    }
}
