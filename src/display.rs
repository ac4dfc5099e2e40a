use crate::types::DetectionResult;

pub const PLACEHOLDER_TEXT: &str = "Gesture Output will display here.";

/// Text region showing the active gesture.
pub trait StatusDisplay {
    fn show(&mut self, text: &str);
    fn hide(&mut self);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusPanel {
    text: String,
    visible: bool,
}

impl Default for StatusPanel {
    fn default() -> Self {
        Self {
            text: PLACEHOLDER_TEXT.to_string(),
            visible: false,
        }
    }
}

impl StatusPanel {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

impl StatusDisplay for StatusPanel {
    fn show(&mut self, text: &str) {
        if self.text != text {
            self.text.clear();
            self.text.push_str(text);
        }
        self.visible = true;
    }

    fn hide(&mut self) {
        self.visible = false;
    }
}

/// Score in `[0, 1]` as a percentage with two decimals, without the `%` sign.
pub fn format_confidence(score: f32) -> String {
    format!("{:.2}", f64::from(score) * 100.0)
}

/// Status line for the first hand's top-ranked gesture, or `None` when no
/// gesture was recognized.
pub fn status_text(result: &DetectionResult) -> Option<String> {
    let (gesture, handedness) = result.active_gesture()?;
    let handedness = handedness
        .map(|h| h.display_name.as_str())
        .unwrap_or("Unknown");
    Some(format!(
        "GestureRecognizer: {}\n Confidence: {}%\n Handedness: {}",
        gesture.category_name,
        format_confidence(gesture.score),
        handedness
    ))
}
