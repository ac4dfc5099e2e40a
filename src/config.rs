use std::path::PathBuf;

pub const CANVAS_WIDTH: u32 = 480;
pub const CANVAS_HEIGHT: u32 = 360;

const DEFAULT_MODEL_DIR: &str = "models";
const DEFAULT_MIN_HAND_CONFIDENCE: f32 = 0.5;

const ENV_MODEL_DIR: &str = "GESTURE_OVERLAY_MODEL_DIR";
const ENV_CAMERA: &str = "GESTURE_OVERLAY_CAMERA";
const ENV_MIN_CONFIDENCE: &str = "GESTURE_OVERLAY_MIN_CONFIDENCE";

/// RGBA color plus stroke width used when drawing on the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stroke {
    pub color: [u8; 4],
    pub line_width: i32,
}

pub const CONNECTOR_STROKE: Stroke = Stroke {
    color: [0x00, 0xFF, 0x00, 0xFF],
    line_width: 5,
};

pub const LANDMARK_STROKE: Stroke = Stroke {
    color: [0xFF, 0x00, 0x00, 0xFF],
    line_width: 2,
};

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub model_dir: PathBuf,
    /// `None` picks the first camera reported by the host.
    pub camera_index: Option<u32>,
    pub min_hand_confidence: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            canvas_width: CANVAS_WIDTH,
            canvas_height: CANVAS_HEIGHT,
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            camera_index: None,
            min_hand_confidence: DEFAULT_MIN_HAND_CONFIDENCE,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_MODEL_DIR).filter(|v| !v.trim().is_empty()) {
            config.model_dir = PathBuf::from(dir.trim());
        }

        if let Some(raw) = lookup(ENV_CAMERA) {
            match raw.trim().parse::<u32>() {
                Ok(index) => config.camera_index = Some(index),
                Err(err) => log::warn!("ignoring {ENV_CAMERA}={raw:?}: {err}"),
            }
        }

        if let Some(raw) = lookup(ENV_MIN_CONFIDENCE) {
            match raw.trim().parse::<f32>() {
                Ok(value) if (0.0..=1.0).contains(&value) => config.min_hand_confidence = value,
                Ok(value) => log::warn!("ignoring {ENV_MIN_CONFIDENCE}={value}: outside [0, 1]"),
                Err(err) => log::warn!("ignoring {ENV_MIN_CONFIDENCE}={raw:?}: {err}"),
            }
        }

        config
    }
}
