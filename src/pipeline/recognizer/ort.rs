use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    InferenceAdapter, RecognizerBackend,
    common::{self, INPUT_SIZE},
    gesture::rank_gestures,
};
use crate::{
    error::InferenceError,
    model_download::{ModelDownloadEvent, ensure_handpose_model_ready},
    types::{DetectionResult, Frame, Handedness},
};

/// Single-hand recognizer: the handpose ONNX model on a letterboxed frame,
/// followed by landmark-based gesture ranking.
pub struct OrtRecognizer {
    session: Session,
    min_hand_confidence: f32,
    last_timestamp_ms: Option<u64>,
}

impl OrtRecognizer {
    /// Makes sure the model is on disk and loads it.
    pub fn prepare(
        backend: &RecognizerBackend,
        on_download: &mut dyn FnMut(ModelDownloadEvent),
    ) -> Result<Self> {
        let model_path = backend.model_path();
        ensure_handpose_model_ready(&model_path, on_download).with_context(|| {
            format!("failed to prepare handpose model at {}", model_path.display())
        })?;

        let recognizer = Self::load(&model_path, backend.min_hand_confidence())?;
        log::info!("handpose ORT backend ready using {}", model_path.display());
        Ok(recognizer)
    }

    fn load(model_path: &Path, min_hand_confidence: f32) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;

        Ok(Self {
            session,
            min_hand_confidence,
            last_timestamp_ms: None,
        })
    }

    fn run(&mut self, frame: &Frame) -> Result<DetectionResult> {
        let (input, letterbox) = common::prepare_frame(frame, INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;

        if outputs.len() == 0 {
            return Err(anyhow!("model returned no outputs"));
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let raw = common::decode_landmarks(&flattened)?;

        let first_scalar = |idx: usize| -> f32 {
            if outputs.len() > idx {
                outputs[idx]
                    .try_extract_array::<f32>()
                    .ok()
                    .and_then(|arr| arr.iter().next().copied())
                    .unwrap_or(0.0)
            } else {
                0.0
            }
        };
        let confidence = first_scalar(1).clamp(0.0, 1.0);
        let handedness_score = first_scalar(2).clamp(0.0, 1.0);

        if confidence < self.min_hand_confidence {
            return Ok(DetectionResult::empty());
        }

        let handedness = Handedness::from_score(handedness_score);
        Ok(DetectionResult {
            landmarks: vec![common::to_normalized(&raw, &letterbox)],
            gestures: vec![rank_gestures(&raw, confidence)],
            handedness: vec![vec![handedness.to_category(handedness_score)]],
        })
    }
}

impl InferenceAdapter for OrtRecognizer {
    fn infer(&mut self, frame: &Frame, timestamp_ms: u64) -> Result<DetectionResult, InferenceError> {
        if let Some(last) = self.last_timestamp_ms {
            if timestamp_ms < last {
                return Err(InferenceError(format!(
                    "timestamp {timestamp_ms}ms went backwards (last {last}ms)"
                )));
            }
        }
        self.last_timestamp_ms = Some(timestamp_ms);

        Ok(self.run(frame)?)
    }
}
