pub mod camera;
pub mod recognizer;
pub mod rgba_converter;
pub mod skeleton;

pub use camera::{CaptureSource, FrameStream, NokhwaCapture, select_camera};
pub use recognizer::{
    InferenceAdapter, InferenceDispatch, InferenceJob, InferenceReply, InferenceWorker, InitEvent,
    RecognizerBackend, start_recognizer,
};
pub use skeleton::{Canvas, DrawingSurface, HAND_CONNECTIONS};
