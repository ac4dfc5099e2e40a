use thiserror::Error;

/// Failures that reach the user.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AppError {
    /// The recognizer could not be prepared; no session can ever start.
    #[error("gesture recognizer failed to initialize: {0}")]
    Initialization(String),
    /// The camera could not be opened or stopped delivering frames.
    #[error("camera unavailable: {0}")]
    Acquisition(String),
    /// Start was requested while the recognizer is still loading.
    #[error("Please wait for gestureRecognizer to load")]
    Precondition,
}

/// A single inference call failed. Only ever logged.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("inference failed: {0}")]
pub struct InferenceError(pub String);

impl From<anyhow::Error> for InferenceError {
    fn from(err: anyhow::Error) -> Self {
        InferenceError(format!("{err:#}"))
    }
}
